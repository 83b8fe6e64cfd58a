// Boolean parser (component I): configurable case-sensitive true/false
// string sets, falling back to the NA check, then reporting invalid.

use super::{is_na, trim_ascii, ParseValueError};

pub fn parse_bool(
    field: &[u8],
    true_strings: &[&[u8]],
    false_strings: &[&[u8]],
    na_strings: &[&[u8]],
    trim: bool,
) -> Result<bool, ParseValueError> {
    let field = if trim { trim_ascii(field) } else { field };
    if true_strings.iter().any(|t| *t == field) {
        return Ok(true);
    }
    if false_strings.iter().any(|f| *f == field) {
        return Ok(false);
    }
    if is_na(field, na_strings, false) {
        return Err(ParseValueError::Na);
    }
    Err(ParseValueError::Invalid)
}

pub const DEFAULT_TRUE: [&[u8]; 4] = [b"TRUE", b"True", b"true", b"T"];
pub const DEFAULT_FALSE: [&[u8]; 4] = [b"FALSE", b"False", b"false", b"F"];
