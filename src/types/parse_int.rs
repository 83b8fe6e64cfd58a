// Signed/unsigned integer parsing (component I).
//
// Fields arrive already narrowed to their byte span by the lazy column
// layer, so digit validation here is a scalar loop rather than a 64-byte
// block kernel — the indexing engine already paid for the SIMD pass that
// found the field boundaries. Overflow is checked per accumulation step
// rather than deferred to a final range comparison.

use super::{has_disallowed_leading_zero, is_na, trim_ascii, Locale, ParseValueError};

pub fn parse_i64(
    field: &[u8],
    na_strings: &[&[u8]],
    trim: bool,
    allow_leading_zeros: bool,
    max_digits: usize,
    locale: Locale,
) -> Result<i64, ParseValueError> {
    let field = if trim { trim_ascii(field) } else { field };
    if is_na(field, na_strings, false) {
        return Err(ParseValueError::Na);
    }

    let (neg, digits) = match field.first() {
        Some(b'-') => (true, &field[1..]),
        Some(b'+') => (false, &field[1..]),
        _ => (false, field),
    };

    if digits.is_empty() || digits.len() > max_digits || !digits.iter().all(u8::is_ascii_digit) {
        return Err(ParseValueError::Invalid);
    }
    if !allow_leading_zeros && has_disallowed_leading_zero(digits, locale.decimal_mark) {
        return Err(ParseValueError::Invalid);
    }

    let mut acc: i64 = 0;
    for &b in digits {
        let d = (b - b'0') as i64;
        acc = acc
            .checked_mul(10)
            .and_then(|a| a.checked_add(d))
            .ok_or(ParseValueError::Invalid)?;
    }
    Ok(if neg { -acc } else { acc })
}

pub fn parse_u64(
    field: &[u8],
    na_strings: &[&[u8]],
    trim: bool,
    allow_leading_zeros: bool,
    max_digits: usize,
    locale: Locale,
) -> Result<u64, ParseValueError> {
    let field = if trim { trim_ascii(field) } else { field };
    if is_na(field, na_strings, false) {
        return Err(ParseValueError::Na);
    }
    if field.first() == Some(&b'-') {
        return Err(ParseValueError::Invalid);
    }
    let digits = if field.first() == Some(&b'+') { &field[1..] } else { field };

    if digits.is_empty() || digits.len() > max_digits || !digits.iter().all(u8::is_ascii_digit) {
        return Err(ParseValueError::Invalid);
    }
    if !allow_leading_zeros && has_disallowed_leading_zero(digits, locale.decimal_mark) {
        return Err(ParseValueError::Invalid);
    }

    let mut acc: u64 = 0;
    for &b in digits {
        let d = (b - b'0') as u64;
        acc = acc
            .checked_mul(10)
            .and_then(|a| a.checked_add(d))
            .ok_or(ParseValueError::Invalid)?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l() -> Locale {
        Locale::default()
    }

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_i64(b"42", &[], true, false, 19, l()), Ok(42));
        assert_eq!(parse_i64(b"-7", &[], true, false, 19, l()), Ok(-7));
        assert_eq!(parse_u64(b"7", &[], true, false, 19, l()), Ok(7));
    }

    #[test]
    fn negative_unsigned_is_invalid() {
        assert_eq!(parse_u64(b"-7", &[], true, false, 19, l()), Err(ParseValueError::Invalid));
    }

    #[test]
    fn leading_zero_rejected_by_default() {
        assert_eq!(parse_i64(b"007", &[], true, false, 19, l()), Err(ParseValueError::Invalid));
        assert_eq!(parse_i64(b"007", &[], true, true, 19, l()), Ok(7));
    }

    #[test]
    fn overflow_is_invalid() {
        assert_eq!(
            parse_i64(b"99999999999999999999", &[], true, false, 25, l()),
            Err(ParseValueError::Invalid)
        );
    }

    #[test]
    fn empty_field_is_na() {
        assert_eq!(parse_i64(b"", &[], true, false, 19, l()), Err(ParseValueError::Na));
    }

    #[test]
    fn whitespace_trimmed_when_requested() {
        assert_eq!(parse_i64(b"  42  ", &[], true, false, 19, l()), Ok(42));
        assert_eq!(parse_i64(b"  42  ", &[], false, false, 19, l()), Err(ParseValueError::Invalid));
    }
}
