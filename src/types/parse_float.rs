// Double parser (component I): special values, sign, up to 19 mantissa
// digits (further integer-part digits increment the exponent instead of
// widening the mantissa), optional fraction, optional exponent capped at
// magnitude 400, result as `mantissa * pow10(exponent)` with a lookup
// table for |exponent| <= 22.

use super::{is_na, trim_ascii, Locale, ParseValueError};

const MAX_MANTISSA_DIGITS: usize = 19;
const MAX_EXPONENT_MAGNITUDE: i32 = 400;

const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

fn pow10(exp: i32) -> f64 {
    let mag = exp.unsigned_abs() as usize;
    if mag < POW10.len() {
        if exp >= 0 {
            POW10[mag]
        } else {
            1.0 / POW10[mag]
        }
    } else {
        10f64.powi(exp)
    }
}

fn parse_special(rest: &[u8]) -> Option<f64> {
    match rest.to_ascii_lowercase().as_slice() {
        b"nan" => Some(f64::NAN),
        b"inf" | b"infinity" => Some(f64::INFINITY),
        _ => None,
    }
}

pub fn parse_f64(field: &[u8], na_strings: &[&[u8]], trim: bool, locale: Locale) -> Result<f64, ParseValueError> {
    let field = if trim { trim_ascii(field) } else { field };
    if is_na(field, na_strings, false) {
        return Err(ParseValueError::Na);
    }

    let mut i = 0usize;
    let neg = match field.first() {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    if let Some(v) = parse_special(&field[i..]) {
        return Ok(if neg { -v } else { v });
    }

    let mut mantissa: u64 = 0;
    let mut mantissa_digits = 0usize;
    let mut exponent: i32 = 0;
    let mut saw_digit = false;

    while i < field.len() {
        let b = field[i];
        if b.is_ascii_digit() {
            saw_digit = true;
            if mantissa_digits < MAX_MANTISSA_DIGITS {
                mantissa = mantissa * 10 + (b - b'0') as u64;
                mantissa_digits += 1;
            } else {
                exponent += 1;
            }
            i += 1;
        } else if Some(b) == locale.grouping_mark {
            i += 1;
        } else {
            break;
        }
    }

    if i < field.len() && field[i] == locale.decimal_mark {
        i += 1;
        while i < field.len() && field[i].is_ascii_digit() {
            saw_digit = true;
            if mantissa_digits < MAX_MANTISSA_DIGITS {
                mantissa = mantissa * 10 + (field[i] - b'0') as u64;
                mantissa_digits += 1;
                exponent -= 1;
            }
            i += 1;
        }
    }

    if !saw_digit {
        return Err(ParseValueError::Invalid);
    }

    if i < field.len() && (field[i] == b'e' || field[i] == b'E') {
        i += 1;
        let exp_neg = match field.get(i) {
            Some(b'-') => {
                i += 1;
                true
            }
            Some(b'+') => {
                i += 1;
                false
            }
            _ => false,
        };
        let mut exp_val: i32 = 0;
        let mut saw_exp_digit = false;
        while i < field.len() && field[i].is_ascii_digit() {
            saw_exp_digit = true;
            exp_val = (exp_val.saturating_mul(10) + (field[i] - b'0') as i32).min(MAX_EXPONENT_MAGNITUDE + 1);
            i += 1;
        }
        if !saw_exp_digit {
            return Err(ParseValueError::Invalid);
        }
        exponent += if exp_neg { -exp_val } else { exp_val };
    }

    if i != field.len() {
        return Err(ParseValueError::Invalid);
    }

    let exponent = exponent.clamp(-MAX_EXPONENT_MAGNITUDE, MAX_EXPONENT_MAGNITUDE);
    let magnitude = mantissa as f64 * pow10(exponent);
    Ok(if neg { -magnitude } else { magnitude })
}
