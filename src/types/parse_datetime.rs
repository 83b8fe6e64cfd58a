// ISO-8601 + compact `YYYYMMDD` datetime parser (component I), grounded on
// `DateTimeParser.h`'s `parseISO8601`/`consumeInteger`/`consumeTzOffset`/
// `consumeSeconds` grammar: 4-digit year, optional `-`, 2-digit month,
// optional `-` (the separator is all-or-nothing between the two), 2-digit
// day, then an optional `T`/space + `hh[:mm[:ss[.frac]]]` + optional
// timezone (`Z` or `±hh[:mm]`).

use super::{is_na, trim_ascii, ParseValueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParsedTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub nanosecond: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDateTime {
    pub date: ParsedDate,
    pub time: ParsedTime,
    /// Timezone offset in minutes east of UTC; `None` if absent (a "local"
    /// or unzoned timestamp).
    pub tz_offset_minutes: Option<i32>,
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Consume exactly `n` ASCII digits starting at `*pos`, advancing `*pos`.
fn consume_integer(field: &[u8], pos: &mut usize, n: usize) -> Option<i64> {
    if *pos + n > field.len() {
        return None;
    }
    let slice = &field[*pos..*pos + n];
    if !slice.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut v: i64 = 0;
    for &b in slice {
        v = v * 10 + (b - b'0') as i64;
    }
    *pos += n;
    Some(v)
}

fn parse_date_at(field: &[u8], pos: &mut usize) -> Option<ParsedDate> {
    let year = consume_integer(field, pos, 4)? as i32;
    let has_dash1 = field.get(*pos) == Some(&b'-');
    if has_dash1 {
        *pos += 1;
    }
    let month = consume_integer(field, pos, 2)?;
    let has_dash2 = field.get(*pos) == Some(&b'-');
    if has_dash1 != has_dash2 {
        // Extended (`YYYY-MM-DD`) and compact (`YYYYMMDD`) forms must not mix.
        return None;
    }
    if has_dash2 {
        *pos += 1;
    }
    let day = consume_integer(field, pos, 2)?;

    if !(1..=12).contains(&month) {
        return None;
    }
    let month = month as u8;
    if day < 1 || day > days_in_month(year, month) as i64 {
        return None;
    }
    Some(ParsedDate {
        year,
        month,
        day: day as u8,
    })
}

fn consume_seconds(field: &[u8], pos: &mut usize) -> Option<(u8, u32)> {
    let sec = consume_integer(field, pos, 2)?;
    if sec > 60 {
        // allow a leap second (60) to pass through as a parse success; the
        // caller may reject it downstream if it cares.
        return None;
    }
    let mut nanos = 0u32;
    if field.get(*pos) == Some(&b'.') {
        *pos += 1;
        let start = *pos;
        while *pos < field.len() && field[*pos].is_ascii_digit() {
            *pos += 1;
        }
        let frac = &field[start..*pos];
        if frac.is_empty() {
            return None;
        }
        let mut digits = [b'0'; 9];
        let take = frac.len().min(9);
        digits[..take].copy_from_slice(&frac[..take]);
        let mut v: u32 = 0;
        for &b in &digits {
            v = v * 10 + (b - b'0') as u32;
        }
        nanos = v;
    }
    Some((sec as u8, nanos))
}

fn consume_tz_offset(field: &[u8], pos: &mut usize) -> Option<Option<i32>> {
    match field.get(*pos) {
        Some(b'Z') | Some(b'z') => {
            *pos += 1;
            Some(Some(0))
        }
        Some(&sign @ (b'+' | b'-')) => {
            *pos += 1;
            let hh = consume_integer(field, pos, 2)?;
            let mm = if field.get(*pos) == Some(&b':') {
                *pos += 1;
                consume_integer(field, pos, 2)?
            } else if *pos + 2 <= field.len() && field[*pos..*pos + 2].iter().all(u8::is_ascii_digit) {
                consume_integer(field, pos, 2)?
            } else {
                0
            };
            let total = hh * 60 + mm;
            Some(Some(if sign == b'-' { -(total as i32) } else { total as i32 }))
        }
        _ => Some(None),
    }
}

pub fn parse_date(field: &[u8], na_strings: &[&[u8]], trim: bool) -> Result<ParsedDate, ParseValueError> {
    let field = if trim { trim_ascii(field) } else { field };
    if is_na(field, na_strings, false) {
        return Err(ParseValueError::Na);
    }
    let mut pos = 0;
    let date = parse_date_at(field, &mut pos).ok_or(ParseValueError::Invalid)?;
    if pos != field.len() {
        return Err(ParseValueError::Invalid);
    }
    Ok(date)
}

pub fn parse_time(field: &[u8], na_strings: &[&[u8]], trim: bool) -> Result<ParsedTime, ParseValueError> {
    let field = if trim { trim_ascii(field) } else { field };
    if is_na(field, na_strings, false) {
        return Err(ParseValueError::Na);
    }
    let mut pos = 0;
    let hour = consume_integer(field, &mut pos, 2).ok_or(ParseValueError::Invalid)?;
    if field.get(pos) != Some(&b':') {
        return Err(ParseValueError::Invalid);
    }
    pos += 1;
    let minute = consume_integer(field, &mut pos, 2).ok_or(ParseValueError::Invalid)?;
    let (second, nanosecond) = if field.get(pos) == Some(&b':') {
        pos += 1;
        consume_seconds(field, &mut pos).ok_or(ParseValueError::Invalid)?
    } else {
        (0, 0)
    };
    if pos != field.len() || hour > 23 || minute > 59 {
        return Err(ParseValueError::Invalid);
    }
    Ok(ParsedTime {
        hour: hour as u8,
        minute: minute as u8,
        second,
        nanosecond,
    })
}

pub fn parse_datetime(field: &[u8], na_strings: &[&[u8]], trim: bool) -> Result<ParsedDateTime, ParseValueError> {
    let field = if trim { trim_ascii(field) } else { field };
    if is_na(field, na_strings, false) {
        return Err(ParseValueError::Na);
    }

    let mut pos = 0;
    let date = parse_date_at(field, &mut pos).ok_or(ParseValueError::Invalid)?;

    if pos == field.len() {
        return Ok(ParsedDateTime {
            date,
            time: ParsedTime::default(),
            tz_offset_minutes: None,
        });
    }

    match field.get(pos) {
        Some(b'T') | Some(b't') | Some(b' ') => pos += 1,
        _ => return Err(ParseValueError::Invalid),
    }

    let hour = consume_integer(field, &mut pos, 2).ok_or(ParseValueError::Invalid)?;
    let (minute, second, nanosecond) = if field.get(pos) == Some(&b':') {
        pos += 1;
        let minute = consume_integer(field, &mut pos, 2).ok_or(ParseValueError::Invalid)?;
        let (second, nanos) = if field.get(pos) == Some(&b':') {
            pos += 1;
            consume_seconds(field, &mut pos).ok_or(ParseValueError::Invalid)?
        } else {
            (0, 0)
        };
        (minute, second, nanos)
    } else {
        (0, 0, 0)
    };

    if hour > 23 || minute > 59 {
        return Err(ParseValueError::Invalid);
    }

    let tz_offset_minutes = consume_tz_offset(field, &mut pos).ok_or(ParseValueError::Invalid)?;

    if pos != field.len() {
        return Err(ParseValueError::Invalid);
    }

    Ok(ParsedDateTime {
        date,
        time: ParsedTime {
            hour: hour as u8,
            minute: minute as u8,
            second,
            nanosecond,
        },
        tz_offset_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extended_date() {
        assert_eq!(
            parse_date(b"2024-02-29", &[], true),
            Ok(ParsedDate { year: 2024, month: 2, day: 29 })
        );
    }

    #[test]
    fn rejects_non_leap_feb_29() {
        assert_eq!(parse_date(b"2023-02-29", &[], true), Err(ParseValueError::Invalid));
    }

    #[test]
    fn parses_compact_date() {
        assert_eq!(
            parse_date(b"20240229", &[], true),
            Ok(ParsedDate { year: 2024, month: 2, day: 29 })
        );
    }

    #[test]
    fn parses_full_datetime_with_z() {
        let got = parse_datetime(b"2024-01-02T03:04:05.5Z", &[], true).unwrap();
        assert_eq!(got.date, ParsedDate { year: 2024, month: 1, day: 2 });
        assert_eq!(got.time.hour, 3);
        assert_eq!(got.time.nanosecond, 500_000_000);
        assert_eq!(got.tz_offset_minutes, Some(0));
    }

    #[test]
    fn parses_offset_with_colon() {
        let got = parse_datetime(b"2024-01-02T03:04:05+05:30", &[], true).unwrap();
        assert_eq!(got.tz_offset_minutes, Some(5 * 60 + 30));
    }

    #[test]
    fn parses_negative_offset_without_colon() {
        let got = parse_datetime(b"2024-01-02T03:04:05-0800", &[], true).unwrap();
        assert_eq!(got.tz_offset_minutes, Some(-480));
    }

    #[test]
    fn date_only_has_no_time_component() {
        let got = parse_datetime(b"2024-01-02", &[], true).unwrap();
        assert_eq!(got.time, ParsedTime::default());
        assert_eq!(got.tz_offset_minutes, None);
    }

    #[test]
    fn rejects_invalid_month() {
        assert_eq!(parse_date(b"2024-13-01", &[], true), Err(ParseValueError::Invalid));
    }

    #[test]
    fn parses_bare_time() {
        assert_eq!(
            parse_time(b"23:59:59", &[], true),
            Ok(ParsedTime { hour: 23, minute: 59, second: 59, nanosecond: 0 })
        );
    }
}
