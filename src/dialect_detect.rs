// Dialect detector (component K): samples the first few rows against each
// candidate delimiter, scoring by column-count stability, and picks the
// highest-confidence dialect. Grounded on spec.md §4.K directly; the
// row-scanning loop reuses the branchless state machine (component E) the
// same way the indexing engine's first pass does, run against a bounded
// prefix rather than the whole buffer.

use crate::dialect::{Dialect, CANDIDATE_DELIMITERS};
use crate::state_machine::StateMachine;

const DEFAULT_SAMPLE_ROWS: usize = 20;

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub dialect: Dialect,
    pub confidence: f64,
    pub detected_columns: u64,
    pub rows_analyzed: usize,
    pub has_header: bool,
    pub warning: Option<String>,
}

/// Column counts of up to `max_rows` rows scanned from `buf` using `delim`.
/// Stops scanning once `max_rows` rows have completed or the buffer ends.
fn sample_row_column_counts(buf: &[u8], delim: u8, max_rows: usize) -> Vec<u64> {
    let mut sm = StateMachine::new(delim, b'"', b'"', true);
    let mut counts = Vec::with_capacity(max_rows);
    let mut current = 1u64;
    let mut saw_any_byte_this_row = false;

    for &b in buf {
        let r = sm.step(b);
        saw_any_byte_this_row = true;
        if r.emits_separator() {
            if b == b'\n' {
                counts.push(current);
                current = 1;
                saw_any_byte_this_row = false;
                if counts.len() >= max_rows {
                    break;
                }
            } else {
                current += 1;
            }
        }
    }
    if saw_any_byte_this_row && counts.len() < max_rows {
        counts.push(current);
    }
    counts
}

fn mode_and_stability(counts: &[u64]) -> (u64, f64) {
    if counts.is_empty() {
        return (0, 0.0);
    }
    let mut tally: Vec<(u64, usize)> = Vec::new();
    for &c in counts {
        match tally.iter_mut().find(|(v, _)| *v == c) {
            Some((_, n)) => *n += 1,
            None => tally.push((c, 1)),
        }
    }
    match tally.into_iter().max_by_key(|(_, n)| *n) {
        Some((mode, mode_count)) => (mode, mode_count as f64 / counts.len() as f64),
        None => (0, 0.0),
    }
}

/// The first row's fields look like a header when none of them parse as a
/// plain integer or double, while at least one subsequent row has a field
/// that does — mirroring spec.md §4.K's "mostly strings vs. numeric/mixed"
/// comparison without pulling in the full type guesser.
fn looks_like_header(buf: &[u8], delim: u8) -> bool {
    let mut rows: Vec<Vec<Vec<u8>>> = Vec::new();
    let mut current_row: Vec<Vec<u8>> = Vec::new();
    let mut current_field = Vec::new();
    let mut sm = StateMachine::new(delim, b'"', b'"', true);

    for &b in buf {
        let r = sm.step(b);
        if r.emits_separator() {
            current_row.push(std::mem::take(&mut current_field));
            if b == b'\n' {
                rows.push(std::mem::take(&mut current_row));
                if rows.len() >= 5 {
                    break;
                }
            }
        } else {
            current_field.push(b);
        }
    }

    if rows.len() < 2 {
        return false;
    }

    let is_numeric = |f: &[u8]| {
        !f.is_empty() && f.iter().all(|b| b.is_ascii_digit() || *b == b'.' || *b == b'-' || *b == b'+')
    };

    let header_numeric = rows[0].iter().any(|f| is_numeric(f));
    let body_numeric = rows[1..].iter().any(|row| row.iter().any(|f| is_numeric(f)));
    !header_numeric && body_numeric
}

/// Try each candidate delimiter against a bounded prefix of `buf`, score by
/// column-count stability, and return the winner.
pub fn detect(buf: &[u8]) -> DetectionResult {
    detect_with_sample_rows(buf, DEFAULT_SAMPLE_ROWS)
}

pub fn detect_with_sample_rows(buf: &[u8], max_rows: usize) -> DetectionResult {
    let prefix_len = buf.len().min(1 << 20);
    let prefix = &buf[..prefix_len];

    let mut best: Option<(u8, u64, f64, usize)> = None;
    for &delim in CANDIDATE_DELIMITERS.iter() {
        let counts = sample_row_column_counts(prefix, delim, max_rows);
        let (mode, stability) = mode_and_stability(&counts);
        if mode < 2 {
            continue;
        }
        let better = match &best {
            None => true,
            Some((_, _, best_stability, _)) => stability > *best_stability,
        };
        if better {
            best = Some((delim, mode, stability, counts.len()));
        }
    }

    match best {
        Some((delim, columns, confidence, rows_analyzed)) => {
            let dialect = Dialect::csv().with_delimiter(delim);
            let has_header = looks_like_header(prefix, delim);
            let warning = if confidence < 0.5 {
                Some("low confidence in detected delimiter".to_string())
            } else {
                None
            };
            DetectionResult {
                dialect,
                confidence,
                detected_columns: columns,
                rows_analyzed,
                has_header,
                warning,
            }
        }
        None => DetectionResult {
            dialect: Dialect::csv(),
            confidence: 0.0,
            detected_columns: 1,
            rows_analyzed: 0,
            has_header: false,
            warning: Some("no candidate delimiter produced a stable column count".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_tsv_with_high_confidence() {
        let input = b"name\tvalue\nalpha\t1\nbeta\t2\n";
        let result = detect(input);
        assert_eq!(result.dialect.delimiter, b'\t');
        assert!(result.confidence >= 0.9);
        assert_eq!(result.detected_columns, 2);
    }

    #[test]
    fn detects_csv_and_header() {
        let input = b"a,b,c\n1,2,3\n4,5,6\n7,8,9\n";
        let result = detect(input);
        assert_eq!(result.dialect.delimiter, b',');
        assert!(result.has_header);
    }

    #[test]
    fn single_column_has_no_stable_delimiter() {
        let input = b"hello\nworld\nfoo\n";
        let result = detect(input);
        assert_eq!(result.detected_columns, 1);
        assert!(result.warning.is_some());
    }

    #[test]
    fn semicolon_delimited_is_detected() {
        let input = b"a;b\n1;2\n3;4\n";
        let result = detect(input);
        assert_eq!(result.dialect.delimiter, b';');
    }
}
