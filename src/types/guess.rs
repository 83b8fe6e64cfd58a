// Type guesser (component H): ordered predicate chain from strictest to
// loosest, grounded on `guess_type.cc`'s `canParse` chain (logical -> int
// -> double -> general number -> time -> date -> datetime -> string) and
// its `allMissing` all-NA-column special case.

use super::parse_bool::parse_bool;
use super::parse_datetime::{parse_date, parse_datetime, parse_time};
use super::parse_float::parse_f64;
use super::parse_int::parse_i64;
use super::{is_na, Locale};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Logical,
    Integer,
    Double,
    Number,
    Time,
    Date,
    DateTime,
    String,
}

pub struct GuessConfig<'a> {
    pub na_strings: &'a [&'a [u8]],
    pub true_strings: &'a [&'a [u8]],
    pub false_strings: &'a [&'a [u8]],
    pub trim: bool,
    pub allow_leading_zeros: bool,
    pub locale: Locale,
    pub guess_integer: bool,
    pub threshold: f64,
    pub min_samples: usize,
}

impl<'a> Default for GuessConfig<'a> {
    fn default() -> Self {
        GuessConfig {
            na_strings: &[],
            true_strings: &super::parse_bool::DEFAULT_TRUE,
            false_strings: &super::parse_bool::DEFAULT_FALSE,
            trim: true,
            allow_leading_zeros: false,
            locale: Locale::default(),
            guess_integer: true,
            threshold: 0.95,
            min_samples: 10,
        }
    }
}

fn satisfies(value: &[u8], ty: ColumnType, cfg: &GuessConfig) -> bool {
    match ty {
        ColumnType::Logical => parse_bool(value, cfg.true_strings, cfg.false_strings, cfg.na_strings, cfg.trim).is_ok(),
        ColumnType::Integer => {
            parse_i64(value, cfg.na_strings, cfg.trim, cfg.allow_leading_zeros, 19, cfg.locale).is_ok()
        }
        ColumnType::Double => parse_f64(value, cfg.na_strings, cfg.trim, Locale::default()).is_ok(),
        ColumnType::Number => parse_f64(value, cfg.na_strings, cfg.trim, cfg.locale).is_ok(),
        ColumnType::Time => parse_time(value, cfg.na_strings, cfg.trim).is_ok(),
        ColumnType::Date => parse_date(value, cfg.na_strings, cfg.trim).is_ok(),
        ColumnType::DateTime => parse_datetime(value, cfg.na_strings, cfg.trim).is_ok(),
        ColumnType::String => true,
    }
}

/// Predicates tried in order, strictest first. `Integer` is skipped when
/// `guess_integer` is false (caller wants everything numeric to land on
/// `Double`/`Number` instead).
const CANDIDATES: [ColumnType; 7] = [
    ColumnType::Logical,
    ColumnType::Integer,
    ColumnType::Double,
    ColumnType::Number,
    ColumnType::Time,
    ColumnType::Date,
    ColumnType::DateTime,
];

/// A column's type is the strictest predicate satisfied by every sampled
/// non-NA value. An all-NA sample set guesses `Logical` (vroom's
/// `allMissing` rule).
pub fn guess_column_type(samples: &[&[u8]], cfg: &GuessConfig) -> ColumnType {
    let non_na: Vec<&[u8]> = samples
        .iter()
        .copied()
        .filter(|s| !is_na(s, cfg.na_strings, cfg.trim))
        .collect();

    if non_na.is_empty() {
        return ColumnType::Logical;
    }

    for &candidate in CANDIDATES.iter() {
        if candidate == ColumnType::Integer && !cfg.guess_integer {
            continue;
        }
        if non_na.iter().all(|v| satisfies(v, candidate, cfg)) {
            return candidate;
        }
    }
    ColumnType::String
}

/// Fraction of non-NA samples satisfying `ty` — the primitive a
/// multi-column scheduler uses to decide a column is confirmed early
/// (>= `threshold` of >= `min_samples` values) without waiting for every
/// sample to be tested.
pub fn confidence(samples: &[&[u8]], ty: ColumnType, cfg: &GuessConfig) -> f64 {
    let non_na: Vec<&[u8]> = samples
        .iter()
        .copied()
        .filter(|s| !is_na(s, cfg.na_strings, cfg.trim))
        .collect();
    if non_na.is_empty() {
        return 0.0;
    }
    let matches = non_na.iter().filter(|v| satisfies(v, ty, cfg)).count();
    matches as f64 / non_na.len() as f64
}

/// Select sample indices by stride over `num_rows`, covering the whole
/// column rather than just the head.
pub fn stride_sample_indices(num_rows: u64, guess_max: u64) -> Vec<u64> {
    if num_rows == 0 || guess_max == 0 {
        return Vec::new();
    }
    if num_rows <= guess_max {
        return (0..num_rows).collect();
    }
    let step = (num_rows / guess_max).max(1);
    (0..num_rows).step_by(step as usize).take(guess_max as usize).collect()
}
