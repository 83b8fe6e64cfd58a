// Parser façade (component L): composes dialect resolution (K), the
// indexing engine (F), and the error collector (C) into the single entry
// point library and CLI callers use.
//
// Grounded on spec.md §4.L's three-step contract and on `strategy/parallel.rs`'s
// top-level `parse` function, which does the same B+F+G composition for the
// teacher's NIF entry points.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffer::AlignedBuffer;
use crate::config::Config;
use crate::dialect::Dialect;
use crate::dialect_detect::{self, DetectionResult};
use crate::error::{ErrorCollector, LoadError};
use crate::index::{self, IndexOptions, ParseIndex};

/// Progress callback, invoked coarsely around the parallel indexing phase
/// with `(bytes_processed, total_bytes)`. Returning `false` cancels the
/// parse. Sampled at most twice per call (before and after the stripe
/// fork-join), not per block — the engine's own cancellation flag is
/// checked at block granularity internally.
pub type ProgressFn<'a> = dyn FnMut(u64, u64) -> bool + 'a;

pub struct ParseOptions<'a> {
    pub dialect: Option<Dialect>,
    pub config: Config,
    pub progress: Option<&'a mut ProgressFn<'a>>,
}

impl<'a> Default for ParseOptions<'a> {
    fn default() -> Self {
        ParseOptions {
            dialect: None,
            config: Config::default(),
            progress: None,
        }
    }
}

pub struct ParseResult {
    pub buffer: AlignedBuffer,
    pub index: ParseIndex,
    pub dialect: Dialect,
    pub detection: Option<DetectionResult>,
    pub errors: ErrorCollector,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseFacadeError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("parse cancelled by progress callback")]
    Cancelled,
    #[error(transparent)]
    Index(#[from] index::IndexError),
}

/// Parse an in-memory buffer already loaded by the caller.
pub fn parse(buffer: AlignedBuffer, mut opts: ParseOptions) -> Result<ParseResult, ParseFacadeError> {
    let (dialect, detection) = resolve_dialect(&buffer, opts.dialect.take());

    let cancel = AtomicBool::new(false);
    if let Some(cb) = opts.progress.as_deref_mut() {
        if !cb(0, buffer.len() as u64) {
            cancel.store(true, Ordering::Relaxed);
        }
    }

    let collector = ErrorCollector::new(opts.config.error_mode, opts.config.max_errors);
    let index_opts = IndexOptions {
        dialect: &dialect,
        n_threads: opts.config.n_threads,
        skip: opts.config.skip,
        n_max: opts.config.n_max,
        skip_empty_rows: opts.config.skip_empty_rows,
        has_header: opts.config.has_header,
    };

    let built = index::build(&buffer, &index_opts, &collector, &cancel);

    if let Some(cb) = opts.progress.as_deref_mut() {
        if !cb(buffer.len() as u64, buffer.len() as u64) {
            cancel.store(true, Ordering::Relaxed);
        }
    }

    let idx = match built {
        Ok(idx) => idx,
        Err(index::IndexError::Cancelled) => return Err(ParseFacadeError::Cancelled),
        Err(e) => return Err(ParseFacadeError::Index(e)),
    };

    if cancel.load(Ordering::Relaxed) {
        return Err(ParseFacadeError::Cancelled);
    }

    Ok(ParseResult {
        buffer,
        index: idx,
        dialect,
        detection,
        errors: collector,
    })
}

/// Memory-map `path` and parse it.
pub fn parse_file(path: impl AsRef<Path>, opts: ParseOptions) -> Result<ParseResult, ParseFacadeError> {
    let buffer = AlignedBuffer::load(path)?;
    parse(buffer, opts)
}

fn resolve_dialect(buffer: &AlignedBuffer, dialect: Option<Dialect>) -> (Dialect, Option<DetectionResult>) {
    match dialect {
        Some(d) => (d, None),
        None => {
            let result = dialect_detect::detect(buffer.as_slice());
            let dialect = result.dialect;
            (dialect, Some(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorMode;

    #[test]
    fn parses_with_explicit_dialect() {
        let buf = AlignedBuffer::from_bytes(b"a,b,c\n1,2,3\n4,5,6\n");
        let opts = ParseOptions {
            dialect: Some(Dialect::csv()),
            config: Config {
                n_threads: 1,
                ..Config::default()
            },
            progress: None,
        };
        let result = parse(buf, opts).unwrap();
        assert_eq!(result.index.columns, 3);
        assert_eq!(result.index.rows(), 2);
        assert!(result.detection.is_none());
    }

    #[test]
    fn auto_detects_dialect_when_none_given() {
        let buf = AlignedBuffer::from_bytes(b"name\tvalue\nalpha\t1\nbeta\t2\n");
        let opts = ParseOptions {
            dialect: None,
            config: Config {
                n_threads: 1,
                ..Config::default()
            },
            progress: None,
        };
        let result = parse(buf, opts).unwrap();
        assert_eq!(result.dialect.delimiter, b'\t');
        assert!(result.detection.is_some());
    }

    #[test]
    fn progress_callback_returning_false_cancels() {
        let buf = AlignedBuffer::from_bytes(b"a,b\n1,2\n3,4\n");
        let mut cb = |_processed: u64, _total: u64| false;
        let opts = ParseOptions {
            dialect: Some(Dialect::csv()),
            config: Config {
                n_threads: 1,
                ..Config::default()
            },
            progress: Some(&mut cb),
        };
        let err = parse(buf, opts).unwrap_err();
        assert!(matches!(err, ParseFacadeError::Cancelled));
    }

    #[test]
    fn permissive_mode_collects_recoverable_errors() {
        let buf = AlignedBuffer::from_bytes(b"a,b\n1,2\n3,4\x005\n");
        let opts = ParseOptions {
            dialect: Some(Dialect::csv()),
            config: Config {
                n_threads: 1,
                error_mode: ErrorMode::Permissive,
                ..Config::default()
            },
            progress: None,
        };
        let result = parse(buf, opts).unwrap();
        assert!(result.errors.has_errors());
    }
}
