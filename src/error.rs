// Error taxonomy and the collector shared across the indexing engine.
//
// Errors are classified by severity, not by origin: Warning (parsing
// proceeds unaffected), Recoverable (a localized defect, field/row marked),
// Fatal (the whole parse stops). See ErrorMode for fail-fast / permissive /
// best-effort behavior.

use std::fmt;
use std::sync::Mutex;

/// Wire-stable error codes (spec.md §6 "Error taxonomy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    None = 0,
    UnclosedQuote = 1,
    InvalidQuoteEscape = 2,
    QuoteInUnquotedField = 3,
    InconsistentFieldCount = 4,
    FieldTooLarge = 5,
    MixedLineEndings = 6,
    InvalidUtf8 = 8,
    NullByte = 9,
    EmptyHeader = 10,
    DuplicateColumnNames = 11,
    AmbiguousSeparator = 12,
    FileTooLarge = 13,
    IOError = 14,
    InternalError = 15,
    Cancelled = 100,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Recoverable,
    Fatal,
}

/// A single diagnostic, with byte-precise location.
///
/// `line`/`column` are resolved lazily (see `ParseError::resolve_location`):
/// the hot loop only ever records a byte offset.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub code: ErrorCode,
    pub severity: Severity,
    pub byte_offset: usize,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    pub context_snippet: String,
}

impl ParseError {
    pub fn new(code: ErrorCode, severity: Severity, byte_offset: usize, message: impl Into<String>) -> Self {
        ParseError {
            code,
            severity,
            byte_offset,
            line: None,
            column: None,
            message: message.into(),
            context_snippet: String::new(),
        }
    }

    /// Build the `context_snippet`: up to 20 bytes around the offset, with
    /// control characters escaped.
    pub fn with_snippet(mut self, buffer: &[u8]) -> Self {
        let start = self.byte_offset.saturating_sub(10);
        let end = (self.byte_offset + 10).min(buffer.len());
        let mut snippet = String::with_capacity(end - start);
        for &b in &buffer[start..end] {
            match b {
                b'\n' => snippet.push_str("\\n"),
                b'\r' => snippet.push_str("\\r"),
                b'\t' => snippet.push_str("\\t"),
                0x20..=0x7e => snippet.push(b as char),
                _ => snippet.push_str(&format!("\\x{:02x}", b)),
            }
        }
        self.context_snippet = snippet;
        self
    }

    /// Resolve `(line, column)` by a linear scan from the nearest known line
    /// start. Deliberately not done in the hot loop (spec.md §7).
    pub fn resolve_location(&mut self, buffer: &[u8]) {
        let mut line = 1u32;
        let mut col = 1u32;
        for &b in &buffer[..self.byte_offset.min(buffer.len())] {
            if b == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        self.line = Some(line);
        self.column = Some(col);
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] byte {}: {} (near \"{}\")",
            self.severity, self.byte_offset, self.message, self.context_snippet
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    FailFast,
    Permissive,
    BestEffort,
}

/// Signal returned by the block kernel / state machine when an error occurs,
/// letting the caller short-circuit without touching the shared collector
/// on the hot path (spec.md §9: "fail-fast short-circuit path ... without
/// locking").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSignal {
    Continue,
    StopStripe,
    Abort,
}

/// The error collector: the only shared mutable state during indexing.
/// Guarded by a lightweight mutex; writes are rare in the common case.
pub struct ErrorCollector {
    mode: ErrorMode,
    cap: usize,
    errors: Mutex<Vec<ParseError>>,
    fatal: std::sync::atomic::AtomicBool,
}

impl ErrorCollector {
    pub fn new(mode: ErrorMode, cap: usize) -> Self {
        ErrorCollector {
            mode,
            cap,
            errors: Mutex::new(Vec::new()),
            fatal: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Record an error, honoring the configured mode. Returns the signal the
    /// caller should act on (continue scanning, stop this stripe, or abort
    /// the whole parse).
    pub fn record(&self, err: ParseError) -> ErrorSignal {
        if err.severity == Severity::Fatal {
            self.fatal.store(true, std::sync::atomic::Ordering::SeqCst);
        }

        let mut guard = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        let is_new_error = guard.len() < self.cap;
        if is_new_error {
            guard.push(err.clone());
        }
        drop(guard);

        match (self.mode, err.severity) {
            (_, Severity::Fatal) => ErrorSignal::Abort,
            (ErrorMode::FailFast, Severity::Recoverable) => ErrorSignal::Abort,
            (ErrorMode::FailFast, Severity::Warning) => ErrorSignal::Continue,
            (ErrorMode::Permissive, Severity::Recoverable) => {
                if is_new_error {
                    ErrorSignal::Continue
                } else {
                    ErrorSignal::Abort
                }
            }
            (ErrorMode::Permissive, Severity::Warning) => ErrorSignal::Continue,
            (ErrorMode::BestEffort, Severity::Recoverable) => ErrorSignal::Continue,
            (ErrorMode::BestEffort, Severity::Warning) => ErrorSignal::Continue,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.fatal.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.errors.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<ParseError> {
        self.errors.lock().unwrap_or_else(|e| e.into_inner()).get(i).cloned()
    }

    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    /// Human-readable summary: severity breakdown, then the first `k` details.
    pub fn summary(&self, k: usize) -> String {
        let guard = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        let mut warnings = 0usize;
        let mut recoverable = 0usize;
        let mut fatal = 0usize;
        for e in guard.iter() {
            match e.severity {
                Severity::Warning => warnings += 1,
                Severity::Recoverable => recoverable += 1,
                Severity::Fatal => fatal += 1,
            }
        }

        let mut out = format!(
            "{} warning(s), {} recoverable, {} fatal",
            warnings, recoverable, fatal
        );
        for e in guard.iter().take(k) {
            out.push('\n');
            out.push_str(&format!("  {}", e));
        }
        out
    }
}

/// Top-level library error type for operations outside the hot loop
/// (I/O, sidecar decoding, CLI-facing failures).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("source promised data but produced none")]
    EmptySource,
    #[error("file too large to map ({0} bytes)")]
    TooLarge(u64),
    #[error("sidecar index format is invalid or unsupported (version {0})")]
    BadSidecar(u8),
    #[error("parse cancelled by progress callback")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_fast_aborts_on_recoverable() {
        let c = ErrorCollector::new(ErrorMode::FailFast, 100);
        let sig = c.record(ParseError::new(ErrorCode::NullByte, Severity::Recoverable, 0, "x"));
        assert_eq!(sig, ErrorSignal::Abort);
    }

    #[test]
    fn permissive_continues_under_cap() {
        let c = ErrorCollector::new(ErrorMode::Permissive, 2);
        assert_eq!(
            c.record(ParseError::new(ErrorCode::NullByte, Severity::Recoverable, 0, "x")),
            ErrorSignal::Continue
        );
        assert_eq!(
            c.record(ParseError::new(ErrorCode::NullByte, Severity::Recoverable, 1, "x")),
            ErrorSignal::Continue
        );
        assert_eq!(
            c.record(ParseError::new(ErrorCode::NullByte, Severity::Recoverable, 2, "x")),
            ErrorSignal::Abort
        );
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn best_effort_continues_past_cap() {
        let c = ErrorCollector::new(ErrorMode::BestEffort, 1);
        for i in 0..5 {
            assert_eq!(
                c.record(ParseError::new(ErrorCode::NullByte, Severity::Recoverable, i, "x")),
                ErrorSignal::Continue
            );
        }
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn fatal_always_aborts() {
        for mode in [ErrorMode::FailFast, ErrorMode::Permissive, ErrorMode::BestEffort] {
            let c = ErrorCollector::new(mode, 100);
            let sig = c.record(ParseError::new(ErrorCode::UnclosedQuote, Severity::Fatal, 0, "x"));
            assert_eq!(sig, ErrorSignal::Abort);
            assert!(c.has_fatal());
        }
    }

    #[test]
    fn snippet_escapes_control_chars() {
        let buf = b"a,b\n1,2\x013\n";
        let e = ParseError::new(ErrorCode::NullByte, Severity::Recoverable, 7, "bad byte")
            .with_snippet(buf);
        assert!(e.context_snippet.contains("\\x01"));
    }
}
