// Lazy typed columns (component J): a `LazyColumn` is a view over
// `(buffer, index, column_index)` that derives byte spans on demand from
// the `ParseIndex`'s flat offset array and only materializes typed values
// when asked. Grounded on `core/field.rs`'s `extract_field_cow_with_escape`
// for unescaping and on the now-deleted `core/simd_index.rs`'s prefix-sum
// field-cursor pattern for byte-span resolution.

use std::borrow::Cow;

use crate::core::field::extract_field_cow_with_escape;
use crate::dialect::Dialect;
use crate::index::ParseIndex;
use crate::types::parse_bool::{parse_bool, DEFAULT_FALSE, DEFAULT_TRUE};
use crate::types::parse_float::parse_f64;
use crate::types::parse_int::parse_i64;
use crate::types::{Locale, ParseValueError};

/// The byte span of one field within a buffer, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub start: u64,
    pub end: u64,
}

/// Per-column (or process-wide default) value-extraction settings. Looked
/// up once per column via `ExtractionConfigSet::resolve` rather than
/// threaded through every call.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub na_strings: Vec<Vec<u8>>,
    pub true_strings: Vec<Vec<u8>>,
    pub false_strings: Vec<Vec<u8>>,
    pub trim_whitespace: bool,
    pub allow_leading_zeros: bool,
    pub max_integer_digits: usize,
    pub locale: Locale,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            na_strings: vec![Vec::new(), b"NA".to_vec()],
            true_strings: DEFAULT_TRUE.iter().map(|s| s.to_vec()).collect(),
            false_strings: DEFAULT_FALSE.iter().map(|s| s.to_vec()).collect(),
            trim_whitespace: false,
            allow_leading_zeros: false,
            max_integer_digits: 19,
            locale: Locale::default(),
        }
    }
}

impl ExtractionConfig {
    fn na_refs(&self) -> Vec<&[u8]> {
        self.na_strings.iter().map(|v| v.as_slice()).collect()
    }

    fn true_refs(&self) -> Vec<&[u8]> {
        self.true_strings.iter().map(|v| v.as_slice()).collect()
    }

    fn false_refs(&self) -> Vec<&[u8]> {
        self.false_strings.iter().map(|v| v.as_slice()).collect()
    }
}

/// Process-wide default plus per-column overrides, resolved once a
/// column's index and (if present) header name are known.
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfigSet {
    pub default: ExtractionConfig,
    pub by_index: Vec<(usize, ExtractionConfig)>,
    pub by_name: Vec<(String, ExtractionConfig)>,
}

impl ExtractionConfigSet {
    pub fn resolve(&self, column: usize, header: Option<&str>) -> &ExtractionConfig {
        if let Some(name) = header {
            if let Some((_, cfg)) = self.by_name.iter().find(|(n, _)| n == name) {
                return cfg;
            }
        }
        if let Some((_, cfg)) = self.by_index.iter().find(|(i, _)| *i == column) {
            return cfg;
        }
        &self.default
    }
}

/// Undo backslash-style escaping (`\X` -> `X`) for dialects using a
/// dedicated escape byte rather than doubled quotes. `core/field.rs`'s
/// unescaper only handles the doubled-quote convention, so this is kept
/// alongside it rather than folded in.
fn unescape_backslash(inner: &[u8], escape: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == escape && i + 1 < inner.len() {
            out.push(inner[i + 1]);
            i += 2;
        } else {
            out.push(inner[i]);
            i += 1;
        }
    }
    out
}

fn strip_quotes(field: &[u8], quote: u8) -> &[u8] {
    if field.len() >= 2 && field[0] == quote && field[field.len() - 1] == quote {
        &field[1..field.len() - 1]
    } else {
        field
    }
}

/// A view over one column of a parsed buffer. Holds no copies of field
/// data; every accessor slices the underlying buffer directly and
/// allocates only when unescaping is unavoidable.
pub struct LazyColumn<'a> {
    buffer: &'a [u8],
    index: &'a ParseIndex,
    column: u64,
    dialect: &'a Dialect,
    config: &'a ExtractionConfig,
}

impl<'a> LazyColumn<'a> {
    pub fn new(buffer: &'a [u8], index: &'a ParseIndex, column: u64, dialect: &'a Dialect, config: &'a ExtractionConfig) -> Self {
        LazyColumn { buffer, index, column, dialect, config }
    }

    pub fn len(&self) -> u64 {
        self.index.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte span of `row`'s field in this column, `row` 0-based and
    /// excluding the header. `start` is the byte after the previous
    /// field's terminator, or `index.data_start` for the buffer's very
    /// first field.
    pub fn byte_bounds(&self, row: u64) -> Option<FieldSpan> {
        if row >= self.len() {
            return None;
        }
        let header_rows = if self.index.has_header { 1 } else { 0 };
        let field_row = row + header_rows;
        let global = field_row * self.index.columns + self.column;
        let end = self.index.field_end(global)?;
        let start = if global == 0 {
            self.index.data_start
        } else {
            self.index.field_end(global - 1)? + 1
        };
        Some(FieldSpan { start, end })
    }

    /// The field's raw bytes, still wrapped in surrounding quotes if any
    /// and with doubled-escape sequences intact.
    pub fn get_raw(&self, row: u64) -> Option<&'a [u8]> {
        let span = self.byte_bounds(row)?;
        Some(&self.buffer[span.start as usize..span.end as usize])
    }

    /// The field's unescaped, unquoted textual content.
    pub fn get_string(&self, row: u64) -> Option<Cow<'a, [u8]>> {
        let span = self.byte_bounds(row)?;
        let raw = strip_cr(&self.buffer[span.start as usize..span.end as usize]);
        if self.dialect.double_quote {
            Some(extract_field_cow_with_escape(raw, 0, raw.len(), self.dialect.quote))
        } else {
            let inner = strip_quotes(raw, self.dialect.quote);
            if inner.contains(&self.dialect.escape) {
                Some(Cow::Owned(unescape_backslash(inner, self.dialect.escape)))
            } else {
                Some(Cow::Borrowed(inner))
            }
        }
    }

    fn field_bytes(&self, row: u64) -> Option<Cow<'a, [u8]>> {
        self.get_string(row)
    }

    pub fn get_i64(&self, row: u64) -> Option<Result<i64, ParseValueError>> {
        let field = self.field_bytes(row)?;
        Some(parse_i64(
            &field,
            &self.config.na_refs(),
            self.config.trim_whitespace,
            self.config.allow_leading_zeros,
            self.config.max_integer_digits,
            self.config.locale,
        ))
    }

    pub fn get_f64(&self, row: u64) -> Option<Result<f64, ParseValueError>> {
        let field = self.field_bytes(row)?;
        Some(parse_f64(&field, &self.config.na_refs(), self.config.trim_whitespace, self.config.locale))
    }

    pub fn get_bool(&self, row: u64) -> Option<Result<bool, ParseValueError>> {
        let field = self.field_bytes(row)?;
        Some(parse_bool(
            &field,
            &self.config.true_refs(),
            &self.config.false_refs(),
            &self.config.na_refs(),
            self.config.trim_whitespace,
        ))
    }

    /// Materialize every row's string value in one pass. Intended for
    /// columns small enough to hold entirely in memory; large columns
    /// should iterate rows directly instead.
    pub fn materialize_strings(&self) -> Vec<Option<Vec<u8>>> {
        (0..self.len())
            .map(|r| self.get_string(r).map(|c| c.into_owned()))
            .collect()
    }

    /// Materialize in fixed-size chunks, yielding each chunk via `sink`
    /// rather than building one large `Vec` up front.
    pub fn materialize_chunked<F: FnMut(&[Option<Vec<u8>>])>(&self, chunk_rows: u64, mut sink: F) {
        let mut buf = Vec::with_capacity(chunk_rows as usize);
        for r in 0..self.len() {
            buf.push(self.get_string(r).map(|c| c.into_owned()));
            if buf.len() as u64 == chunk_rows {
                sink(&buf);
                buf.clear();
            }
        }
        if !buf.is_empty() {
            sink(&buf);
        }
    }
}

/// Strip a trailing `\r` left by CRLF line endings. The indexing engine
/// (component F) records newline-terminated field ends without stripping
/// the preceding `\r`, so that work happens here instead, once per access
/// rather than once per byte scanned.
fn strip_cr(field: &[u8]) -> &[u8] {
    if field.last() == Some(&b'\r') {
        &field[..field.len() - 1]
    } else {
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCollector;
    use crate::index::{build, IndexOptions};
    use crate::buffer::AlignedBuffer;
    use std::sync::atomic::AtomicBool;

    fn build_index(input: &[u8], dialect: &Dialect) -> (AlignedBuffer, ParseIndex) {
        let buf = AlignedBuffer::from_bytes(input);
        let opts = IndexOptions {
            dialect,
            n_threads: 1,
            skip: 0,
            n_max: None,
            skip_empty_rows: false,
            has_header: true,
        };
        let collector = ErrorCollector::new(crate::error::ErrorMode::Permissive, 100);
        let cancel = AtomicBool::new(false);
        let idx = build(&buf, &opts, &collector, &cancel).expect("index build");
        (buf, idx)
    }

    #[test]
    fn reads_plain_column_values() {
        let dialect = Dialect::csv();
        let (buf, idx) = build_index(b"a,b\n1,2\n3,4\n", &dialect);
        let cfg = ExtractionConfig::default();
        let col = LazyColumn::new(buf.as_slice(), &idx, 1, &dialect, &cfg);
        assert_eq!(col.len(), 2);
        assert_eq!(col.get_string(0).unwrap().as_ref(), b"2");
        assert_eq!(col.get_string(1).unwrap().as_ref(), b"4");
        assert_eq!(col.get_i64(0), Some(Ok(2)));
    }

    #[test]
    fn first_field_of_first_row_starts_at_data_start() {
        let dialect = Dialect::csv();
        let (buf, idx) = build_index(b"a,b\n1,2\n", &dialect);
        let cfg = ExtractionConfig::default();
        let col = LazyColumn::new(buf.as_slice(), &idx, 0, &dialect, &cfg);
        let span = col.byte_bounds(0).unwrap();
        assert_eq!(span.start, idx.data_start);
    }

    #[test]
    fn quoted_field_is_unescaped() {
        let dialect = Dialect::csv();
        let (buf, idx) = build_index(b"a,b\n\"he said \"\"hi\"\"\",2\n", &dialect);
        let cfg = ExtractionConfig::default();
        let col = LazyColumn::new(buf.as_slice(), &idx, 0, &dialect, &cfg);
        assert_eq!(col.get_string(0).unwrap().as_ref(), b"he said \"hi\"");
    }

    #[test]
    fn crlf_line_ending_is_stripped() {
        let dialect = Dialect::csv();
        let (buf, idx) = build_index(b"a,b\r\n1,2\r\n", &dialect);
        let cfg = ExtractionConfig::default();
        let col = LazyColumn::new(buf.as_slice(), &idx, 1, &dialect, &cfg);
        assert_eq!(col.get_string(0).unwrap().as_ref(), b"2");
    }

    #[test]
    fn resolve_prefers_name_over_index() {
        let mut set = ExtractionConfigSet::default();
        let mut named = ExtractionConfig::default();
        named.trim_whitespace = true;
        set.by_name.push(("amount".to_string(), named));
        let resolved = set.resolve(3, Some("amount"));
        assert!(resolved.trim_whitespace);
        let fallback = set.resolve(3, Some("other"));
        assert!(!fallback.trim_whitespace);
    }
}
