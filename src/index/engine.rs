// The two-pass indexing engine (component F).
//
// First pass is a short single-threaded scalar scan that skips leading/
// comment lines and scans the first complete row to establish `columns`.
// Second pass splits the remainder into `n_threads` stripes at speculative
// (quote-unaware) newline boundaries and scans each stripe's 64-byte blocks
// in parallel with the mask kernels (component D), each stripe assuming it
// starts outside a quoted field. If any non-final stripe ends with a
// nonzero quote carry, that assumption was wrong somewhere in the buffer
// and the whole buffer is re-indexed single-threaded.
//
// Grounded on `strategy/parallel.rs`'s two-phase `find_row_starts` +
// `rayon::par_iter` structure, generalized to the contiguous-offset-array
// model, and on `core/simd_scanner.rs`'s carry-propagation loop.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::buffer::AlignedBuffer;
use crate::dialect::Dialect;
use crate::error::{ErrorCode, ErrorCollector, ParseError, Severity};
use crate::simd::{dispatch, escape_mask, line_ending_mask, quote_mask, write_bits};
use crate::state_machine::StateMachine;

use super::{IndexError, ParseIndex};

pub struct IndexOptions<'a> {
    pub dialect: &'a Dialect,
    pub n_threads: usize,
    pub skip: usize,
    pub n_max: Option<u64>,
    pub skip_empty_rows: bool,
    pub has_header: bool,
}

struct FirstPassResult {
    data_start: usize,
    columns: u64,
}

fn first_pass(buf: &[u8], dialect: &Dialect, skip: usize) -> FirstPassResult {
    let mut pos = 0usize;
    let mut lines_to_skip = skip;
    loop {
        if pos >= buf.len() {
            break;
        }
        let is_comment = dialect.comment.map_or(false, |c| buf[pos] == c);
        if lines_to_skip > 0 || is_comment {
            if lines_to_skip > 0 {
                lines_to_skip -= 1;
            }
            match memchr_newline(buf, pos) {
                Some(nl) => pos = nl + 1,
                None => {
                    pos = buf.len();
                    break;
                }
            }
            continue;
        }
        break;
    }

    let data_start = pos;
    if data_start >= buf.len() {
        return FirstPassResult { data_start, columns: 0 };
    }

    let columns = count_row_columns(buf, data_start, dialect);
    FirstPassResult { data_start, columns }
}

/// Scan one row's worth of fields starting at `start`, stopping at the
/// first unescaped newline or at `buf.len()` if the row runs off the end
/// of the buffer without one. Used both to establish the header's column
/// count and, by `reconcile_trailing_row`, to size a dangling final row.
fn count_row_columns(buf: &[u8], start: usize, dialect: &Dialect) -> u64 {
    if start >= buf.len() {
        return 0;
    }
    let mut sm = StateMachine::new(
        dialect.delimiter,
        dialect.quote,
        dialect.effective_escape(),
        dialect.double_quote,
    );
    let mut columns = 1u64;
    let mut i = start;
    while i < buf.len() {
        let byte = buf[i];
        let r = sm.step(byte);
        i += 1;
        if r.emits_separator() {
            if byte == b'\n' {
                break;
            }
            columns += 1;
        }
    }
    columns
}

fn memchr_newline(buf: &[u8], from: usize) -> Option<usize> {
    buf[from..].iter().position(|&b| b == b'\n').map(|p| p + from)
}

/// Speculative stripe boundaries: divide `[start, end)` into `n_threads`
/// nearly-equal ranges, nudging each division point forward to the next
/// newline (without tracking quote state — that's the speculation).
fn stripe_boundaries(buf: &[u8], start: usize, end: usize, n_threads: usize) -> Vec<usize> {
    let mut bounds = Vec::with_capacity(n_threads + 1);
    bounds.push(start);
    if n_threads <= 1 || end <= start {
        bounds.push(end);
        return bounds;
    }
    let span = end - start;
    let mut prev = start;
    for k in 1..n_threads {
        let target = (start + (span * k) / n_threads).max(prev);
        let mut p = target;
        while p < end && buf[p] != b'\n' {
            p += 1;
        }
        if p < end {
            p += 1;
        }
        let p = p.max(prev).min(end);
        bounds.push(p);
        prev = p;
    }
    bounds.push(end);
    bounds
}

struct StripeResult {
    offsets: Vec<u64>,
    ending_carry_quote: u64,
    saw_cr: bool,
    null_positions: Vec<u64>,
    cancelled: bool,
}

fn scan_stripe(
    buf: &AlignedBuffer,
    start: usize,
    end: usize,
    dialect: &Dialect,
    cancel: &AtomicBool,
) -> StripeResult {
    let d = dispatch();
    let mut offsets = Vec::new();
    let mut null_positions = Vec::new();
    let mut local_bits: Vec<u32> = Vec::new();
    let mut carry_quote: u64 = 0;
    let mut carry_escape = false;
    let mut carry_cr = false;
    let mut saw_cr = false;
    let mut pos = start;

    while pos < end {
        if cancel.load(Ordering::Relaxed) {
            return StripeResult {
                offsets,
                ending_carry_quote: carry_quote,
                saw_cr,
                null_positions,
                cancelled: true,
            };
        }

        let block = buf.read_block(pos);
        let valid_len = (end - pos).min(64);
        let valid_mask: u64 = if valid_len >= 64 {
            u64::MAX
        } else {
            (1u64 << valid_len) - 1
        };

        let mut quotes = (d.eq_mask)(&block, dialect.quote);
        let mut delimiters = (d.eq_mask)(&block, dialect.delimiter);
        let mut newlines = (d.eq_mask)(&block, b'\n');
        let cr = (d.eq_mask)(&block, b'\r') & valid_mask;
        if cr != 0 {
            saw_cr = true;
        }

        let nulls = (d.eq_mask)(&block, 0) & valid_mask;
        local_bits.clear();
        write_bits(&mut local_bits, 0, nulls);
        null_positions.extend(local_bits.iter().map(|&b| pos as u64 + b as u64));

        if !dialect.double_quote {
            let escape_bits = (d.eq_mask)(&block, dialect.escape);
            let (escaped, new_carry) = escape_mask(escape_bits, carry_escape);
            carry_escape = new_carry;
            quotes &= !escaped;
            delimiters &= !escaped;
            newlines &= !escaped;
        }

        let (inside_quote, new_carry) = quote_mask(quotes, carry_quote);
        carry_quote = new_carry;

        // A CR that ended the previous block couldn't be resolved against
        // its following byte there, since that byte lives in this block.
        // If this block opens with the LF, the pair was already a single
        // CRLF line ending (the LF below accounts for it); otherwise the
        // carried CR was standalone and is emitted now, at its own position.
        let lf_completes_carry = carry_cr && (newlines & 1) != 0;
        if carry_cr && !lf_completes_carry {
            offsets.push(pos as u64 - 1);
        }

        // Symmetrically, this block's own trailing CR (bit 63) has no
        // same-block LF to pair against — bit 64 doesn't exist — so defer
        // its classification to the next iteration instead of resolving it
        // as standalone here, which would double-count a CRLF that straddles
        // the block boundary.
        let boundary_bit = 1u64 << 63;
        let trailing_cr =
            valid_len >= 64 && (cr & boundary_bit) != 0 && (inside_quote & boundary_bit) == 0;
        let cr_for_line_ending = if trailing_cr { cr & !boundary_bit } else { cr };

        let line_endings = line_ending_mask(newlines, cr_for_line_ending, valid_mask);
        let field_seps = (delimiters | line_endings) & !inside_quote & valid_mask;

        local_bits.clear();
        write_bits(&mut local_bits, 0, field_seps);
        offsets.extend(local_bits.iter().map(|&b| pos as u64 + b as u64));

        carry_cr = trailing_cr;
        pos += 64;
    }

    if carry_cr {
        offsets.push(end as u64 - 1);
    }

    StripeResult {
        offsets,
        ending_carry_quote: carry_quote,
        saw_cr,
        null_positions,
        cancelled: false,
    }
}

fn filter_empty_rows(offsets: Vec<u64>, columns: u64, data_start: u64) -> Vec<u64> {
    if columns == 0 {
        return offsets;
    }
    let columns = columns as usize;
    let mut kept = Vec::with_capacity(offsets.len());
    let mut row_start = data_start;
    let mut i = 0;
    while i + columns <= offsets.len() {
        let row_ends = &offsets[i..i + columns];
        let mut all_empty = true;
        let mut field_start = row_start;
        for &end in row_ends {
            if end > field_start {
                all_empty = false;
            }
            field_start = end + 1;
        }
        if !all_empty {
            kept.extend_from_slice(row_ends);
        }
        row_start = row_ends[columns - 1] + 1;
        i += columns;
    }
    kept
}

/// A file that doesn't end on a delimiter or newline drops its last field's
/// terminator entirely — nothing in `offsets` records where it ends. If the
/// dangling row's total field count (what's already recorded plus what's
/// left at the tail) matches `columns`, synthesize a terminator at
/// `buf.len()` so the row is kept; otherwise the row is malformed and gets
/// reported instead of silently shifting every later row's alignment.
fn reconcile_trailing_row(
    offsets: &mut Vec<u64>,
    columns: u64,
    data_start: u64,
    buf: &[u8],
    dialect: &Dialect,
    collector: &ErrorCollector,
) {
    let buf_len = buf.len() as u64;
    let last_field_start = offsets.last().map(|&o| o + 1).unwrap_or(data_start);
    if last_field_start >= buf_len {
        return;
    }
    let fields_recorded = offsets.len() as u64 % columns;
    let trailing_fields = count_row_columns(buf, last_field_start as usize, dialect);
    if fields_recorded + trailing_fields == columns {
        offsets.push(buf_len);
    } else {
        collector.record(
            ParseError::new(
                ErrorCode::InconsistentFieldCount,
                Severity::Recoverable,
                last_field_start as usize,
                "final row's field count does not match the header",
            )
            .with_snippet(buf),
        );
    }
}

/// Walk the assembled offsets one row (`columns` offsets) at a time and
/// confirm every position but the last is a mid-row delimiter and the last
/// is a row terminator (a newline, a standalone CR, or the synthetic
/// end-of-buffer marker `reconcile_trailing_row` adds). A row with the
/// wrong field count shifts every offset after it into the wrong row, so
/// it's reported here rather than silently carried forward.
fn validate_field_counts(offsets: &[u64], columns: u64, buf: &[u8], collector: &ErrorCollector) {
    if columns == 0 {
        return;
    }
    let columns = columns as usize;
    let buf_len = buf.len() as u64;
    let is_terminator = |pos: u64| pos == buf_len || matches!(buf.get(pos as usize), Some(&b'\n') | Some(&b'\r'));

    let mut i = 0;
    while i + columns <= offsets.len() {
        let row = &offsets[i..i + columns];
        if !is_terminator(row[columns - 1]) {
            collector.record(ParseError::new(
                ErrorCode::InconsistentFieldCount,
                Severity::Recoverable,
                row[columns - 1] as usize,
                "row has more fields than the header",
            ));
        } else if let Some(&mid) = row[..columns - 1].iter().find(|&&p| is_terminator(p)) {
            collector.record(ParseError::new(
                ErrorCode::InconsistentFieldCount,
                Severity::Recoverable,
                mid as usize,
                "row has fewer fields than the header",
            ));
        }
        i += columns;
    }
}

fn rebucket(offsets: &[u64], ranges: &[(usize, usize)]) -> Vec<u64> {
    let mut counts = vec![0u64; ranges.len()];
    let mut r = 0usize;
    for &off in offsets {
        while r + 1 < ranges.len() && (off as usize) >= ranges[r].1 {
            r += 1;
        }
        counts[r] += 1;
    }
    counts
}

fn assemble(
    fp: &FirstPassResult,
    results: Vec<StripeResult>,
    ranges: &[(usize, usize)],
    n_threads: usize,
    opts: &IndexOptions,
    buf: &AlignedBuffer,
    collector: &ErrorCollector,
) -> ParseIndex {
    let columns = fp.columns.max(1);
    let mut offsets = Vec::new();
    for r in results {
        offsets.extend(r.offsets);
    }

    reconcile_trailing_row(&mut offsets, columns, fp.data_start as u64, buf.as_slice(), opts.dialect, collector);
    validate_field_counts(&offsets, columns, buf.as_slice(), collector);

    if opts.skip_empty_rows {
        offsets = filter_empty_rows(offsets, columns, fp.data_start as u64);
    }
    if let Some(n_max) = opts.n_max {
        let header_rows = if opts.has_header { 1 } else { 0 };
        let cap = (n_max + header_rows) * columns;
        if (offsets.len() as u64) > cap {
            offsets.truncate(cap as usize);
        }
    }
    let n_offsets = rebucket(&offsets, ranges);
    ParseIndex {
        columns,
        n_threads: n_threads as u16,
        n_offsets,
        offsets,
        has_header: opts.has_header,
        data_start: fp.data_start as u64,
    }
}

/// Build a `ParseIndex` for `buf`, recording diagnostics into `collector`.
/// `cancel` is checked at every block boundary in every stripe; setting it
/// from another thread aborts the parse and returns `IndexError::Cancelled`.
pub fn build(
    buf: &AlignedBuffer,
    opts: &IndexOptions,
    collector: &ErrorCollector,
    cancel: &AtomicBool,
) -> Result<ParseIndex, IndexError> {
    let fp = first_pass(buf, opts.dialect, opts.skip);

    if fp.data_start >= buf.len() {
        return Ok(ParseIndex {
            columns: fp.columns.max(1),
            n_threads: 1,
            n_offsets: vec![0],
            offsets: Vec::new(),
            has_header: opts.has_header,
            data_start: fp.data_start as u64,
        });
    }

    let n_threads = opts.n_threads.max(1);
    let bounds = stripe_boundaries(buf, fp.data_start, buf.len(), n_threads);
    let ranges: Vec<(usize, usize)> = (0..n_threads).map(|t| (bounds[t], bounds[t + 1])).collect();

    let results: Vec<StripeResult> = ranges
        .par_iter()
        .map(|&(s, e)| scan_stripe(buf, s, e, opts.dialect, cancel))
        .collect();

    if results.iter().any(|r| r.cancelled) {
        return Err(IndexError::Cancelled);
    }

    let speculation_failed = results
        .iter()
        .enumerate()
        .any(|(t, r)| r.ending_carry_quote != 0 && t + 1 != results.len());

    if speculation_failed {
        tracing::warn!(
            n_threads,
            "stripe quote-carry speculation failed; falling back to single-threaded re-index"
        );
        let whole = scan_stripe(buf, fp.data_start, buf.len(), opts.dialect, cancel);
        if whole.cancelled {
            return Err(IndexError::Cancelled);
        }
        record_stripe_diagnostics(&whole, buf, collector);
        let whole_range = [(fp.data_start, buf.len())];
        return Ok(assemble(&fp, vec![whole], &whole_range, 1, opts, buf, collector));
    }

    for r in &results {
        record_stripe_diagnostics(r, buf, collector);
    }

    Ok(assemble(&fp, results, &ranges, n_threads, opts, buf, collector))
}

fn record_stripe_diagnostics(r: &StripeResult, buf: &AlignedBuffer, collector: &ErrorCollector) {
    for &pos in &r.null_positions {
        collector.record(
            ParseError::new(ErrorCode::NullByte, Severity::Recoverable, pos as usize, "null byte in input")
                .with_snippet(buf),
        );
    }
    if r.saw_cr {
        collector.record(ParseError::new(
            ErrorCode::MixedLineEndings,
            Severity::Warning,
            0,
            "input mixes CRLF and LF line endings",
        ));
    }
    if r.ending_carry_quote != 0 {
        collector.record(ParseError::new(
            ErrorCode::UnclosedQuote,
            Severity::Fatal,
            buf.len(),
            "unterminated quoted field at end of input",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorMode;

    fn dialect() -> Dialect {
        Dialect::csv()
    }

    fn index_of(input: &[u8], n_threads: usize) -> (ParseIndex, ErrorCollector) {
        let buf = AlignedBuffer::from_bytes(input);
        let d = dialect();
        let opts = IndexOptions {
            dialect: &d,
            n_threads,
            skip: 0,
            n_max: None,
            skip_empty_rows: false,
            has_header: true,
        };
        let collector = ErrorCollector::new(ErrorMode::Permissive, 100);
        let cancel = AtomicBool::new(false);
        let idx = build(&buf, &opts, &collector, &cancel).expect("index build");
        (idx, collector)
    }

    #[test]
    fn plain_csv_header_and_two_rows() {
        let (idx, _c) = index_of(b"a,b,c\n1,2,3\n4,5,6\n", 1);
        assert_eq!(idx.columns, 3);
        assert_eq!(idx.rows(), 2);
    }

    #[test]
    fn field_end_matches_expected_bytes() {
        let input = b"a,b,c\n1,2,3\n4,5,6\n";
        let (idx, _c) = index_of(input, 1);
        // header row fields end at the two commas and the newline.
        assert_eq!(idx.field_end(0), Some(1));
        assert_eq!(idx.field_end(1), Some(3));
        assert_eq!(idx.field_end(2), Some(5));
    }

    #[test]
    fn quoted_field_with_embedded_delimiter_and_newline() {
        let input = b"x,y\n\"hello, world\",\"he said \"\"hi\"\"\"\n";
        let (idx, _c) = index_of(input, 1);
        assert_eq!(idx.columns, 2);
        assert_eq!(idx.rows(), 1);
    }

    #[test]
    fn multi_stripe_matches_single_stripe() {
        let mut input = String::from("a,b\n");
        for i in 0..2000 {
            input.push_str(&format!("{},{}\n", i, i * 2));
        }
        let (single, _) = index_of(input.as_bytes(), 1);
        let (multi, _) = index_of(input.as_bytes(), 8);
        assert_eq!(single.rows(), multi.rows());
        assert_eq!(single.offsets, multi.offsets);
    }

    #[test]
    fn skip_lines_before_header() {
        let input = b"# generated file\na,b\n1,2\n";
        let buf = AlignedBuffer::from_bytes(input);
        let d = dialect();
        let opts = IndexOptions {
            dialect: &d,
            n_threads: 1,
            skip: 1,
            n_max: None,
            skip_empty_rows: false,
            has_header: true,
        };
        let collector = ErrorCollector::new(ErrorMode::Permissive, 100);
        let cancel = AtomicBool::new(false);
        let idx = build(&buf, &opts, &collector, &cancel).expect("index build");
        assert_eq!(idx.columns, 2);
        assert_eq!(idx.rows(), 1);
    }

    #[test]
    fn trailing_row_without_newline_with_matching_field_count_is_kept() {
        let (idx, _c) = index_of(b"a,b\n1,2\n3,4", 1);
        assert_eq!(idx.rows(), 2);
    }

    #[test]
    fn trailing_row_with_wrong_field_count_is_reported() {
        let (idx, c) = index_of(b"a,b\n1,2\n3", 1);
        assert_eq!(idx.rows(), 1);
        assert!(c.has_errors());
    }

    #[test]
    fn crlf_split_across_block_boundary_is_not_double_counted() {
        // Single-column file; scan_stripe's blocks start at data_start (0),
        // so block 0 covers bytes [0, 64). Lay the row out so the CRLF
        // lands with the CR at byte 63 (block 0's last bit) and the LF at
        // byte 64 (block 1's first bit).
        let mut input = Vec::new();
        input.extend_from_slice(b"h\n");
        input.extend(std::iter::repeat(b'x').take(61));
        input.extend_from_slice(b"\r\n");
        input.extend_from_slice(b"y\n");

        let (idx, _c) = index_of(&input, 1);
        assert_eq!(idx.columns, 1);
        assert_eq!(idx.rows(), 2);
        assert_eq!(idx.offsets, vec![1, 64, 66]);
    }

    #[test]
    fn skip_empty_rows_drops_blank_lines() {
        let input = b"a\n1\n\n2\n";
        let buf = AlignedBuffer::from_bytes(input);
        let d = dialect();
        let opts = IndexOptions {
            dialect: &d,
            n_threads: 1,
            skip: 0,
            n_max: None,
            skip_empty_rows: true,
            has_header: true,
        };
        let collector = ErrorCollector::new(ErrorMode::Permissive, 100);
        let cancel = AtomicBool::new(false);
        let idx = build(&buf, &opts, &collector, &cancel).expect("index build");
        assert_eq!(idx.rows(), 2);
    }
}
