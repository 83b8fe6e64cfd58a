// The parse index: a compact field-boundary index built by the two-pass
// engine (component F) and consumed by lazy columns (component J).

mod engine;
mod collection;

pub use collection::{FileIndex, IndexCollection};
pub use engine::{build, IndexOptions};

/// Offsets of every field boundary for a buffer parsed with `n_threads`
/// worker stripes. `offsets` is the concatenation of `n_threads` contiguous,
/// strictly-increasing ranges of 64-bit byte offsets; each offset is the
/// byte position of the delimiter or newline that *terminates* a field.
#[derive(Debug, Clone, Default)]
pub struct ParseIndex {
    pub columns: u64,
    pub n_threads: u16,
    pub n_offsets: Vec<u64>,
    pub offsets: Vec<u64>,
    pub has_header: bool,
    /// Byte offset where the first row begins, i.e. past any skipped or
    /// comment-prefixed leading lines. Field 0 of row 0 starts here, not at
    /// buffer offset 0.
    pub data_start: u64,
}

impl ParseIndex {
    pub fn total_offsets(&self) -> u64 {
        self.offsets.len() as u64
    }

    /// Number of data rows, excluding the header if present.
    pub fn rows(&self) -> u64 {
        if self.columns == 0 {
            return 0;
        }
        let total = self.total_offsets() / self.columns;
        total.saturating_sub(if self.has_header { 1 } else { 0 })
    }

    /// Byte offset ending the `n`-th field counting from the start of the
    /// buffer (0-based, includes the header row's fields if present).
    pub fn field_end(&self, global_field_index: u64) -> Option<u64> {
        self.offsets.get(global_field_index as usize).copied()
    }

    /// Convert a flat field index into `(stripe, offset_within_stripe)` via
    /// a prefix sum of `n_offsets`. `O(n_threads)`, not `O(n_offsets)`.
    pub fn locate(&self, global_field_index: u64) -> Option<(usize, u64)> {
        let mut cum = 0u64;
        for (t, &n) in self.n_offsets.iter().enumerate() {
            if global_field_index < cum + n {
                return Some((t, global_field_index - cum));
            }
            cum += n;
        }
        None
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum IndexError {
    #[error("parse cancelled")]
    Cancelled,
    #[error("stripe speculation failed and the single-threaded fallback also failed")]
    SpeculationFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParseIndex {
        ParseIndex {
            columns: 3,
            n_threads: 2,
            n_offsets: vec![6, 3],
            offsets: (0..9).map(|i| i as u64 * 10).collect(),
            has_header: true,
            data_start: 0,
        }
    }

    #[test]
    fn rows_excludes_header() {
        let idx = sample();
        assert_eq!(idx.rows(), 2); // 9 offsets / 3 columns = 3 rows, minus header
    }

    #[test]
    fn locate_finds_correct_stripe() {
        let idx = sample();
        assert_eq!(idx.locate(0), Some((0, 0)));
        assert_eq!(idx.locate(5), Some((0, 5)));
        assert_eq!(idx.locate(6), Some((1, 0)));
        assert_eq!(idx.locate(8), Some((1, 2)));
        assert_eq!(idx.locate(9), None);
    }
}
