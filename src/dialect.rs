// Dialect: delimiter/quote/escape bytes and the double-quote vs.
// escape-character policy. Immutable once constructed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub escape: u8,
    /// RFC-4180 doubled-quote escaping (`""` -> `"`) when true.
    /// When false, `escape` precedes any literal special character.
    pub double_quote: bool,
    /// Lines whose first byte (after leading skip) matches are dropped
    /// before row-boundary discovery. `None` disables comment skipping.
    pub comment: Option<u8>,
}

impl Dialect {
    pub const fn csv() -> Self {
        Dialect {
            delimiter: b',',
            quote: b'"',
            escape: b'"',
            double_quote: true,
            comment: None,
        }
    }

    pub const fn tsv() -> Self {
        Dialect {
            delimiter: b'\t',
            ..Self::csv()
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Escape-character mode: a dedicated byte precedes literal specials
    /// inside a quoted field, rather than doubling the quote.
    pub fn with_backslash_escape(mut self, escape: u8) -> Self {
        self.escape = escape;
        self.double_quote = false;
        self
    }

    pub fn with_comment(mut self, comment: u8) -> Self {
        self.comment = Some(comment);
        self
    }

    /// The effective escape byte for classification purposes: when
    /// `double_quote` is true, the escape class collapses onto the quote
    /// byte itself (spec.md §3: "escape is ignored for classification").
    #[inline]
    pub fn effective_escape(&self) -> u8 {
        if self.double_quote {
            self.quote
        } else {
            self.escape
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::csv()
    }
}

/// Candidate delimiters tried by the dialect detector (component K).
pub const CANDIDATE_DELIMITERS: [u8; 5] = [b',', b'\t', b';', b'|', b':'];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_quote_mode_collapses_escape_to_quote() {
        let d = Dialect::csv();
        assert_eq!(d.effective_escape(), b'"');
    }

    #[test]
    fn backslash_mode_keeps_distinct_escape() {
        let d = Dialect::csv().with_backslash_escape(b'\\');
        assert_eq!(d.effective_escape(), b'\\');
        assert!(!d.double_quote);
    }

    #[test]
    fn tsv_uses_tab_delimiter() {
        assert_eq!(Dialect::tsv().delimiter, b'\t');
    }
}
