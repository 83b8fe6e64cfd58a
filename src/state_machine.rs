// Branchless CSV state machine (component E).
//
// Six states crossed with five character classes produce a packed
// transition table: callers feed bytes and receive the next state plus an
// error flag and a separator-emission flag, with no per-byte branching
// beyond the two table lookups (classify, then transition).
//
// Grounded directly on the reference `branchless_state_machine.h`'s
// CharClass/BranchlessState/PackedResult model, re-expressed as Rust enums
// and a const table instead of a runtime-built array.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CharClass {
    Delimiter = 0,
    Quote = 1,
    Newline = 2,
    Other = 3,
    Escape = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    RecordStart = 0,
    FieldStart = 1,
    UnquotedField = 2,
    QuotedField = 3,
    QuotedEnd = 4,
    Escaped = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StateError {
    None = 0,
    InvalidQuoteEscape = 1,
    QuoteInUnquotedField = 2,
}

/// One byte: bits 6-7 error, bits 3-5 next state, bit 2 emits-separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedResult(u8);

impl PackedResult {
    const fn make(next: State, error: StateError, emits_separator: bool) -> Self {
        PackedResult(((error as u8) << 6) | ((next as u8) << 3) | ((emits_separator as u8) << 2))
    }

    #[inline]
    pub fn state(self) -> State {
        match (self.0 >> 3) & 0b111 {
            0 => State::RecordStart,
            1 => State::FieldStart,
            2 => State::UnquotedField,
            3 => State::QuotedField,
            4 => State::QuotedEnd,
            _ => State::Escaped,
        }
    }

    #[inline]
    pub fn error(self) -> StateError {
        match (self.0 >> 6) & 0b11 {
            0 => StateError::None,
            1 => StateError::InvalidQuoteEscape,
            _ => StateError::QuoteInUnquotedField,
        }
    }

    #[inline]
    pub fn emits_separator(self) -> bool {
        (self.0 >> 2) & 1 == 1
    }
}

/// `transition_table()[state][class]`.
const fn table() -> [[PackedResult; 5]; 6] {
    use CharClass::*;
    use State::*;
    use StateError::*;

    let mut t = [[PackedResult::make(RecordStart, None, false); 5]; 6];

    // RecordStart and FieldStart behave identically: both are "about to
    // start a field", distinguished only so callers can tell a fresh row
    // apart from a fresh field mid-row.
    let mut s = 0;
    while s <= 1 {
        let state = if s == 0 { RecordStart } else { FieldStart };
        t[s][Delimiter as usize] = PackedResult::make(FieldStart, None, true);
        t[s][Quote as usize] = PackedResult::make(QuotedField, None, false);
        t[s][Newline as usize] = PackedResult::make(RecordStart, None, true);
        t[s][Other as usize] = PackedResult::make(UnquotedField, None, false);
        t[s][Escape as usize] = PackedResult::make(UnquotedField, None, false);
        let _ = state;
        s += 1;
    }

    t[UnquotedField as usize][Delimiter as usize] = PackedResult::make(FieldStart, None, true);
    t[UnquotedField as usize][Quote as usize] =
        PackedResult::make(UnquotedField, QuoteInUnquotedField, false);
    t[UnquotedField as usize][Newline as usize] = PackedResult::make(RecordStart, None, true);
    t[UnquotedField as usize][Other as usize] = PackedResult::make(UnquotedField, None, false);
    t[UnquotedField as usize][Escape as usize] = PackedResult::make(UnquotedField, None, false);

    t[QuotedField as usize][Delimiter as usize] = PackedResult::make(QuotedField, None, false);
    t[QuotedField as usize][Quote as usize] = PackedResult::make(QuotedEnd, None, false);
    t[QuotedField as usize][Newline as usize] = PackedResult::make(QuotedField, None, false);
    t[QuotedField as usize][Other as usize] = PackedResult::make(QuotedField, None, false);
    t[QuotedField as usize][Escape as usize] = PackedResult::make(Escaped, None, false);

    t[QuotedEnd as usize][Delimiter as usize] = PackedResult::make(FieldStart, None, true);
    t[QuotedEnd as usize][Quote as usize] = PackedResult::make(QuotedField, None, false);
    t[QuotedEnd as usize][Newline as usize] = PackedResult::make(RecordStart, None, true);
    t[QuotedEnd as usize][Other as usize] =
        PackedResult::make(UnquotedField, InvalidQuoteEscape, false);
    t[QuotedEnd as usize][Escape as usize] =
        PackedResult::make(UnquotedField, InvalidQuoteEscape, false);

    t[Escaped as usize][Delimiter as usize] = PackedResult::make(QuotedField, None, false);
    t[Escaped as usize][Quote as usize] = PackedResult::make(QuotedField, None, false);
    t[Escaped as usize][Newline as usize] = PackedResult::make(QuotedField, None, false);
    t[Escaped as usize][Other as usize] = PackedResult::make(QuotedField, None, false);
    t[Escaped as usize][Escape as usize] = PackedResult::make(QuotedField, None, false);

    t
}

static TRANSITIONS: [[PackedResult; 5]; 6] = table();

/// The scalar-mode state machine: classifies one byte at a time against a
/// chosen dialect and walks the packed transition table. Used to validate a
/// single byte after a SIMD-found boundary, and as the reference
/// implementation the block kernel's AND-NOT shortcut must agree with.
pub struct StateMachine {
    delimiter: u8,
    quote: u8,
    escape: u8,
    use_escape_class: bool,
    state: State,
}

impl StateMachine {
    pub fn new(delimiter: u8, quote: u8, escape: u8, double_quote: bool) -> Self {
        StateMachine {
            delimiter,
            quote,
            escape,
            use_escape_class: !double_quote,
            state: State::RecordStart,
        }
    }

    #[inline]
    pub fn classify(&self, byte: u8) -> CharClass {
        if byte == self.delimiter {
            CharClass::Delimiter
        } else if byte == self.quote {
            CharClass::Quote
        } else if byte == b'\n' {
            CharClass::Newline
        } else if self.use_escape_class && byte == self.escape {
            CharClass::Escape
        } else {
            CharClass::Other
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Feed one byte; returns the packed transition applied.
    #[inline]
    pub fn step(&mut self, byte: u8) -> PackedResult {
        let class = self.classify(byte);
        let result = TRANSITIONS[self.state as usize][class as usize];
        self.state = result.state();
        result
    }

    pub fn reset(&mut self) {
        self.state = State::RecordStart;
    }
}
