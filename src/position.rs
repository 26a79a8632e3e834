use std::fmt;

/// A snapshot of every counter a CSV reader maintains.
///
/// Positions are attached to errors so that a failure can be located in the
/// input, and can be requested at any time with `Reader::position`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Position {
    char: u64,
    byte: u64,
    row: u64,
    raw_row: u64,
}

impl Position {
    /// Returns a new position initialized to the start value.
    pub fn new() -> Position {
        Position::default()
    }

    /// The number of characters consumed from the underlying stream.
    pub fn char(&self) -> u64 {
        self.char
    }

    /// The number of bytes consumed from the underlying stream.
    ///
    /// This is only meaningful when byte counting is enabled. Otherwise it
    /// is always `0`.
    pub fn byte(&self) -> u64 {
        self.byte
    }

    /// The number of logical rows returned so far, counting the row that is
    /// currently being read.
    pub fn row(&self) -> u64 {
        self.row
    }

    /// The number of physical lines seen so far, including line terminators
    /// embedded in quoted fields and skipped blank or comment lines.
    pub fn raw_row(&self) -> u64 {
        self.raw_row
    }

    /// Set the character offset.
    pub fn set_char(&mut self, char: u64) -> &mut Position {
        self.char = char;
        self
    }

    /// Set the byte offset.
    pub fn set_byte(&mut self, byte: u64) -> &mut Position {
        self.byte = byte;
        self
    }

    /// Set the logical row number.
    pub fn set_row(&mut self, row: u64) -> &mut Position {
        self.row = row;
        self
    }

    /// Set the physical row number.
    pub fn set_raw_row(&mut self, raw_row: u64) -> &mut Position {
        self.raw_row = raw_row;
        self
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "row {} (raw row {}, char {}, byte {})",
            self.row, self.raw_row, self.char, self.byte
        )
    }
}
