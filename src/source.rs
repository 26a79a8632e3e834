use std::fmt;
use std::io;
use std::mem;

use tracing::{debug, trace};

use crate::chars::CharRead;
use crate::config::{BadDataPolicy, Config};
use crate::encoding::Encoding;
use crate::error::{Error, Result};

/// A character cursor that can cut fields out of what it has read.
///
/// This is the boundary between the row tokenizer in `Reader` and the
/// buffering of the underlying stream. The tokenizer pulls one character at
/// a time and, whenever it decides where a field starts or ends, marks that
/// spot relative to the cursor. Field text is only copied out when the
/// tokenizer asks for it.
///
/// Alongside field text, a source keeps the verbatim text of the current
/// record (the *raw record*) and the character and byte offsets of the
/// cursor.
///
/// Once a source is closed, every operation that can fail returns
/// `Error::Closed`. The infallible accessors `raw_record`, `char_position`
/// and `byte_position` are the exception: after `close`, the raw record is
/// empty and the offsets keep their last values.
pub trait FieldSource {
    /// Consume and return the next character, or `None` at the end of the
    /// stream.
    fn next_char(&mut self) -> Result<Option<char>>;

    /// Return the next character without consuming it.
    fn peek_char(&mut self) -> Result<Option<char>>;

    /// Mark the current field as starting at `cursor + offset`.
    ///
    /// Positions before the start of the buffered window are clamped to it.
    fn mark_field_start(&mut self, offset: isize) -> Result<()>;

    /// Mark the current field as ending at `cursor + offset`.
    ///
    /// A negative offset excludes characters that were just read (a
    /// delimiter, a closing quote or a line terminator) from the field, even
    /// when some of them were already moved into the pending field text.
    fn mark_field_end(&mut self, offset: isize) -> Result<()>;

    /// Flag the current field as malformed. The flag is consumed by the next
    /// call to `take_field`.
    fn mark_field_bad(&mut self) -> Result<()>;

    /// Move the marked slice into the pending field text without finishing
    /// the field. The next slice starts at the cursor.
    fn append_pending_field(&mut self) -> Result<()>;

    /// Finish the current field and return its text.
    ///
    /// If the field was flagged as malformed, the configured bad data policy
    /// decides whether this returns `Error::BadData` or passes the text to a
    /// callback first. Either way the pending text is reset.
    fn take_field(&mut self) -> Result<String>;

    /// Throw away the current field without applying the bad data policy.
    fn discard_field(&mut self) -> Result<()>;

    /// Start a new raw record.
    fn clear_raw_record(&mut self) -> Result<()>;

    /// Move everything consumed so far into the raw record.
    fn flush_raw_record(&mut self) -> Result<()>;

    /// The raw record as of the last flush.
    fn raw_record(&self) -> &str;

    /// Consume one physical line, bypassing field handling entirely.
    ///
    /// The line terminator is consumed but not returned. Returns `None` if
    /// the stream has already ended.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// The number of characters consumed.
    fn char_position(&self) -> u64;

    /// The number of bytes consumed, if byte counting is enabled.
    fn byte_position(&self) -> u64;

    /// Release the underlying stream. Closing twice is a no-op.
    fn close(&mut self);

    /// Returns true if this source has been closed.
    fn is_closed(&self) -> bool;
}

/// Indices into the window. All of them are reset to zero by a refill.
#[derive(Clone, Copy, Debug, Default)]
struct Window {
    /// The index of the next character to return.
    cursor: usize,
    /// The number of valid characters in the window.
    len: usize,
    /// Where the unflushed part of the current field starts.
    field_start: usize,
    /// Where the current field ends, if known. Otherwise it ends at the
    /// cursor.
    field_end: Option<usize>,
    /// Where the unflushed part of the raw record starts.
    raw_start: usize,
}

/// A `FieldSource` that reads through a fixed size window of characters.
///
/// The window size bounds how many characters are requested from the
/// underlying `CharRead` at once. It does not bound the length of a field
/// or record: text that outlives a refill is moved into growable buffers
/// first.
pub struct BufferedFieldSource<R> {
    rdr: Option<R>,
    buf: Vec<char>,
    win: Window,
    eof: bool,
    /// Field text that was flushed out of the window.
    field: String,
    field_bad: bool,
    raw: String,
    char_pos: u64,
    byte_pos: u64,
    count_bytes: bool,
    encoding: Encoding,
    bad_data: BadDataPolicy,
}

impl<R: CharRead> BufferedFieldSource<R> {
    /// Create a new source using the buffering, byte counting and bad data
    /// settings of the given configuration.
    pub fn new(rdr: R, config: &Config) -> BufferedFieldSource<R> {
        BufferedFieldSource {
            rdr: Some(rdr),
            buf: vec!['\0'; config.buffer_size.max(1)],
            win: Window::default(),
            eof: false,
            field: String::new(),
            field_bad: false,
            raw: String::new(),
            char_pos: 0,
            byte_pos: 0,
            count_bytes: config.count_bytes,
            encoding: config.encoding,
            bad_data: config.bad_data.clone(),
        }
    }

    /// Gets a reference to the underlying reader, unless closed.
    pub fn get_ref(&self) -> Option<&R> {
        self.rdr.as_ref()
    }

    /// Unwraps this source, returning the underlying reader unless closed.
    ///
    /// Note that any leftover data in the window is lost.
    pub fn into_inner(self) -> Option<R> {
        self.rdr
    }

    fn check_open(&self) -> Result<()> {
        if self.rdr.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Drain the window into the pending field and raw record, then read the
    /// next chunk into it. Returns false if the stream is exhausted.
    fn refill(&mut self) -> Result<bool> {
        self.flush_field_slice();
        self.flush_raw_slice();
        self.win = Window::default();
        if self.eof {
            return Ok(false);
        }

        let rdr = match self.rdr {
            Some(ref mut rdr) => rdr,
            None => return Err(Error::Closed),
        };
        let n = loop {
            match rdr.read_chars(&mut self.buf) {
                Ok(n) => break n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::from(err)),
            }
        };
        trace!(chars = n, char_position = self.char_pos, "refilled CSV window");
        self.win.len = n;
        self.eof = n == 0;
        Ok(n > 0)
    }

    fn flush_raw_slice(&mut self) {
        let slice = &self.buf[self.win.raw_start..self.win.cursor];
        if slice.is_empty() {
            return;
        }
        self.raw.extend(slice);
        if self.count_bytes {
            self.byte_pos += self.encoding.byte_len(slice);
        }
        self.win.raw_start = self.win.cursor;
    }

    fn flush_field_slice(&mut self) {
        let end = self.win.field_end.unwrap_or(self.win.cursor);
        if end > self.win.field_start {
            self.field.extend(&self.buf[self.win.field_start..end]);
        }
        self.win.field_start = self.win.cursor;
        self.win.field_end = None;
    }
}

impl<R: CharRead> FieldSource for BufferedFieldSource<R> {
    fn next_char(&mut self) -> Result<Option<char>> {
        self.check_open()?;
        if self.win.cursor >= self.win.len && !self.refill()? {
            return Ok(None);
        }
        let c = self.buf[self.win.cursor];
        self.win.cursor += 1;
        self.char_pos += 1;
        Ok(Some(c))
    }

    fn peek_char(&mut self) -> Result<Option<char>> {
        self.check_open()?;
        if self.win.cursor >= self.win.len && !self.refill()? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.win.cursor]))
    }

    fn mark_field_start(&mut self, offset: isize) -> Result<()> {
        self.check_open()?;
        let pos = (self.win.cursor as isize + offset).max(0) as usize;
        self.win.field_start = pos.min(self.win.len);
        self.win.field_end = None;
        Ok(())
    }

    fn mark_field_end(&mut self, offset: isize) -> Result<()> {
        self.check_open()?;
        let pos = self.win.cursor as isize + offset;
        let start = self.win.field_start as isize;
        if pos < start {
            // The excluded characters precede the window, so a refill has
            // already moved them into the pending text.
            for _ in 0..(start - pos) {
                self.field.pop();
            }
            self.win.field_end = Some(self.win.field_start);
        } else {
            self.win.field_end = Some(pos as usize);
        }
        Ok(())
    }

    fn mark_field_bad(&mut self) -> Result<()> {
        self.check_open()?;
        self.field_bad = true;
        Ok(())
    }

    fn append_pending_field(&mut self) -> Result<()> {
        self.check_open()?;
        self.flush_field_slice();
        Ok(())
    }

    fn take_field(&mut self) -> Result<String> {
        self.check_open()?;
        self.flush_field_slice();
        let field = mem::replace(&mut self.field, String::new());
        if mem::replace(&mut self.field_bad, false) {
            match self.bad_data {
                BadDataPolicy::Error => {
                    return Err(Error::BadData { field, pos: None });
                }
                BadDataPolicy::Callback(ref f) => {
                    debug!(field = %field, "passing bad CSV field to callback");
                    f(&field);
                }
            }
        }
        Ok(field)
    }

    fn discard_field(&mut self) -> Result<()> {
        self.check_open()?;
        self.win.field_start = self.win.cursor;
        self.win.field_end = None;
        self.field.clear();
        self.field_bad = false;
        Ok(())
    }

    fn clear_raw_record(&mut self) -> Result<()> {
        self.check_open()?;
        self.flush_raw_slice();
        self.raw.clear();
        Ok(())
    }

    fn flush_raw_record(&mut self) -> Result<()> {
        self.check_open()?;
        self.flush_raw_slice();
        Ok(())
    }

    fn raw_record(&self) -> &str {
        &self.raw
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let mut consumed = false;
        loop {
            match self.next_char()? {
                None => break,
                Some('\n') => {
                    consumed = true;
                    break;
                }
                Some('\r') => {
                    consumed = true;
                    if self.peek_char()? == Some('\n') {
                        self.next_char()?;
                    }
                    break;
                }
                Some(c) => {
                    consumed = true;
                    line.push(c);
                }
            }
        }
        self.discard_field()?;
        self.clear_raw_record()?;
        Ok(if consumed { Some(line) } else { None })
    }

    fn char_position(&self) -> u64 {
        self.char_pos
    }

    fn byte_position(&self) -> u64 {
        self.byte_pos
    }

    fn close(&mut self) {
        if self.rdr.take().is_some() {
            trace!(char_position = self.char_pos, "closed CSV source");
        }
        self.field.clear();
        self.raw.clear();
        self.win = Window::default();
    }

    fn is_closed(&self) -> bool {
        self.rdr.is_none()
    }
}

impl<R: fmt::Debug> fmt::Debug for BufferedFieldSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BufferedFieldSource")
            .field("rdr", &self.rdr)
            .field("window", &self.win)
            .field("capacity", &self.buf.len())
            .field("char_pos", &self.char_pos)
            .field("byte_pos", &self.byte_pos)
            .finish()
    }
}
