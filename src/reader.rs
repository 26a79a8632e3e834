use std::fs::File;
use std::io;
use std::mem;
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::chars::{CharRead, Utf8Chars};
use crate::config::{BadDataPolicy, Config};
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::position::Position;
use crate::record::RecordBuilder;
use crate::source::{BufferedFieldSource, FieldSource};

/// The fixed prefix of an Excel separator directive, as in `sep=;`.
const EXCEL_SEPARATOR_PREFIX: &str = "sep=";

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, quoting, comment
/// handling and more. Once a CSV `Reader` is built, its configuration cannot
/// be changed (except by an Excel `sep=` directive, if enabled).
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    config: Config,
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_`.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Create a new builder starting from an existing configuration.
    pub fn from_config(config: Config) -> ReaderBuilder {
        ReaderBuilder { config }
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a CSV reader from this configuration that reads UTF-8 data
    /// from `rdr`.
    ///
    /// Note that the reader is buffered for you automatically.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::ReaderBuilder;
    ///
    /// # fn example() -> csv_stream::Result<()> {
    /// let data = "city;country\nBoston;United States\n";
    /// let mut rdr = ReaderBuilder::new().delimiter(";").from_reader(data.as_bytes());
    /// assert_eq!(rdr.read_row()?, Some(vec!["city".to_string(), "country".to_string()]));
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn from_reader<R: io::Read>(
        &self,
        rdr: R,
    ) -> Reader<BufferedFieldSource<Utf8Chars<R>>> {
        self.from_chars(Utf8Chars::new(rdr))
    }

    /// Build a CSV reader from this configuration that reads UTF-8 data
    /// from the file at `path`.
    pub fn from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<Reader<BufferedFieldSource<Utf8Chars<File>>>> {
        Ok(self.from_reader(File::open(path)?))
    }

    /// Build a CSV reader from this configuration that pulls characters
    /// from `rdr`.
    pub fn from_chars<R: CharRead>(
        &self,
        rdr: R,
    ) -> Reader<BufferedFieldSource<R>> {
        let config = self.config.clone().sanitized();
        let src = BufferedFieldSource::new(rdr, &config);
        Reader::new(src, config)
    }

    /// Build a CSV reader from this configuration on top of an arbitrary
    /// field source.
    ///
    /// The source is responsible for buffering, byte counting and applying
    /// the bad data policy, so those settings of this builder are ignored.
    pub fn from_source<S: FieldSource>(&self, src: S) -> Reader<S> {
        Reader::new(src, self.config.clone().sanitized())
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The delimiter may be any non-empty string. Multi-character delimiters
    /// such as `::` are matched in full.
    ///
    /// The default is `,`.
    ///
    /// # Panics
    ///
    /// This panics if `delimiter` is empty.
    pub fn delimiter(&mut self, delimiter: &str) -> &mut ReaderBuilder {
        assert!(!delimiter.is_empty(), "CSV delimiter must not be empty");
        self.config.delimiter = delimiter.to_string();
        self
    }

    /// The quote character to use when parsing CSV.
    ///
    /// A quote is doubled to escape it inside a quoted field.
    ///
    /// The default is `"`.
    pub fn quote(&mut self, quote: char) -> &mut ReaderBuilder {
        self.config.quote = quote;
        self
    }

    /// The comment character to use when parsing CSV.
    ///
    /// This has no effect unless `allow_comments` is enabled.
    ///
    /// The default is `#`.
    pub fn comment(&mut self, comment: char) -> &mut ReaderBuilder {
        self.config.comment = comment;
        self
    }

    /// Whether lines starting with the comment character are skipped.
    ///
    /// This is disabled by default.
    pub fn allow_comments(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.config.allow_comments = yes;
        self
    }

    /// Whether blank lines (and comment lines) are skipped.
    ///
    /// When disabled, every such line is returned as a row with zero
    /// fields.
    ///
    /// This is enabled by default.
    pub fn ignore_blank_lines(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.config.ignore_blank_lines = yes;
        self
    }

    /// Whether to treat the quote character as an ordinary character.
    ///
    /// This is disabled by default.
    pub fn ignore_quotes(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.config.ignore_quotes = yes;
        self
    }

    /// Whether to track the byte offset of the reader.
    ///
    /// Byte counting re-measures every consumed slice of characters using
    /// the configured encoding, so it is disabled by default.
    pub fn count_bytes(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.config.count_bytes = yes;
        self
    }

    /// The encoding used to compute byte offsets.
    ///
    /// The default is UTF-8.
    pub fn encoding(&mut self, encoding: Encoding) -> &mut ReaderBuilder {
        self.config.encoding = encoding;
        self
    }

    /// What to do with a malformed field.
    ///
    /// By default, reading a row containing one returns `Error::BadData`.
    pub fn bad_data(&mut self, policy: BadDataPolicy) -> &mut ReaderBuilder {
        self.config.bad_data = policy;
        self
    }

    /// Pass malformed fields to `f` instead of returning an error.
    pub fn bad_data_callback<F>(&mut self, f: F) -> &mut ReaderBuilder
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.bad_data(BadDataPolicy::callback(f))
    }

    /// The number of characters read from the underlying stream at once.
    ///
    /// This does not limit the size of fields or records.
    ///
    /// The default is 2048. A size of zero is treated as one.
    pub fn buffer_size(&mut self, size: usize) -> &mut ReaderBuilder {
        self.config.buffer_size = size;
        self
    }

    /// Whether the first line is an Excel separator directive such as
    /// `sep=;`.
    ///
    /// When enabled, the first line is consumed before any row is read. If
    /// it has the form `sep=<delimiter>`, the delimiter replaces the
    /// configured one.
    ///
    /// This is disabled by default.
    pub fn has_excel_separator(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.config.has_excel_separator = yes;
        self
    }
}

/// How a field ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Boundary {
    /// A delimiter follows, so the row continues.
    Field,
    /// A line terminator or the end of the stream follows.
    Record,
}

/// The outcome of reading ahead through a multi-character delimiter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DelimiterMatch {
    Matched,
    /// The given character (already consumed) broke the match. Everything
    /// read up to it belongs to the field.
    Mismatched(Option<char>),
}

/// A streaming CSV reader that yields rows of `String` fields.
///
/// The reader pulls characters from a `FieldSource` one at a time and
/// decides where fields and rows end. Along the way it tracks the logical
/// row number, the physical line number and the verbatim text of each
/// record. See `position` and `raw_record`.
///
/// A reader holds exclusive mutable state. Every reading method takes
/// `&mut self`, so sharing one reader between threads requires external
/// synchronization.
///
/// The underlying stream is released when the reader is closed or dropped,
/// whichever comes first.
#[derive(Debug)]
pub struct Reader<S> {
    src: S,
    config: Config,
    /// The characters of `config.delimiter`.
    delimiter: Vec<char>,
    /// Whether the Excel separator directive has been handled.
    config_final: bool,
    record: RecordBuilder,
    row: u64,
    raw_row: u64,
    /// The first bad field of the row being read, reported once the row is
    /// complete.
    bad_field: Option<Error>,
}

impl<R: io::Read> Reader<BufferedFieldSource<Utf8Chars<R>>> {
    /// Create a new CSV reader with a default configuration for the given
    /// reader of UTF-8 data.
    ///
    /// To customize parsing, use a `ReaderBuilder`.
    pub fn from_reader(rdr: R) -> Reader<BufferedFieldSource<Utf8Chars<R>>> {
        ReaderBuilder::new().from_reader(rdr)
    }
}

impl Reader<BufferedFieldSource<Utf8Chars<File>>> {
    /// Create a new CSV reader with a default configuration for the file at
    /// the given path.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Reader<BufferedFieldSource<Utf8Chars<File>>>> {
        ReaderBuilder::new().from_path(path)
    }
}

impl<S: FieldSource> Reader<S> {
    fn new(src: S, config: Config) -> Reader<S> {
        Reader {
            src,
            delimiter: config.delimiter.chars().collect(),
            config,
            config_final: false,
            record: RecordBuilder::new(),
            row: 0,
            raw_row: 0,
            bad_field: None,
        }
    }

    /// Read the next row.
    ///
    /// Returns `None` once the stream is exhausted. A stream that ends in
    /// the middle of a row still yields that row first.
    ///
    /// # Errors
    ///
    /// I/O errors from the underlying stream are returned as they occur. A
    /// malformed field is only reported after the rest of its row has been
    /// consumed, so the following call starts at the next record.
    ///
    /// # Example
    ///
    /// ```
    /// use csv_stream::Reader;
    ///
    /// # fn example() -> csv_stream::Result<()> {
    /// let mut rdr = Reader::from_reader("a,\"b,c\",d\n".as_bytes());
    /// let row = rdr.read_row()?.unwrap();
    /// assert_eq!(row, vec!["a", "b,c", "d"]);
    /// assert_eq!(rdr.raw_record(), "a,\"b,c\",d\n");
    /// assert_eq!(rdr.read_row()?, None);
    /// # Ok(()) }
    /// # example().unwrap();
    /// ```
    pub fn read_row(&mut self) -> Result<Option<Vec<String>>> {
        if self.read()? {
            Ok(Some(self.record.snapshot()))
        } else {
            Ok(None)
        }
    }

    /// Read the next row into the given record, reusing its storage.
    ///
    /// Returns `false` once the stream is exhausted, in which case the
    /// record is left empty.
    pub fn read_record(&mut self, record: &mut RecordBuilder) -> Result<bool> {
        mem::swap(&mut self.record, record);
        let res = self.read();
        mem::swap(&mut self.record, record);
        res
    }

    /// Returns a borrowed iterator over all remaining rows.
    ///
    /// The iterator stops after yielding the first error.
    pub fn rows(&mut self) -> RowsIter<'_, S> {
        RowsIter { rdr: self, errored: false }
    }

    /// The number of characters consumed so far.
    pub fn char_position(&self) -> u64 {
        self.src.char_position()
    }

    /// The number of bytes consumed so far. Always `0` unless byte counting
    /// is enabled.
    pub fn byte_position(&self) -> u64 {
        self.src.byte_position()
    }

    /// The number of rows returned so far.
    pub fn row(&self) -> u64 {
        self.row
    }

    /// The number of physical lines read so far, including lines inside
    /// quoted fields and skipped blank or comment lines.
    pub fn raw_row(&self) -> u64 {
        self.raw_row
    }

    /// The verbatim text of the most recently read record.
    ///
    /// This includes quotes, delimiters and the line terminator, as well as
    /// any blank or comment lines skipped right before the record. It is
    /// replaced by the next call to `read_row`.
    pub fn raw_record(&self) -> &str {
        self.src.raw_record()
    }

    /// Returns all counters of this reader at once.
    pub fn position(&self) -> Position {
        let mut pos = Position::new();
        pos.set_char(self.src.char_position())
            .set_byte(self.src.byte_position())
            .set_row(self.row)
            .set_raw_row(self.raw_row);
        pos
    }

    /// Returns the configuration of this reader.
    ///
    /// If an Excel separator directive was honored, the delimiter reflects
    /// it.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Release the underlying stream.
    ///
    /// Every subsequent read returns `Error::Closed`. Closing an already
    /// closed reader does nothing.
    pub fn close(&mut self) {
        self.src.close();
    }

    /// Returns true if this reader has been closed.
    pub fn is_closed(&self) -> bool {
        self.src.is_closed()
    }

    /// Returns a reference to the underlying field source.
    pub fn get_ref(&self) -> &S {
        &self.src
    }

    /// Unwraps this reader, returning the underlying field source.
    pub fn into_source(self) -> S {
        self.src
    }

    fn read(&mut self) -> Result<bool> {
        if self.src.is_closed() {
            return Err(Error::Closed);
        }
        match self.read_located() {
            Ok(found) => Ok(found),
            Err(err) => Err(err.located(self.position())),
        }
    }

    fn read_located(&mut self) -> Result<bool> {
        self.finalize_config()?;
        self.record.clear();
        self.bad_field = None;
        self.src.clear_raw_record()?;
        self.row += 1;
        self.raw_row += 1;

        let res = self.read_fields();
        self.src.flush_raw_record()?;
        let found = res?;
        if let Some(err) = self.bad_field.take() {
            return Err(err);
        }
        if !found {
            self.row -= 1;
            self.raw_row -= 1;
        }
        Ok(found)
    }

    /// Honor the Excel separator directive. This runs at most once, before
    /// the first row.
    fn finalize_config(&mut self) -> Result<()> {
        if self.config_final {
            return Ok(());
        }
        self.config_final = true;
        if !self.config.has_excel_separator {
            return Ok(());
        }
        let line = match self.src.read_line()? {
            None => {
                warn!("expected an Excel separator line, found empty input");
                return Ok(());
            }
            Some(line) => line,
        };
        self.raw_row += 1;
        match excel_separator(&line) {
            Some(delimiter) => {
                debug!(
                    old = %self.config.delimiter,
                    new = %delimiter,
                    "Excel separator directive replaces CSV delimiter"
                );
                self.delimiter = delimiter.chars().collect();
                self.config.delimiter = delimiter.to_string();
            }
            None => {
                warn!(line = %line, "ignoring malformed Excel separator line");
            }
        }
        Ok(())
    }

    /// Read fields until the end of a row. Returns false if the stream ended
    /// before any row was found.
    fn read_fields(&mut self) -> Result<bool> {
        loop {
            let c = match self.src.next_char()? {
                Some(c) => c,
                None if self.record.is_empty() => return Ok(false),
                None => {
                    // The last field of the row, right after a delimiter.
                    self.add_field()?;
                    return Ok(true);
                }
            };
            if self.record.is_empty()
                && (is_line_end(c) || self.config.is_comment(c))
            {
                self.skip_line(c)?;
                if !self.config.ignore_blank_lines {
                    return Ok(true);
                }
                self.raw_row += 1;
                continue;
            }
            let boundary = if self.config.is_quote(c) {
                self.read_quoted_field()?
            } else {
                self.read_field(Some(c))?
            };
            if boundary == Boundary::Record {
                return Ok(true);
            }
        }
    }

    /// Consume the rest of a blank or comment line whose first character is
    /// `c`.
    fn skip_line(&mut self, mut c: char) -> Result<()> {
        trace!(raw_row = self.raw_row, "skipping blank or comment line");
        loop {
            if is_line_end(c) {
                self.finish_line(c)?;
                break;
            }
            match self.src.next_char()? {
                Some(next) => c = next,
                None => break,
            }
        }
        self.src.discard_field()
    }

    /// Read an unquoted field, or the remainder of a malformed quoted one,
    /// starting with the already consumed character `c`.
    fn read_field(&mut self, mut c: Option<char>) -> Result<Boundary> {
        loop {
            match c {
                None => {
                    self.add_field()?;
                    return Ok(Boundary::Record);
                }
                Some(ch) if is_line_end(ch) => {
                    self.src.mark_field_end(-1)?;
                    self.add_field()?;
                    self.finish_line(ch)?;
                    return Ok(Boundary::Record);
                }
                Some(ch) if ch == self.delimiter[0] => {
                    match self.read_delimiter(ch)? {
                        DelimiterMatch::Matched => {
                            self.end_field_at_delimiter()?;
                            return Ok(Boundary::Field);
                        }
                        DelimiterMatch::Mismatched(next) => {
                            c = next;
                            continue;
                        }
                    }
                }
                Some(_) => {}
            }
            c = self.src.next_char()?;
        }
    }

    /// Read a quoted field whose opening quote was just consumed.
    fn read_quoted_field(&mut self) -> Result<Boundary> {
        self.src.mark_field_start(0)?;
        let mut in_quotes = true;
        loop {
            let c = match self.src.next_char()? {
                // An unterminated quote just ends the data.
                None => {
                    self.add_field()?;
                    return Ok(Boundary::Record);
                }
                Some(c) => c,
            };
            if c == self.config.quote {
                in_quotes = !in_quotes;
                if !in_quotes {
                    // Drop the quote. If another one follows right away, it
                    // reopens the field and becomes the first character of
                    // the next slice, which folds `""` into `"`.
                    self.src.mark_field_end(-1)?;
                    self.src.append_pending_field()?;
                }
                continue;
            }
            if in_quotes {
                if is_line_end(c) {
                    self.consume_crlf(c)?;
                    self.raw_row += 1;
                }
                continue;
            }

            if is_line_end(c) {
                self.src.mark_field_end(-1)?;
                self.add_field()?;
                self.finish_line(c)?;
                return Ok(Boundary::Record);
            }
            if c == self.delimiter[0] {
                match self.read_delimiter(c)? {
                    DelimiterMatch::Matched => {
                        self.end_field_at_delimiter()?;
                        return Ok(Boundary::Field);
                    }
                    DelimiterMatch::Mismatched(next) => {
                        self.src.mark_field_bad()?;
                        return self.read_field(next);
                    }
                }
            }
            // Content after the closing quote, as in `"ab" c`.
            self.src.mark_field_bad()?;
            return self.read_field(Some(c));
        }
    }

    /// Read ahead through the rest of the delimiter, whose first character
    /// `c` was just consumed.
    fn read_delimiter(&mut self, c: char) -> Result<DelimiterMatch> {
        assert_eq!(
            c, self.delimiter[0],
            "delimiter confirmation started on a character that does not \
             start the delimiter"
        );
        for i in 1..self.delimiter.len() {
            let next = self.src.next_char()?;
            if next != Some(self.delimiter[i]) {
                return Ok(DelimiterMatch::Mismatched(next));
            }
        }
        Ok(DelimiterMatch::Matched)
    }

    fn end_field_at_delimiter(&mut self) -> Result<()> {
        self.src.mark_field_end(-(self.delimiter.len() as isize))?;
        self.add_field()
    }

    /// Consume the `\n` of a `\r\n` pair, if `c` is the `\r`.
    fn consume_crlf(&mut self, c: char) -> Result<()> {
        if c == '\r' && self.src.peek_char()? == Some('\n') {
            self.src.next_char()?;
        }
        Ok(())
    }

    /// Consume the rest of a line terminator that ends a row and start the
    /// next field after it.
    fn finish_line(&mut self, c: char) -> Result<()> {
        self.consume_crlf(c)?;
        self.src.mark_field_start(0)
    }

    /// Finish the current field and add it to the row.
    fn add_field(&mut self) -> Result<()> {
        match self.src.take_field() {
            Ok(field) => {
                self.record.add(field);
                Ok(())
            }
            Err(Error::BadData { field, pos }) => {
                self.record.add(field.clone());
                if self.bad_field.is_none() {
                    let err = Error::BadData { field, pos };
                    self.bad_field = Some(err.located(self.position()));
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// A borrowed iterator over the rows of a CSV reader.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// CSV `Reader`.
pub struct RowsIter<'r, S: 'r> {
    rdr: &'r mut Reader<S>,
    errored: bool,
}

impl<'r, S: FieldSource> RowsIter<'r, S> {
    /// Return a reference to the underlying CSV reader.
    pub fn reader(&self) -> &Reader<S> {
        &self.rdr
    }
}

impl<'r, S: FieldSource> Iterator for RowsIter<'r, S> {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Result<Vec<String>>> {
        if self.errored {
            return None;
        }
        match self.rdr.read_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => None,
            Err(err) => {
                self.errored = true;
                Some(Err(err))
            }
        }
    }
}

#[inline]
fn is_line_end(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// Returns the delimiter named by an Excel `sep=` line, if it is one.
fn excel_separator(line: &str) -> Option<&str> {
    let n = EXCEL_SEPARATOR_PREFIX.len();
    match line.get(..n) {
        Some(prefix) if prefix.eq_ignore_ascii_case(EXCEL_SEPARATOR_PREFIX) => {
            Some(&line[n..]).filter(|d| !d.is_empty())
        }
        _ => None,
    }
}
