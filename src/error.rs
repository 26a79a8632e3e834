use std::io;
use std::result;

use thiserror::Error;

use crate::position::Position;

/// A type alias for `Result<T, csv_stream::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when tokenizing CSV data.
///
/// Note that malformed CSV is usually *not* an error. The tokenizer always
/// finds a parse. The one exception is content that trails a closing quote
/// (for example `"ab"c`), which is reported as `BadData` unless the reader
/// was configured to route it to a callback instead.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error that occurred while reading from the underlying stream.
    ///
    /// The error is passed through unchanged. When available, the position
    /// of the reader at the time of failure is attached.
    #[error("{}", fmt_located("I/O error", .pos, .err))]
    Io {
        /// The underlying I/O error.
        #[source]
        err: io::Error,
        /// The position of the reader when the error occurred.
        pos: Option<Position>,
    },
    /// A field violated the CSV grammar in a recoverable way.
    #[error("{}", fmt_located("bad data found", .pos, &quoted(.field)))]
    BadData {
        /// The complete text of the offending field.
        field: String,
        /// The position of the reader when the field was finished.
        pos: Option<Position>,
    },
    /// The reader (or its source) was used after it was closed.
    #[error("CSV reader has already been closed")]
    Closed,
}

impl Error {
    /// Returns the position at which this error occurred, if known.
    pub fn position(&self) -> Option<&Position> {
        match *self {
            Error::Io { ref pos, .. } => pos.as_ref(),
            Error::BadData { ref pos, .. } => pos.as_ref(),
            Error::Closed => None,
        }
    }

    /// Returns true if this is a bad data error.
    pub fn is_bad_data(&self) -> bool {
        match *self {
            Error::BadData { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this is an I/O error.
    pub fn is_io_error(&self) -> bool {
        match *self {
            Error::Io { .. } => true,
            _ => false,
        }
    }

    /// Attach a position to this error, unless it already has one.
    pub(crate) fn located(self, at: Position) -> Error {
        match self {
            Error::Io { err, pos: None } => Error::Io { err, pos: Some(at) },
            Error::BadData { field, pos: None } => {
                Error::BadData { field, pos: Some(at) }
            }
            err => err,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io { err, pos: None }
    }
}

fn quoted(field: &str) -> String {
    format!("field {:?}", field)
}

fn fmt_located<T: std::fmt::Display>(
    what: &str,
    pos: &Option<Position>,
    detail: &T,
) -> String {
    match *pos {
        None => format!("CSV {}: {}", what, detail),
        Some(ref pos) => format!("CSV {} at {}: {}", what, pos, detail),
    }
}
