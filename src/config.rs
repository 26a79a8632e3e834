use std::fmt;
use std::sync::Arc;

use crate::encoding::Encoding;

/// The default size of the read-ahead window, in characters.
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// What to do with a field that violates the CSV grammar.
///
/// The only grammar violation the tokenizer reports is content following a
/// closing quote, as in `"ab"c`. The field is always read to its end first,
/// so either the error or the callback sees its complete text (`abc`).
#[derive(Clone)]
pub enum BadDataPolicy {
    /// Stop reading the current row and return `Error::BadData`.
    Error,
    /// Pass the field text to the callback and keep parsing.
    Callback(Arc<dyn Fn(&str) + Send + Sync>),
}

impl BadDataPolicy {
    /// Build a callback policy from a closure.
    pub fn callback<F>(f: F) -> BadDataPolicy
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        BadDataPolicy::Callback(Arc::new(f))
    }
}

impl Default for BadDataPolicy {
    fn default() -> BadDataPolicy {
        BadDataPolicy::Error
    }
}

impl fmt::Debug for BadDataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BadDataPolicy::Error => write!(f, "Error"),
            BadDataPolicy::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

/// The configuration of a CSV reader.
///
/// A `Config` is usually built through `ReaderBuilder`, but it is a plain
/// value so that an external loader can produce one. Once a reader is built
/// its configuration is fixed, with one exception: when `has_excel_separator`
/// is enabled, a leading `sep=` line may replace the delimiter before the
/// first row is read.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// The field delimiter. Never empty.
    pub delimiter: String,
    /// The quote character.
    pub quote: char,
    /// The comment character. Only used when `allow_comments` is enabled.
    pub comment: char,
    /// Whether lines starting with `comment` are skipped.
    pub allow_comments: bool,
    /// Whether blank and comment lines are skipped entirely. When disabled,
    /// each one is returned as a row with no fields.
    pub ignore_blank_lines: bool,
    /// Whether the quote character is treated as an ordinary character.
    pub ignore_quotes: bool,
    /// Whether to track the byte offset of the reader.
    pub count_bytes: bool,
    /// The encoding used to compute byte offsets.
    pub encoding: Encoding,
    /// What to do with malformed fields.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub bad_data: BadDataPolicy,
    /// The size of the read-ahead window in characters.
    pub buffer_size: usize,
    /// Whether the first line of input is an Excel `sep=` directive.
    pub has_excel_separator: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            delimiter: ",".to_string(),
            quote: '"',
            comment: '#',
            allow_comments: false,
            ignore_blank_lines: true,
            ignore_quotes: false,
            count_bytes: false,
            encoding: Encoding::Utf8,
            bad_data: BadDataPolicy::Error,
            buffer_size: DEFAULT_BUFFER_SIZE,
            has_excel_separator: false,
        }
    }
}

impl Config {
    /// Returns true if `c` starts a comment line under this configuration.
    #[inline]
    pub(crate) fn is_comment(&self, c: char) -> bool {
        self.allow_comments && c == self.comment
    }

    /// Returns true if `c` opens a quoted field under this configuration.
    #[inline]
    pub(crate) fn is_quote(&self, c: char) -> bool {
        !self.ignore_quotes && c == self.quote
    }

    /// Raise out-of-range values to their minimum.
    pub(crate) fn sanitized(mut self) -> Config {
        assert!(!self.delimiter.is_empty(), "CSV delimiter must not be empty");
        self.buffer_size = self.buffer_size.max(1);
        self
    }
}
