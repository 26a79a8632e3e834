/// The character encoding used to compute byte offsets.
///
/// The reader always decodes its input into Unicode characters. An encoding
/// is only consulted when byte counting is enabled, in which case every raw
/// slice of consumed characters is measured as if it were encoded with it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoding {
    /// UTF-8. This is the default.
    Utf8,
    /// ISO-8859-1. Characters outside of it count as one byte, since they
    /// would be written as `?`.
    Latin1,
    /// UTF-16, little endian.
    Utf16Le,
    /// UTF-16, big endian.
    Utf16Be,
    /// UTF-32, little endian.
    Utf32Le,
    /// UTF-32, big endian.
    Utf32Be,
}

impl Default for Encoding {
    fn default() -> Encoding {
        Encoding::Utf8
    }
}

impl Encoding {
    /// Returns the number of bytes required to encode the given character.
    #[inline]
    pub fn char_len(&self, c: char) -> usize {
        match *self {
            Encoding::Utf8 => c.len_utf8(),
            Encoding::Latin1 => 1,
            Encoding::Utf16Le | Encoding::Utf16Be => c.len_utf16() * 2,
            Encoding::Utf32Le | Encoding::Utf32Be => 4,
        }
    }

    /// Returns the number of bytes required to encode all of the given
    /// characters.
    pub fn byte_len(&self, chars: &[char]) -> u64 {
        match *self {
            Encoding::Latin1 => chars.len() as u64,
            Encoding::Utf32Le | Encoding::Utf32Be => chars.len() as u64 * 4,
            _ => chars.iter().map(|&c| self.char_len(c) as u64).sum(),
        }
    }
}
