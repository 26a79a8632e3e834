use std::fmt;
use std::io;

use bstr::decode_utf8;

const DEFAULT_BYTE_BUF_SIZE: usize = 8 * 1024;

/// A source of Unicode characters.
///
/// This plays the role that `io::Read` plays for bytes. The CSV reader
/// pulls characters through this trait into its own window, so an
/// implementation only needs to hand out whatever it has available.
pub trait CharRead {
    /// Read characters into `buf`, returning how many were written.
    ///
    /// Returning `0` for a non-empty `buf` signals the end of the stream.
    /// Implementations may block.
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize>;
}

impl<'a, T: CharRead + ?Sized> CharRead for &'a mut T {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        (**self).read_chars(buf)
    }
}

impl<T: CharRead + ?Sized> CharRead for Box<T> {
    fn read_chars(&mut self, buf: &mut [char]) -> io::Result<usize> {
        (**self).read_chars(buf)
    }
}

/// Decodes UTF-8 from an `io::Read` into characters.
///
/// Multi-byte sequences split across reads of the underlying reader are
/// reassembled. Invalid UTF-8 is replaced with `U+FFFD`, one replacement
/// per maximal invalid subsequence.
pub struct Utf8Chars<R> {
    rdr: R,
    buf: Vec<u8>,
    /// Start of undecoded bytes in `buf`.
    pos: usize,
    /// End of valid bytes in `buf`.
    end: usize,
    eof: bool,
}

impl<R: io::Read> Utf8Chars<R> {
    /// Create a new decoder with a default sized byte buffer.
    pub fn new(rdr: R) -> Utf8Chars<R> {
        Utf8Chars::with_capacity(DEFAULT_BYTE_BUF_SIZE, rdr)
    }

    /// Create a new decoder with a byte buffer of the given capacity.
    ///
    /// The capacity is raised to at least 4 bytes, so that any single
    /// encoded character fits.
    pub fn with_capacity(capacity: usize, rdr: R) -> Utf8Chars<R> {
        Utf8Chars {
            rdr,
            buf: vec![0; capacity.max(4)],
            pos: 0,
            end: 0,
            eof: false,
        }
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Gets a mutable reference to the underlying reader.
    ///
    /// # Warning
    ///
    /// It is inadvisable to directly read from the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.rdr
    }

    /// Unwraps this decoder, returning the underlying reader.
    ///
    /// Note that any leftover data in the internal buffer is lost.
    pub fn into_inner(self) -> R {
        self.rdr
    }

    /// Move the undecoded tail to the front of the buffer and read more
    /// bytes after it. Returns false at the end of the stream.
    fn fill(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        self.buf.copy_within(self.pos..self.end, 0);
        self.end -= self.pos;
        self.pos = 0;
        loop {
            match self.rdr.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(false);
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(true);
                }
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: io::Read> CharRead for Utf8Chars<R> {
    fn read_chars(&mut self, out: &mut [char]) -> io::Result<usize> {
        let mut nout = 0;
        while nout < out.len() {
            if self.pos == self.end {
                // Only block for more input if nothing has been produced yet.
                if nout > 0 || !self.fill()? {
                    break;
                }
            }
            let avail = &self.buf[self.pos..self.end];
            let (ch, size) = decode_utf8(avail);
            match ch {
                Some(ch) => {
                    out[nout] = ch;
                    nout += 1;
                    self.pos += size;
                }
                // An invalid run that reaches the end of the buffer may just
                // be a sequence split across reads.
                None if size == avail.len() && avail.len() < 4 && !self.eof => {
                    if nout > 0 {
                        break;
                    }
                    self.fill()?;
                }
                None => {
                    out[nout] = '\u{FFFD}';
                    nout += 1;
                    self.pos += size;
                }
            }
        }
        Ok(nout)
    }
}

impl<R: fmt::Debug> fmt::Debug for Utf8Chars<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Utf8Chars {{ reader: {:?}, buffer: {}/{} }}",
            self.rdr, self.pos, self.end
        )
    }
}
