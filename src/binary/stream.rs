//! Positioned byte streams.
//!
//! The codecs never touch file handles directly. Anything that can seek and
//! report its position is a [`Positioned`] stream; readable ones are a
//! [`Source`] and writable ones a [`Sink`]. Blanket impls cover every
//! `std::io` type, so a `Cursor<Vec<u8>>`, a `Cursor<&[u8]>` over a memory map
//! and a `File` all work the same way.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{ColError, ColResult};

pub trait Positioned {
    /// Move to an absolute offset from the start of the stream.
    fn seek_to(&mut self, offset: u64) -> ColResult<()>;
    /// Current absolute offset.
    fn tell(&mut self) -> ColResult<u64>;
}

pub trait Source: Positioned {
    /// Read exactly `n` bytes. Fewer remaining bytes is always
    /// [`ColError::EndOfStream`], never a short or zero-filled result.
    fn take_bytes(&mut self, n: usize) -> ColResult<Vec<u8>>;
}

pub trait Sink: Positioned {
    fn write_bytes(&mut self, bytes: &[u8]) -> ColResult<()>;
}

impl<T: Seek + ?Sized> Positioned for T {
    fn seek_to(&mut self, offset: u64) -> ColResult<()> {
        self.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn tell(&mut self) -> ColResult<u64> {
        Ok(self.stream_position()?)
    }
}

impl<R: Read + Seek + ?Sized> Source for R {
    fn take_bytes(&mut self, n: usize) -> ColResult<Vec<u8>> {
        let offset = self.stream_position()?;
        // The buffer grows with the bytes actually read, never with `n`.
        let mut buf = Vec::new();
        Read::take(&mut *self, n as u64).read_to_end(&mut buf)?;
        if buf.len() < n {
            return Err(ColError::EndOfStream { offset, needed: n });
        }
        Ok(buf)
    }
}

impl<W: Write + Seek + ?Sized> Sink for W {
    fn write_bytes(&mut self, bytes: &[u8]) -> ColResult<()> {
        self.write_all(bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn short_read_is_end_of_stream() {
        let data = [1u8, 2, 3];
        let mut cursor = Cursor::new(&data[..]);
        cursor.seek_to(1).unwrap();

        let err = cursor.take_bytes(4).unwrap_err();
        assert!(matches!(
            err,
            ColError::EndOfStream {
                offset: 1,
                needed: 4
            }
        ));
    }

    #[test]
    fn oversized_request_is_end_of_stream() {
        let data = [1u8, 2];
        let err = Cursor::new(&data[..]).take_bytes(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            ColError::EndOfStream {
                offset: 0,
                needed: usize::MAX
            }
        ));
    }

    #[test]
    fn write_then_rewrite() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_bytes(&[0; 4]).unwrap();
        cursor.write_bytes(b"tail").unwrap();
        assert_eq!(cursor.tell().unwrap(), 8);

        cursor.seek_to(0).unwrap();
        cursor.write_bytes(b"head").unwrap();
        assert_eq!(cursor.tell().unwrap(), 4);
        assert_eq!(cursor.into_inner(), b"headtail");
    }
}
