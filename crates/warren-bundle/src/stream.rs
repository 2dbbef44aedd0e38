//! Byte-counting stream adapters.
//!
//! The reader tracks its position so corruption errors can report the exact
//! offset; the writer tracks bytes written so the bundle size can be
//! re-measured on every serialization.

use std::io::{self, Read, Write};

use warren_error::{Result, WarrenError};

/// A reader that counts consumed bytes and maps premature EOF to
/// `CorruptBundle`.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Build a `CorruptBundle` error at the current offset.
    pub fn corrupt(&self, reason: impl Into<String>) -> WarrenError {
        WarrenError::CorruptBundle {
            reason: reason.into(),
            offset: self.position,
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact_buf(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32_be(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact_buf(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_buf(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    pub fn read_i64_be(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact_buf(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    pub fn read_f64_be(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64_be()?))
    }

    /// Fill `buf` completely or fail with `CorruptBundle`.
    pub fn read_exact_buf(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(self.corrupt("unexpected end of bundle"))
            }
            Err(err) => Err(WarrenError::Io(err)),
        }
    }

    /// Read exactly `len` bytes without pre-allocating untrusted lengths.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(WarrenError::Io)?;
        self.position += read as u64;
        if read < len {
            return Err(self.corrupt("unexpected end of bundle"));
        }
        Ok(buf)
    }
}

/// A writer that counts bytes written.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far.
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
