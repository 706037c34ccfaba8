use std::io::{ErrorKind, Read, Write};

use crate::codec::{drain, read_full, read_u16};
use crate::error::{Result, WireError};
use crate::opcode::{Opcode, ResourceKind};
use crate::utf::decode_modified_utf8;

/// Reads protocol fields from any `Read` stream.
///
/// The reader is unbuffered: it never pulls bytes past the end of the field
/// being decoded, so payload codecs can read directly from the same stream.
pub struct WireReader<T> {
    inner: T,
}

impl<T: Read> WireReader<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read the next opcode (blocking).
    ///
    /// Returns `Ok(None)` on a clean end of stream before the opcode byte.
    pub fn read_opcode(&mut self) -> Result<Option<Opcode>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Opcode::from_byte(byte[0]).map(Some),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Read a one-byte presence flag. Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        let mut byte = [0u8; 1];
        read_full(&mut self.inner, &mut byte)?;
        Ok(byte[0] != 0)
    }

    /// Read a length-prefixed modified UTF-8 string.
    pub fn read_utf(&mut self) -> Result<String> {
        let len = read_u16(&mut self.inner)? as usize;
        let mut bytes = vec![0u8; len];
        read_full(&mut self.inner, &mut bytes)?;
        decode_modified_utf8(&bytes)
    }

    /// Read the body of a resource request (everything after the opcode).
    pub fn read_request(&mut self) -> Result<(ResourceKind, String)> {
        let mut header = [0u8; 2];
        read_full(&mut self.inner, &mut header)?;
        let kind = ResourceKind::from_header(header[0], header[1])?;
        let name = self.read_utf()?;
        Ok((kind, name))
    }

    /// Drain one chunk stream into `sink`.
    pub fn drain_into<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<u64> {
        drain(&mut self.inner, sink)
    }

    /// Drain one chunk stream into memory.
    pub fn read_chunks(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.drain_into(&mut out)?;
        Ok(out)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Read for WireReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}
