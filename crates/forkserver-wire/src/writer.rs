use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};

use crate::codec::{encode_chunks, encode_request, encode_utf};
use crate::error::{Result, WireError};
use crate::opcode::{Opcode, ResourceKind};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes protocol fields to any `Write` stream.
///
/// Fields are staged in an internal buffer and only reach the stream on
/// [`flush`](WireWriter::flush), so a message is either written whole or
/// not at all from the point of view of other writers on the same stream.
pub struct WireWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> WireWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Stage an opcode byte.
    pub fn write_opcode(&mut self, opcode: Opcode) {
        self.buf.put_u8(opcode.as_byte());
    }

    /// Stage a complete resource request (opcode, header and name).
    pub fn write_request(&mut self, kind: ResourceKind, name: &str) -> Result<()> {
        encode_request(kind, name, &mut self.buf)
    }

    /// Stage a presence flag.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Stage a length-prefixed modified UTF-8 string.
    pub fn write_utf(&mut self, s: &str) -> Result<()> {
        encode_utf(s, &mut self.buf)
    }

    /// Stage a full chunk stream for `data`.
    pub fn write_chunks(&mut self, data: &[u8]) {
        encode_chunks(data, &mut self.buf);
    }

    /// Number of staged bytes not yet flushed.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Write all staged bytes and flush the underlying stream (blocking).
    pub fn flush(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    self.buf.clear();
                    return Err(WireError::ConnectionClosed);
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.clear();
                    return Err(WireError::Io(err));
                }
            }
        }
        self.buf.clear();

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Drop staged bytes without writing them.
    pub fn discard(&mut self) {
        self.buf.clear();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream. Staged bytes are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Raw bytes written through `Write` are staged like any other field;
/// payload codecs serialize into the writer this way.
impl<T: Write> Write for WireWriter<T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        WireWriter::flush(self).map_err(|err| match err {
            WireError::Io(io) => io,
            other => std::io::Error::other(other.to_string()),
        })
    }
}
