use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{Result, WireError};
use crate::opcode::{Opcode, ResourceKind};
use crate::utf::encode_modified_utf8;

/// Largest chunk a chunk stream may carry (the length field is a `u16`).
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// Chunk length that terminates a chunk stream.
const END_OF_STREAM: u16 = 0;

/// Encode a resource request: opcode, header, length-prefixed name.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬─────────────┬───────────┬─────────────────┐
/// │ RESOURCE │ Reserved │ Cardinality │ Name len  │ Name            │
/// │ 0x02     │ 0x00     │ 0x01 / 0x02 │ (2B BE)   │ modified UTF-8  │
/// └──────────┴──────────┴─────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_request(kind: ResourceKind, name: &str, dst: &mut BytesMut) -> Result<()> {
    let name = encode_modified_utf8(name)?;
    dst.reserve(5 + name.len());
    dst.put_u8(Opcode::Resource.as_byte());
    dst.put_slice(&kind.header());
    dst.put_u16(name.len() as u16);
    dst.put_slice(&name);
    Ok(())
}

/// Encode a length-prefixed modified UTF-8 string.
pub fn encode_utf(s: &str, dst: &mut BytesMut) -> Result<()> {
    let encoded = encode_modified_utf8(s)?;
    dst.reserve(2 + encoded.len());
    dst.put_u16(encoded.len() as u16);
    dst.put_slice(&encoded);
    Ok(())
}

/// Encode bytes as a chunk stream, including the terminating empty chunk.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬──────────┬──────────────┬─────┬──────────┐
/// │ n1 (2B)  │ n1 bytes     │ n2 (2B)  │ n2 bytes     │ ... │ 0 (2B)   │
/// └──────────┴──────────────┴──────────┴──────────────┴─────┴──────────┘
/// ```
pub fn encode_chunks(data: &[u8], dst: &mut BytesMut) {
    let chunks = data.len().div_ceil(MAX_CHUNK_SIZE);
    dst.reserve(data.len() + 2 * (chunks + 1));
    for chunk in data.chunks(MAX_CHUNK_SIZE) {
        dst.put_u16(chunk.len() as u16);
        dst.put_slice(chunk);
    }
    dst.put_u16(END_OF_STREAM);
}

/// Read one chunk stream from `input`, appending every chunk to `sink`.
///
/// Returns the total number of bytes drained. If the sink fails, the rest of
/// the stream is still consumed so the channel stays in sync, and the sink
/// error is reported as `WireError::Sink` afterwards.
pub fn drain<R, W>(input: &mut R, sink: &mut W) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; MAX_CHUNK_SIZE];
    let mut total = 0u64;
    let mut chunks = 0usize;
    let mut sink_error = None;

    loop {
        let n = read_u16(input)? as usize;
        if n == END_OF_STREAM as usize {
            break;
        }

        read_full(input, &mut buf[..n])?;
        chunks += 1;
        total += n as u64;

        if sink_error.is_none() {
            if let Err(err) = sink.write_all(&buf[..n]) {
                sink_error = Some(err);
            }
        }
    }

    tracing::trace!(chunks, total_bytes = total, "drained chunk stream");

    match sink_error {
        Some(err) => Err(WireError::Sink(err)),
        None => Ok(total),
    }
}

/// Read a big-endian `u16`.
pub(crate) fn read_u16<R: Read + ?Sized>(input: &mut R) -> Result<u16> {
    let mut bytes = [0u8; 2];
    read_full(input, &mut bytes)?;
    Ok(u16::from_be_bytes(bytes))
}

/// Fill `buf` completely; EOF part-way is `ConnectionClosed`.
pub(crate) fn read_full<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    match input.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(WireError::ConnectionClosed),
        Err(err) => Err(WireError::Io(err)),
    }
}
