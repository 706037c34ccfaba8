//! Wire encoding for the forkserver parent channel.
//!
//! The channel carries no frame boundaries. Every message starts with a
//! one-byte [`Opcode`] and its shape is implied by that opcode:
//! - resource requests: reserved byte (0), cardinality byte, modified UTF-8 name
//! - presence flags: one boolean byte
//! - resource bodies: chunk streams of big-endian `u16` lengths, ended by a
//!   zero-length chunk
//!
//! All multi-byte integers are big-endian. There is no resynchronization:
//! a malformed message poisons the connection.

pub mod codec;
pub mod error;
pub mod opcode;
pub mod reader;
pub mod utf;
pub mod writer;

pub use codec::{drain, encode_chunks, encode_request, encode_utf, MAX_CHUNK_SIZE};
pub use error::{Result, WireError};
pub use opcode::{Opcode, ResourceKind, REQUEST_RESERVED};
pub use reader::WireReader;
pub use utf::{decode_modified_utf8, encode_modified_utf8, MAX_UTF_LEN};
pub use writer::WireWriter;
