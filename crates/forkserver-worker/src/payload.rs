//! Payload codec seam used by the ECHO command.
//!
//! The command loop never looks inside a payload. It hands the channel to a
//! [`PayloadCodec`], which reads exactly one value and may call back into the
//! [`TypeResolver`] for any types the value names.

use std::io::{ErrorKind, Read, Write};

use forkserver_wire::WireError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;
use crate::resolver::TypeResolver;

/// Default maximum encoded payload size (16 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Object field naming a type the decoder must be able to load.
pub const TYPE_FIELD: &str = "@type";

/// Serialization collaborator for ECHO payloads.
pub trait PayloadCodec: Send + Sync {
    /// Write one value.
    fn serialize(&self, output: &mut dyn Write, value: &Value) -> Result<(), CodecError>;

    /// Read one value, loading any types it names through `resolver`.
    ///
    /// A recoverable error (see [`CodecError::is_recoverable`]) must leave the
    /// stream positioned after the value.
    fn deserialize(
        &self,
        input: &mut dyn Read,
        resolver: &dyn TypeResolver,
    ) -> Result<Value, CodecError>;
}

/// Length-prefixed JSON values.
///
/// Wire format: u32 big-endian byte length, then a JSON document.
#[derive(Debug, Clone)]
pub struct JsonPayloadCodec {
    max_payload: usize,
}

impl Default for JsonPayloadCodec {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl JsonPayloadCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum payload size accepted when decoding.
    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = max;
        self
    }

    /// Read one value without resolving the types it names.
    pub fn read_value(&self, input: &mut dyn Read) -> Result<Value, CodecError> {
        let mut header = [0u8; 4];
        read_exact(input, &mut header)?;
        let len = u32::from_be_bytes(header) as u64;

        if len > self.max_payload as u64 {
            let skipped = std::io::copy(&mut Read::take(&mut *input, len), &mut std::io::sink())?;
            if skipped < len {
                return Err(WireError::ConnectionClosed.into());
            }
            return Err(CodecError::Decode(format!(
                "payload of {len} bytes exceeds limit of {}",
                self.max_payload
            )));
        }

        let mut body = vec![0u8; len as usize];
        read_exact(input, &mut body)?;
        serde_json::from_slice(&body).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

impl PayloadCodec for JsonPayloadCodec {
    fn serialize(&self, output: &mut dyn Write, value: &Value) -> Result<(), CodecError> {
        // The limit guards decoding only: replies grow past their input.
        let body = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;
        let len = u32::try_from(body.len())
            .map_err(|_| CodecError::Encode("payload length overflows u32".to_string()))?;

        output.write_all(&len.to_be_bytes())?;
        output.write_all(&body)?;
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut dyn Read,
        resolver: &dyn TypeResolver,
    ) -> Result<Value, CodecError> {
        let value = self.read_value(input)?;
        load_named_types(&value, resolver)?;
        Ok(value)
    }
}

fn read_exact(input: &mut dyn Read, buf: &mut [u8]) -> Result<(), CodecError> {
    input.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => CodecError::Wire(WireError::ConnectionClosed),
        _ => CodecError::from(err),
    })
}

/// Walk `value` and load every type named by a [`TYPE_FIELD`].
fn load_named_types(value: &Value, resolver: &dyn TypeResolver) -> Result<(), CodecError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get(TYPE_FIELD) {
                resolver
                    .load_class(name)
                    .map_err(|source| CodecError::MissingType {
                        name: name.clone(),
                        source,
                    })?;
            }
            map.values()
                .try_for_each(|nested| load_named_types(nested, resolver))
        }
        Value::Array(items) => items
            .iter()
            .try_for_each(|nested| load_named_types(nested, resolver)),
        _ => Ok(()),
    }
}

/// Reply value for a successfully decoded ECHO payload.
///
/// Strings are echoed bare; anything else as compact JSON.
pub fn echo_value(value: &Value) -> Value {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Value::String(format!("echo: {text}"))
}

/// Kind of failure reported in an ERROR reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Decode,
    Encode,
}

/// Body of an ERROR reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub error: String,
    pub kind: FailureKind,
}

impl FailureReport {
    pub fn decode(err: &CodecError) -> Self {
        Self {
            error: err.to_string(),
            kind: FailureKind::Decode,
        }
    }

    pub fn encode(err: &CodecError) -> Self {
        Self {
            error: err.to_string(),
            kind: FailureKind::Encode,
        }
    }

    pub fn to_value(&self) -> Result<Value, CodecError> {
        serde_json::to_value(self).map_err(|e| CodecError::Encode(e.to_string()))
    }
}
