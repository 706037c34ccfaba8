use forkserver_wire::{Opcode, WireError};

/// Errors raised by the host runtime's type-definition primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefineError {
    /// The bytecode is not a usable type definition.
    #[error("malformed definition for {name}: {reason}")]
    Malformed { name: String, reason: String },

    /// A type with this name was already defined.
    #[error("duplicate definition of {name}")]
    Duplicate { name: String },
}

/// Errors surfaced by type resolution hooks.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The parent does not know the type, or the channel failed while asking.
    #[error("type not found: {name}")]
    NotFound {
        name: String,
        #[source]
        source: Option<WireError>,
    },

    /// The parent supplied bytes but the runtime refused to define them.
    #[error("failed to define {name}: {source}")]
    Define {
        name: String,
        #[source]
        source: DefineError,
    },

    /// The channel failed during a multi-resource exchange.
    #[error("resource lookup failed: {0}")]
    Channel(#[from] WireError),
}

impl ResolveError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            source: None,
        }
    }
}

/// Errors from the payload codec seam.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload bytes were received but could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The payload references a type that could not be loaded.
    #[error("class not found: {name}")]
    MissingType {
        name: String,
        #[source]
        source: ResolveError,
    },

    /// The payload could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// The channel failed while reading or writing the payload.
    #[error(transparent)]
    Wire(#[from] WireError),
}

impl CodecError {
    /// Decode-side failures that leave the channel in sync and are reported
    /// to the parent instead of ending the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::Decode(_) | CodecError::MissingType { .. })
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::Wire(WireError::Io(err))
    }
}

/// Errors that end the command loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The channel failed or carried a malformed message.
    #[error("channel error: {0}")]
    Wire(#[from] WireError),

    /// A reply-side opcode arrived where a command was expected.
    #[error("unexpected {0} opcode at top level")]
    UnexpectedOpcode(Opcode),

    /// The payload codec failed in a way that desynchronizes the channel.
    #[error("payload codec error: {0}")]
    Codec(CodecError),
}

impl ServerError {
    /// Whether the parent broke the protocol (as opposed to an I/O failure).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ServerError::UnexpectedOpcode(_)
                | ServerError::Wire(WireError::InvalidOpcode(_))
                | ServerError::Wire(WireError::ConnectionClosed)
        )
    }
}

impl From<CodecError> for ServerError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Wire(wire) => ServerError::Wire(wire),
            other => ServerError::Codec(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
