/// Errors that can occur while encoding or decoding channel messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// An I/O error occurred on the channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel closed in the middle of a message.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,

    /// The opcode byte is not part of the protocol.
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),

    /// A resource request header has a bad reserved or cardinality byte.
    #[error("invalid resource request header [{reserved:#04x}, {cardinality:#04x}]")]
    InvalidRequestHeader { reserved: u8, cardinality: u8 },

    /// The encoded string does not fit a `u16` length prefix.
    #[error("string too long ({len} encoded bytes, max {max})")]
    StringTooLong { len: usize, max: usize },

    /// The name bytes are not valid modified UTF-8.
    #[error("malformed modified UTF-8 at byte {offset}")]
    MalformedUtf { offset: usize },

    /// Writing a drained chunk stream into its sink failed.
    ///
    /// The chunk stream itself was consumed to its terminator, so the
    /// channel is still in sync.
    #[error("failed writing chunk stream to sink: {0}")]
    Sink(std::io::Error),
}

impl WireError {
    /// Whether the channel itself is unusable after this error.
    pub fn is_channel_failure(&self) -> bool {
        !matches!(self, WireError::Sink(_))
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
