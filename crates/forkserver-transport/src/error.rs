/// Errors that can occur while taking ownership of the parent channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Duplicating or replacing a standard handle failed.
    #[error("failed to rebind {handle}: {source}")]
    Rebind {
        handle: &'static str,
        source: std::io::Error,
    },

    /// The standard handles were already rebound by this process.
    #[error("standard handles already rebound")]
    AlreadyRebound,

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
