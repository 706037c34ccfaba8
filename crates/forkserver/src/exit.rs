use std::fmt;

use forkserver_transport::TransportError;
use forkserver_wire::WireError;
use forkserver_worker::ServerError;

pub const SUCCESS: i32 = 0;
/// The parent broke the protocol.
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match err {
        TransportError::AlreadyRebound => INTERNAL,
        TransportError::Rebind { .. } | TransportError::Io(_) => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    let code = match err {
        WireError::Io(_) => TRANSPORT_ERROR,
        WireError::Sink(_) => INTERNAL,
        _ => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn server_error(context: &str, err: ServerError) -> CliError {
    match err {
        ServerError::Wire(err) => wire_error(context, err),
        ServerError::UnexpectedOpcode(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        ServerError::Codec(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
