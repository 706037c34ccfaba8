//! Worker processes that borrow classes and resources from their parent.
//!
//! A parent spawns a forkserver worker and talks to it over the worker's
//! stdin/stdout. The parent sends commands; the worker answers them and,
//! while doing so, may ask the parent for the bytes of any class or
//! resource it is missing.
//!
//! # Crate Structure
//!
//! - [`transport`]: stdio channel ownership and handle rebinding
//! - [`wire`]: opcodes, modified UTF-8 names and chunked byte streams
//! - [`worker`]: command loop, remote type provider and payload codec

/// Re-export transport types.
pub mod transport {
    pub use forkserver_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use forkserver_wire::*;
}

/// Re-export worker types.
pub mod worker {
    pub use forkserver_worker::*;
}
