//! Stdio channel ownership for forkserver workers.
//!
//! A forkserver worker talks to its parent over the stdin/stdout pipe pair it
//! was spawned with. This crate takes ownership of those two pipes and rebinds
//! the process-wide standard handles so no other code can read from or write
//! onto them:
//! - fd 0 becomes an empty source (`/dev/null`)
//! - fd 1 is pointed at stderr
//!
//! This is the lowest layer of forkserver. Everything else builds on the
//! [`ChannelInput`] / [`ChannelOutput`] pair provided here.

pub mod error;
pub mod stdio;
pub mod stream;

pub use error::{Result, TransportError};
pub use stdio::{rebind_stdio, StdioChannel};
pub use stream::{ChannelInput, ChannelOutput};
