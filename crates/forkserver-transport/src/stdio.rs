//! Process handle rebinding for channel isolation.
//!
//! The worker uses its original stdin/stdout as the channel to the parent.
//! Any library that prints to stdout or reads from stdin would corrupt the
//! byte stream, so the entry point rebinds the standard handles exactly once,
//! before any user code runs:
//!
//! 1. fd 0 and fd 1 are duplicated to private close-on-exec descriptors that
//!    become the channel.
//! 2. fd 0 is replaced with `/dev/null` (reads see immediate EOF).
//! 3. fd 1 is replaced with a copy of fd 2 (stray prints land on stderr).
//!
//! Callers must install logging to stderr before rebinding; logs then keep
//! flowing to the same place.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::{ChannelInput, ChannelOutput};

static REBOUND: AtomicBool = AtomicBool::new(false);

/// The parent channel, split into its two directions.
pub struct StdioChannel {
    pub input: ChannelInput,
    pub output: ChannelOutput,
}

impl StdioChannel {
    /// Use the process stdin/stdout handles without rebinding anything.
    pub fn inherit() -> Self {
        Self {
            input: ChannelInput::stdin(),
            output: ChannelOutput::stdout(),
        }
    }

    /// Split into the inbound and outbound halves.
    pub fn into_split(self) -> (ChannelInput, ChannelOutput) {
        (self.input, self.output)
    }
}

/// Take ownership of the parent channel and isolate the standard handles.
///
/// Returns `TransportError::AlreadyRebound` on a second call: the original
/// pipes are no longer reachable through fd 0/1 at that point.
pub fn rebind_stdio() -> Result<StdioChannel> {
    if REBOUND.swap(true, Ordering::SeqCst) {
        return Err(TransportError::AlreadyRebound);
    }

    // Anything still buffered for the real stdout belongs to the old fd 1.
    let _ = std::io::stdout().flush();

    #[cfg(unix)]
    {
        unix::rebind()
    }

    #[cfg(not(unix))]
    {
        // No handle rebinding off Unix; stray stdout writes will reach the parent.
        Ok(StdioChannel::inherit())
    }
}

#[cfg(unix)]
mod unix {
    use std::fs::File;
    use std::os::fd::{AsRawFd, FromRawFd, RawFd};

    use super::*;

    const STDIN_FD: RawFd = 0;
    const STDOUT_FD: RawFd = 1;
    const STDERR_FD: RawFd = 2;
    /// Lowest descriptor number for the preserved channel copies.
    const MIN_CHANNEL_FD: RawFd = 3;

    pub(super) fn rebind() -> Result<StdioChannel> {
        let input = preserve(STDIN_FD, "stdin")?;
        let output = preserve(STDOUT_FD, "stdout")?;
        debug!(
            input_fd = input.as_raw_fd(),
            output_fd = output.as_raw_fd(),
            "preserved parent channel"
        );

        let null = File::open("/dev/null").map_err(|source| TransportError::Rebind {
            handle: "stdin",
            source,
        })?;
        replace(null.as_raw_fd(), STDIN_FD, "stdin")?;
        drop(null);

        replace(STDERR_FD, STDOUT_FD, "stdout")?;
        debug!("standard handles rebound (stdin <- /dev/null, stdout -> stderr)");

        Ok(StdioChannel {
            input: ChannelInput::from_file(input),
            output: ChannelOutput::from_file(output),
        })
    }

    fn preserve(fd: RawFd, handle: &'static str) -> Result<File> {
        // Safety: standard fds are open at process start; F_DUPFD_CLOEXEC
        // returns a fresh descriptor we exclusively own.
        let copy = unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, MIN_CHANNEL_FD) };
        if copy < 0 {
            return Err(TransportError::Rebind {
                handle,
                source: std::io::Error::last_os_error(),
            });
        }
        // Safety: `copy` is a valid descriptor owned by nobody else.
        Ok(unsafe { File::from_raw_fd(copy) })
    }

    fn replace(src: RawFd, dst: RawFd, handle: &'static str) -> Result<()> {
        // Safety: dup2 atomically closes `dst` and reuses its number for `src`.
        if unsafe { libc::dup2(src, dst) } < 0 {
            return Err(TransportError::Rebind {
                handle,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}
