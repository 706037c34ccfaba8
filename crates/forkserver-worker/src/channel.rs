//! Lock-guarded ownership of the parent channel.
//!
//! One [`SharedChannel`] owns both pipe directions plus the resource file
//! counter. A request-reply cycle holds the channel lock from the first
//! request byte to the last reply byte. The lock is reentrant: a command
//! handler that triggers type resolution on the same thread re-enters it
//! instead of deadlocking. Cross-thread callers wait for the cycle in
//! progress to finish.
//!
//! State access goes through a `RefCell` borrowed only for the duration of a
//! single field read or write, never across a call into user code.

use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::PathBuf;

use forkserver_wire::{WireError, WireReader, WireWriter};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::config::WorkerConfig;

/// Both channel directions plus the per-process file counter.
pub struct ChannelState<R, W> {
    pub reader: WireReader<R>,
    pub writer: WireWriter<W>,
    next_resource: u64,
}

impl<R: Read, W: Write> ChannelState<R, W> {
    /// Drain one chunk stream into a freshly named resource file.
    ///
    /// Names left behind by an earlier worker are skipped, never
    /// overwritten. An index is consumed even when the file cannot be
    /// created, so names are never reused. A file failure still drains the
    /// stream.
    pub fn materialize(&mut self, config: &WorkerConfig) -> Result<PathBuf, WireError> {
        let (path, file) = loop {
            let index = self.next_resource;
            self.next_resource += 1;
            let path = config.resource_path(index);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(path = %path.display(), "resource name taken, skipping");
                }
                Err(err) => {
                    self.reader.drain_into(&mut std::io::sink())?;
                    return Err(WireError::Sink(err));
                }
            }
        };

        let mut sink = BufWriter::new(file);
        let size = self.reader.drain_into(&mut sink)?;
        sink.flush().map_err(WireError::Sink)?;

        tracing::debug!(path = %path.display(), size, "materialized resource");
        Ok(std::path::absolute(&path).unwrap_or(path))
    }

    /// Number of resource names handed out so far.
    pub fn resources_created(&self) -> u64 {
        self.next_resource
    }
}

/// The parent channel, shared between the command loop and resolvers.
pub struct SharedChannel<R, W> {
    state: ReentrantMutex<RefCell<ChannelState<R, W>>>,
}

impl<R: Read, W: Write> SharedChannel<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(ChannelState {
                reader: WireReader::new(input),
                writer: WireWriter::new(output),
                next_resource: 0,
            })),
        }
    }

    /// Acquire the channel for a request-reply cycle (blocking).
    pub fn lock(&self) -> ChannelGuard<'_, R, W> {
        ChannelGuard {
            guard: self.state.lock(),
        }
    }
}

/// Exclusive (per thread) access to the channel.
pub struct ChannelGuard<'a, R, W> {
    guard: ReentrantMutexGuard<'a, RefCell<ChannelState<R, W>>>,
}

impl<R: Read, W: Write> ChannelGuard<'_, R, W> {
    /// Run `f` with mutable access to the channel state.
    ///
    /// Fails instead of panicking if the state is already borrowed further up
    /// this thread's stack, which means a message was interrupted mid-way.
    pub fn with<T, E>(
        &self,
        f: impl FnOnce(&mut ChannelState<R, W>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<WireError>,
    {
        let mut state = self.guard.try_borrow_mut().map_err(|_| reentered())?;
        f(&mut *state)
    }

    /// A `Read` handle that borrows the state for each individual read.
    pub fn reader(&self) -> GuardedReader<'_, R, W> {
        GuardedReader { cell: &*self.guard }
    }

    /// Release the lock, handing it to a waiting thread if there is one.
    pub fn unlock_fair(self) {
        ReentrantMutexGuard::unlock_fair(self.guard);
    }
}

/// Reads from the channel without holding a borrow between calls, so code
/// consuming it may re-enter the channel for nested requests.
pub struct GuardedReader<'a, R, W> {
    cell: &'a RefCell<ChannelState<R, W>>,
}

impl<R: Read, W: Write> Read for GuardedReader<'_, R, W> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self
            .cell
            .try_borrow_mut()
            .map_err(|_| std::io::Error::other("channel re-entered mid-message"))?;
        state.reader.read(buf)
    }
}

fn reentered() -> WireError {
    WireError::Io(std::io::Error::other("channel re-entered mid-message"))
}
