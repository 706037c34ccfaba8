use std::fs::File;
use std::io::{Read, Write};

/// Inbound half of the parent channel.
///
/// On Unix this wraps a privately duplicated copy of the original stdin pipe.
/// Elsewhere it falls back to the process stdin handle.
pub struct ChannelInput {
    inner: InputInner,
}

enum InputInner {
    File(File),
    Stdin(std::io::Stdin),
}

/// Outbound half of the parent channel.
pub struct ChannelOutput {
    inner: OutputInner,
}

enum OutputInner {
    File(File),
    Stdout(std::io::Stdout),
}

impl ChannelInput {
    /// Wrap an already-owned file descriptor.
    pub fn from_file(file: File) -> Self {
        Self {
            inner: InputInner::File(file),
        }
    }

    /// Use the process stdin handle as-is.
    pub fn stdin() -> Self {
        Self {
            inner: InputInner::Stdin(std::io::stdin()),
        }
    }
}

impl ChannelOutput {
    /// Wrap an already-owned file descriptor.
    pub fn from_file(file: File) -> Self {
        Self {
            inner: OutputInner::File(file),
        }
    }

    /// Use the process stdout handle as-is.
    pub fn stdout() -> Self {
        Self {
            inner: OutputInner::Stdout(std::io::stdout()),
        }
    }
}

impl Read for ChannelInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            InputInner::File(file) => file.read(buf),
            InputInner::Stdin(stdin) => stdin.read(buf),
        }
    }
}

impl Write for ChannelOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            OutputInner::File(file) => file.write(buf),
            OutputInner::Stdout(stdout) => stdout.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            OutputInner::File(file) => file.flush(),
            OutputInner::Stdout(stdout) => stdout.flush(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;

    use super::*;

    fn file_pair() -> (File, File) {
        let (left, right) = UnixStream::pair().unwrap();
        (
            File::from(OwnedFd::from(left)),
            File::from(OwnedFd::from(right)),
        )
    }

    #[test]
    fn output_writes_reach_input() {
        let (left, right) = file_pair();
        let mut output = ChannelOutput::from_file(left);
        let mut input = ChannelInput::from_file(right);

        output.write_all(b"ping").unwrap();
        output.flush().unwrap();

        let mut buf = [0u8; 4];
        input.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn input_reports_eof_after_peer_drop() {
        let (left, right) = file_pair();
        let mut input = ChannelInput::from_file(right);
        drop(left);

        let mut buf = [0u8; 1];
        assert_eq!(input.read(&mut buf).unwrap(), 0);
    }
}
