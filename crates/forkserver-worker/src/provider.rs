use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use forkserver_wire::{ResourceKind, WireError};
use tracing::{debug, error, warn};

use crate::channel::SharedChannel;
use crate::config::WorkerConfig;
use crate::error::ResolveError;
use crate::resolver::{class_resource_name, Resources, TypeResolver};
use crate::types::{DefinedType, TypeDefiner};

/// Resolves classes and resources by asking the parent over the channel.
///
/// Every hook is one request-reply cycle under the channel lock, so calls
/// from any number of threads never interleave on the wire.
pub struct RemoteTypeProvider<R, W> {
    channel: SharedChannel<R, W>,
    config: WorkerConfig,
    types: Arc<dyn TypeDefiner>,
}

impl<R: Read, W: Write> RemoteTypeProvider<R, W> {
    pub fn new(input: R, output: W, config: WorkerConfig, types: Arc<dyn TypeDefiner>) -> Self {
        Self {
            channel: SharedChannel::new(input, output),
            config,
            types,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// The runtime's type table.
    pub fn types(&self) -> &Arc<dyn TypeDefiner> {
        &self.types
    }

    /// Number of resource file names consumed so far.
    ///
    /// Reports 0 when called from inside a request cycle on this thread.
    pub fn resources_created(&self) -> u64 {
        let guard = self.channel.lock();
        guard
            .with(|state| Ok::<_, WireError>(state.resources_created()))
            .unwrap_or(0)
    }

    pub(crate) fn channel(&self) -> &SharedChannel<R, W> {
        &self.channel
    }
}

impl<R, W> TypeResolver for RemoteTypeProvider<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn resolve_resource(&self, name: &str) -> Option<PathBuf> {
        let guard = self.channel.lock();
        let result = guard.with(|state| {
            state.writer.write_request(ResourceKind::Single, name)?;
            state.writer.flush()?;

            if !state.reader.read_bool()? {
                return Ok(None);
            }
            state.materialize(&self.config).map(Some)
        });

        match result {
            Ok(found) => {
                debug!(name, found = found.is_some(), "resource request complete");
                found
            }
            Err(err) => {
                warn!(name, error = %err, "resource request failed, reporting not found");
                None
            }
        }
    }

    fn resolve_resources(&self, name: &str) -> Result<Resources, ResolveError> {
        let guard = self.channel.lock();
        let locators = guard.with(|state| {
            state.writer.write_request(ResourceKind::Multi, name)?;
            state.writer.flush()?;

            let mut locators = Vec::new();
            while state.reader.read_bool()? {
                match state.materialize(&self.config) {
                    Ok(path) => locators.push(path),
                    Err(WireError::Sink(err)) => {
                        warn!(name, error = %err, "skipping resource that could not be stored");
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(locators)
        })?;

        debug!(name, count = locators.len(), "multi-resource request complete");
        Ok(locators.into_iter())
    }

    fn resolve_class(&self, name: &str) -> Result<Option<Arc<DefinedType>>, ResolveError> {
        let guard = self.channel.lock();
        let resource = class_resource_name(name);
        let fetched = guard.with(|state| {
            state.writer.write_request(ResourceKind::Single, &resource)?;
            state.writer.flush()?;

            if !state.reader.read_bool()? {
                return Ok(None);
            }
            state.reader.read_chunks().map(Some)
        });

        let bytecode = match fetched {
            Ok(Some(bytecode)) => bytecode,
            Ok(None) => {
                debug!(class = name, "parent does not define class");
                return Ok(None);
            }
            Err(err) => {
                error!(class = name, error = %err, "unable to load class");
                return Err(ResolveError::NotFound {
                    name: name.to_string(),
                    source: Some(err),
                });
            }
        };

        // Still under the lock: definition may recurse into this resolver.
        let defined = self
            .types
            .define(name, Bytes::from(bytecode))
            .map_err(|source| ResolveError::Define {
                name: name.to_string(),
                source,
            })?;
        drop(guard);
        Ok(Some(defined))
    }

    fn loaded_class(&self, name: &str) -> Option<Arc<DefinedType>> {
        self.types.lookup(name)
    }

    fn load_class(&self, name: &str) -> Result<Arc<DefinedType>, ResolveError> {
        // Held across lookup and fetch so two threads cannot both define `name`.
        let _guard = self.channel.lock();
        if let Some(defined) = self.types.lookup(name) {
            return Ok(defined);
        }
        self.resolve_class(name)?
            .ok_or_else(|| ResolveError::not_found(name))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::Mutex;
    use std::thread::{self, JoinHandle, ThreadId};

    use forkserver_wire::{Opcode, WireReader, WireWriter};

    use super::*;
    use crate::types::TypeTable;

    type Provider = RemoteTypeProvider<UnixStream, UnixStream>;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "forkserver-provider-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn provider(dir: &std::path::Path) -> (Provider, UnixStream) {
        let (worker, parent) = UnixStream::pair().expect("socket pair");
        let input = worker.try_clone().expect("clone worker stream");
        let provider = RemoteTypeProvider::new(
            input,
            worker,
            WorkerConfig::default().with_resource_dir(dir),
            Arc::new(TypeTable::new()),
        );
        (provider, parent)
    }

    /// Plays the parent: runs `serve` against the parent end of the pipe.
    fn parent<F>(stream: UnixStream, serve: F) -> JoinHandle<()>
    where
        F: FnOnce(&mut WireReader<UnixStream>, &mut WireWriter<UnixStream>) + Send + 'static,
    {
        thread::spawn(move || {
            let mut writer = WireWriter::new(stream.try_clone().expect("clone parent stream"));
            let mut reader = WireReader::new(stream);
            serve(&mut reader, &mut writer);
        })
    }

    fn expect_request(reader: &mut WireReader<UnixStream>) -> (ResourceKind, String) {
        assert_eq!(reader.read_opcode().unwrap(), Some(Opcode::Resource));
        reader.read_request().unwrap()
    }

    /// Writes a raw chunk stream with the given chunk sizes.
    fn write_raw_chunks(writer: &mut WireWriter<UnixStream>, chunks: &[&[u8]]) {
        for chunk in chunks {
            writer.write_all(&(chunk.len() as u16).to_be_bytes()).unwrap();
            writer.write_all(chunk).unwrap();
        }
        writer.write_all(&[0, 0]).unwrap();
    }

    fn dir_entries(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn absent_resource_is_not_found_without_creating_files() {
        let dir = temp_dir("absent");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            let (kind, name) = expect_request(reader);
            assert_eq!(kind, ResourceKind::Single);
            assert_eq!(name, "config/missing.properties");
            writer.write_bool(false);
            writer.flush().unwrap();
        });

        assert!(provider
            .resolve_resource("config/missing.properties")
            .is_none());
        server.join().unwrap();
        assert_eq!(dir_entries(&dir), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn present_resource_is_materialized_under_fresh_names() {
        let dir = temp_dir("present");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            for _ in 0..2 {
                expect_request(reader);
                writer.write_bool(true);
                write_raw_chunks(writer, &[b"abcd", b"efg"]);
                writer.flush().unwrap();
            }
        });

        let first = provider.resolve_resource("data.bin").expect("first resource");
        let second = provider.resolve_resource("data.bin").expect("second resource");
        server.join().unwrap();

        assert_ne!(first, second);
        assert!(first.is_absolute());
        assert_eq!(std::fs::read(&first).unwrap(), b"abcdefg");
        assert_eq!(std::fs::read(&second).unwrap(), b"abcdefg");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn channel_failure_on_resource_is_not_found() {
        let dir = temp_dir("closed");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, _writer| {
            expect_request(reader);
        });
        assert!(provider.resolve_resource("anything").is_none());
        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn multiple_resources_arrive_in_order() {
        let dir = temp_dir("multi");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            let (kind, name) = expect_request(reader);
            assert_eq!(kind, ResourceKind::Multi);
            assert_eq!(name, "META-INF/services/org.example.Plugin");
            writer.write_bool(true);
            writer.write_chunks(b"first");
            writer.write_bool(true);
            writer.write_chunks(b"second");
            writer.write_bool(false);
            writer.flush().unwrap();
        });

        let locators: Vec<PathBuf> = provider
            .resolve_resources("META-INF/services/org.example.Plugin")
            .unwrap()
            .collect();
        server.join().unwrap();

        assert_eq!(locators.len(), 2);
        assert_eq!(std::fs::read(&locators[0]).unwrap(), b"first");
        assert_eq!(std::fs::read(&locators[1]).unwrap(), b"second");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn no_resources_is_empty_sequence() {
        let dir = temp_dir("multi-empty");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            expect_request(reader);
            writer.write_bool(false);
            writer.flush().unwrap();
        });

        assert_eq!(provider.resolve_resources("none").unwrap().count(), 0);
        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn channel_failure_on_multi_resource_is_error() {
        let dir = temp_dir("multi-closed");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            expect_request(reader);
            writer.write_bool(true);
            writer.flush().unwrap();
        });
        let err = provider.resolve_resources("cut").unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, ResolveError::Channel(WireError::ConnectionClosed)));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn class_request_uses_class_file_name_and_defines_type() {
        let dir = temp_dir("class");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            let (kind, name) = expect_request(reader);
            assert_eq!(kind, ResourceKind::Single);
            assert_eq!(name, "org/example/Foo.class");
            writer.write_bool(true);
            writer.write_chunks(b"\xCA\xFE\xBA\xBE");
            writer.flush().unwrap();
        });

        let defined = provider
            .resolve_class("org.example.Foo")
            .unwrap()
            .expect("class should be defined");
        server.join().unwrap();

        assert_eq!(defined.name, "org.example.Foo");
        assert_eq!(defined.bytecode.as_ref(), b"\xCA\xFE\xBA\xBE");
        assert!(provider.loaded_class("org.example.Foo").is_some());
        assert_eq!(dir_entries(&dir), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn undefined_class_is_none() {
        let dir = temp_dir("class-absent");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            expect_request(reader);
            writer.write_bool(false);
            writer.flush().unwrap();
        });

        assert!(provider.resolve_class("org.example.Nope").unwrap().is_none());
        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn channel_failure_on_class_is_not_found_with_cause() {
        let dir = temp_dir("class-closed");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            expect_request(reader);
            writer.write_bool(true);
            writer.write_all(&[0, 9, 1, 2]).unwrap();
            writer.flush().unwrap();
        });
        let err = provider.resolve_class("org.example.Cut").unwrap_err();
        server.join().unwrap();
        match err {
            ResolveError::NotFound { name, source } => {
                assert_eq!(name, "org.example.Cut");
                assert!(matches!(source, Some(WireError::ConnectionClosed)));
            }
            other => panic!("unexpected error: {other}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_class_bytes_fail_definition() {
        let dir = temp_dir("class-empty");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            expect_request(reader);
            writer.write_bool(true);
            writer.write_chunks(b"");
            writer.flush().unwrap();
        });

        let err = provider.resolve_class("org.example.Empty").unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, ResolveError::Define { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_class_only_asks_parent_once() {
        let dir = temp_dir("load-once");
        let (provider, stream) = provider(&dir);

        let server = parent(stream, |reader, writer| {
            expect_request(reader);
            writer.write_bool(true);
            writer.write_chunks(b"bytes");
            writer.flush().unwrap();
            // A second request would block here forever; EOF proves none came.
            assert_eq!(reader.read_opcode().unwrap(), None);
        });

        let first = provider.load_class("a.B").unwrap();
        let second = provider.load_class("a.B").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        drop(provider);
        server.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    /// Stream wrapper logging which thread touched the channel, in order.
    struct Recorded {
        inner: UnixStream,
        log: Arc<Mutex<Vec<ThreadId>>>,
    }

    impl Read for Recorded {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.log.lock().unwrap().push(thread::current().id());
            self.inner.read(buf)
        }
    }

    impl Write for Recorded {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.log.lock().unwrap().push(thread::current().id());
            self.inner.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn concurrent_class_requests_never_interleave() {
        let dir = temp_dir("concurrent");
        let (worker, stream) = UnixStream::pair().expect("socket pair");
        let log = Arc::new(Mutex::new(Vec::new()));
        let provider = Arc::new(RemoteTypeProvider::new(
            Recorded {
                inner: worker.try_clone().unwrap(),
                log: Arc::clone(&log),
            },
            Recorded {
                inner: worker,
                log: Arc::clone(&log),
            },
            WorkerConfig::default().with_resource_dir(&dir),
            Arc::new(TypeTable::new()),
        ));

        // Replies carry the requested name back, so a stolen reply is visible.
        let server = parent(stream, |reader, writer| {
            for _ in 0..2 {
                let (_, name) = expect_request(reader);
                writer.write_bool(true);
                writer.flush().unwrap();
                thread::sleep(std::time::Duration::from_millis(20));
                writer.write_chunks(name.as_bytes());
                writer.flush().unwrap();
            }
        });

        let workers: Vec<_> = ["one.Alpha", "two.Beta"]
            .into_iter()
            .map(|class| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || provider.resolve_class(class).unwrap().unwrap())
            })
            .collect();
        let defined: Vec<Arc<DefinedType>> =
            workers.into_iter().map(|h| h.join().unwrap()).collect();
        server.join().unwrap();

        assert_eq!(defined[0].bytecode.as_ref(), b"one/Alpha.class");
        assert_eq!(defined[1].bytecode.as_ref(), b"two/Beta.class");

        let log = log.lock().unwrap();
        let switches = log.windows(2).filter(|pair| pair[0] != pair[1]).count();
        assert_eq!(switches, 1, "channel access interleaved between threads");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
