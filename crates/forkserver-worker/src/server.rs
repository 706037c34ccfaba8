use std::io::{Read, Write};
use std::sync::Arc;

use forkserver_transport::{ChannelInput, ChannelOutput, StdioChannel};
use forkserver_wire::Opcode;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelGuard, ChannelState};
use crate::config::WorkerConfig;
use crate::error::{CodecError, Result, ServerError};
use crate::payload::{echo_value, FailureReport, JsonPayloadCodec, PayloadCodec};
use crate::provider::RemoteTypeProvider;
use crate::resolver::{enter_context, TypeResolver};
use crate::types::{TypeDefiner, TypeTable};

/// Counters reported when the command loop ends cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// ECHO commands answered with ECHO.
    pub echoes: u64,
    /// ECHO commands answered with ERROR.
    pub failures: u64,
    /// Resource file names consumed during the session.
    pub resources_created: u64,
}

/// The worker's command loop.
///
/// Owns the channel through its [`RemoteTypeProvider`]; the loop and every
/// resolution hook share the same channel lock.
pub struct ForkServer<R, W, C = JsonPayloadCodec> {
    provider: Arc<RemoteTypeProvider<R, W>>,
    codec: C,
}

impl<R, W> ForkServer<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Server with the in-process type table and the JSON codec.
    pub fn new(input: R, output: W, config: WorkerConfig) -> Self {
        Self::with_parts(
            input,
            output,
            config,
            Arc::new(TypeTable::new()),
            JsonPayloadCodec::default(),
        )
    }
}

impl ForkServer<ChannelInput, ChannelOutput> {
    /// Server over the channel returned by stdio rebinding.
    pub fn from_stdio(channel: StdioChannel, config: WorkerConfig) -> Self {
        let (input, output) = channel.into_split();
        Self::new(input, output, config)
    }
}

impl<R, W, C> ForkServer<R, W, C>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
    C: PayloadCodec,
{
    pub fn with_parts(
        input: R,
        output: W,
        config: WorkerConfig,
        types: Arc<dyn TypeDefiner>,
        codec: C,
    ) -> Self {
        Self {
            provider: Arc::new(RemoteTypeProvider::new(input, output, config, types)),
            codec,
        }
    }

    /// The resolver to register with the host runtime.
    ///
    /// Safe to call from any thread while [`run`](Self::run) is active.
    pub fn resolver(&self) -> Arc<RemoteTypeProvider<R, W>> {
        Arc::clone(&self.provider)
    }

    /// Process commands until the parent closes the channel.
    ///
    /// Each command holds the channel lock from its opcode byte to its
    /// flushed reply. Resolution hooks on other threads run between
    /// commands.
    pub fn run(&self) -> Result<ServeSummary> {
        let resolver: Arc<dyn TypeResolver> = self.provider.clone();
        let _context = enter_context(resolver);
        let mut summary = ServeSummary::default();
        info!("command loop started");

        loop {
            let guard = self.provider.channel().lock();
            let opcode = guard.with(|state| state.reader.read_opcode())?;

            match opcode {
                None => break,
                Some(Opcode::Echo) => {
                    if self.echo(&guard)? {
                        summary.echoes += 1;
                    } else {
                        summary.failures += 1;
                    }
                }
                Some(other) => {
                    error!(opcode = %other, "unexpected opcode at top level");
                    return Err(ServerError::UnexpectedOpcode(other));
                }
            }
            guard.unlock_fair();
        }

        summary.resources_created = self.provider.resources_created();
        info!(
            echoes = summary.echoes,
            failures = summary.failures,
            resources = summary.resources_created,
            "parent closed channel"
        );
        Ok(summary)
    }

    /// Answer one ECHO. Returns whether the reply was an ECHO.
    fn echo(&self, guard: &ChannelGuard<'_, R, W>) -> Result<bool> {
        let decoded = self
            .codec
            .deserialize(&mut guard.reader(), self.provider.as_ref());

        let (opcode, reply, ok) = match decoded {
            Ok(value) => {
                debug!("echo payload decoded");
                (Opcode::Echo, echo_value(&value), true)
            }
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "echo payload rejected");
                (Opcode::Error, FailureReport::decode(&err).to_value()?, false)
            }
            Err(err) => {
                error!(error = %err, "echo payload truncated or unreadable");
                return Err(err.into());
            }
        };

        match guard.with(|state| self.write_reply(state, opcode, &reply)) {
            Ok(()) => Ok(ok),
            Err(err @ CodecError::Encode(_)) if opcode == Opcode::Echo => {
                warn!(error = %err, "echo reply could not be encoded");
                let failure = FailureReport::encode(&err).to_value()?;
                guard.with(|state| self.write_reply(state, Opcode::Error, &failure))?;
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write_reply(
        &self,
        state: &mut ChannelState<R, W>,
        opcode: Opcode,
        reply: &Value,
    ) -> std::result::Result<(), CodecError> {
        state.writer.write_opcode(opcode);
        if let Err(err) = self.codec.serialize(&mut state.writer, reply) {
            state.writer.discard();
            return Err(err);
        }
        state.writer.flush()?;
        Ok(())
    }
}
