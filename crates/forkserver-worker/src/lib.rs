//! Worker side of the forkserver protocol.
//!
//! A worker is spawned by a parent process that owns all classes and
//! resources. The worker runs a [`ForkServer`] command loop over its stdio
//! channel and, whenever the embedded runtime needs a class or resource it
//! does not have, asks the parent for it through the same channel via the
//! [`RemoteTypeProvider`].

pub mod channel;
pub mod config;
pub mod error;
pub mod payload;
pub mod provider;
pub mod resolver;
pub mod server;
pub mod types;

pub use channel::{ChannelGuard, ChannelState, GuardedReader, SharedChannel};
pub use config::{WorkerConfig, RESOURCE_PREFIX, RESOURCE_SUFFIX};
pub use error::{CodecError, DefineError, ResolveError, Result, ServerError};
pub use payload::{
    echo_value, FailureKind, FailureReport, JsonPayloadCodec, PayloadCodec, DEFAULT_MAX_PAYLOAD,
    TYPE_FIELD,
};
pub use provider::RemoteTypeProvider;
pub use resolver::{
    class_resource_name, context_resolver, enter_context, ContextGuard, Resources, TypeResolver,
};
pub use server::{ForkServer, ServeSummary};
pub use types::{DefinedType, TypeDefiner, TypeTable};
