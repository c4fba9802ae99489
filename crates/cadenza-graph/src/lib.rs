//! Cadenza Graph - Audio graph lifecycle orchestration over a DSP backend
//!
//! This crate drives signal-processing graphs living on an audio DSP through
//! their lifecycle: open a graph selected by key vectors, configure its
//! modules, start and stop streaming, rewire device legs at runtime, and move
//! data between the host and the DSP's shared-memory endpoint.
//!
//! - [`Graph`] - one open graph instance and all operations on it
//! - [`GraphBackend`] - the trait a DSP transport implements
//! - [`ModuleKind`] / [`ModuleTag`] - the static catalog of known modules
//! - payload builders ([`hw_endpoint_media_format`] and friends) - the wire
//!   encoding of module configuration parameters
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cadenza_core::{MetaData, Session};
//! use cadenza_graph::Graph;
//!
//! let graph = Graph::open(backend, &metadata, Some(Arc::new(session)), None)?;
//! graph.register_callback(Box::new(|event| println!("{}", event.event_id)));
//! graph.prepare()?;
//! graph.start()?;
//! graph.write(&samples)?;
//! graph.stop()?;
//! graph.close()?;
//! ```
//!
//! ## Concurrency
//!
//! Each [`Graph`] serializes its own operations behind one mutex; distinct
//! graphs never contend. Backend events arrive on the backend's callback
//! thread and are routed to the owning graph through an opaque token, so a
//! graph torn down with an event in flight is simply skipped.

mod backend;
mod dispatch;
mod events;
mod graph;
mod registry;

pub use backend::{
    BackendHandle, BufferParams, EventTrampoline, GraphBackend, GraphCommand, GraphEvent,
    GraphSelect, ModuleHandle, SHMEM_ENDPOINT, TransferDescriptor, TransferMode,
};
pub use dispatch::{
    codec_dma_interface, hw_endpoint_media_format, pcm_output_format, shared_mem_media_format,
};
pub use graph::{
    BindingSnapshot, ConfigContext, EventCallback, Graph, GraphState, ModuleBinding,
};
pub use registry::{
    ConfigureFn, ModuleDescriptor, ModuleKind, ModuleTag, hw_endpoint_module, stream_modules,
};

/// Errors produced by graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation is not allowed in the graph's current state, or the
    /// graph's configuration is internally inconsistent.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A tagged module required by the operation is missing from the graph.
    #[error("tagged module {0:?} not found in graph")]
    NotFound(ModuleTag),

    /// The backend ran out of a bounded resource.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// The backend reported a failure it could not express otherwise.
    #[error("backend error {0}")]
    Backend(i32),

    /// The operation is not supported by the engine.
    #[error("{0} is not supported")]
    NotSupported(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
