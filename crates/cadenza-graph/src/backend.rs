//! Pluggable graph backend abstraction.
//!
//! This module defines the [`GraphBackend`] trait, the capability boundary
//! between the orchestration engine and the DSP execution library that
//! actually opens graphs, runs modules, and moves data. The engine never
//! talks to hardware directly; everything goes through this trait:
//!
//! - **Production**: a wrapper over the vendor's graph service library
//! - **Testing**: a deterministic mock that records calls and scripted replies
//!
//! ## Object safety
//!
//! The trait is object-safe so backends can be selected at runtime behind
//! `Arc<dyn GraphBackend>`. A single graph handle may be used concurrently by
//! multiple graph operations on different graph objects, so implementations
//! must be `Send + Sync`; calls are assumed blocking and are never retried by
//! the engine.
//!
//! ## Event delivery
//!
//! Backends deliver asynchronous events by calling the [`EventTrampoline`]
//! registered per handle, passing back the opaque token supplied at
//! registration. The engine resolves the token through a safe registry (see
//! [`crate::events`]); backends never hold pointers into engine state.

use cadenza_core::KeyVector;

use crate::Result;
use crate::registry::ModuleTag;

/// Opaque token for one open backend graph instance.
///
/// Owned exclusively by the graph object it was opened for and released
/// through [`GraphBackend::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendHandle(u64);

impl BackendHandle {
    /// Wrap a raw backend token.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Identifiers of one tagged module resolved inside a compiled graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHandle {
    /// Instance id, unique per module instance in the open graph.
    pub instance_id: u32,
    /// Module type id.
    pub module_id: u32,
}

/// Key vectors accompanying an add/change graph command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSelect {
    /// Graph key vector selecting the topology to add or change to.
    pub graph: KeyVector,
    /// Calibration key vector for the new topology.
    pub calibration: KeyVector,
}

/// Host buffer transfer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// read/write block until the backend completes the transfer.
    Blocking,
}

/// Buffering parameters negotiated during prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferParams {
    /// Size of one buffer in bytes.
    pub size: u32,
    /// Number of buffers.
    pub count: u32,
    /// Buffers queued before rendering starts.
    pub start_threshold: u32,
    /// Buffer level at which the stream stops.
    pub stop_threshold: u32,
    /// Data transfer mode.
    pub mode: TransferMode,
}

/// Graph state-transition and configuration commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCommand<'a> {
    /// Prepare all modules in the graph for streaming.
    Prepare,
    /// Start the graph.
    Start,
    /// Stop the graph.
    Stop,
    /// Add a new subgraph (device leg) to an open graph.
    AddGraph(&'a GraphSelect),
    /// Replace the graph topology; the backend discards the old one.
    ChangeGraph(&'a GraphSelect),
    /// Remove the subgraph selected by the key vector.
    RemoveGraph(&'a KeyVector),
    /// Configure host-read (capture) buffering.
    ConfigureReadParams(&'a BufferParams),
    /// Configure host-write (playback) buffering.
    ConfigureWriteParams(&'a BufferParams),
}

/// Fixed-format descriptor accompanying every data transfer.
///
/// Both fields are currently always zero; the backend interface carries them
/// for timestamped and flagged (e.g. end-of-stream) transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferDescriptor {
    /// Capture/render timestamp in microseconds.
    pub timestamp: u64,
    /// Transfer flags.
    pub flags: u32,
}

/// One asynchronous event raised by the backend for an open graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEvent {
    /// Instance id of the module that raised the event.
    pub module_instance: u32,
    /// Backend-defined event identifier.
    pub event_id: u32,
    /// Event-specific payload, opaque to the engine.
    pub payload: Vec<u8>,
}

/// Global event trampoline registered with the backend.
///
/// The backend invokes it with the token passed at registration; the engine
/// resolves the token to the owning graph and forwards to its listener.
pub type EventTrampoline = fn(token: u64, event: &GraphEvent);

/// Endpoint identifier for host data transfers (the shared-memory endpoint).
pub const SHMEM_ENDPOINT: u32 = 0xC000_0000;

/// Capability trait over the DSP graph execution library.
///
/// Consumed by the engine, implemented outside it. All methods are blocking;
/// failures are surfaced to the caller unmodified and never retried.
pub trait GraphBackend: Send + Sync {
    /// Open the graph selected by the graph and calibration key vectors.
    fn open(&self, graph: &KeyVector, calibration: &KeyVector) -> Result<BackendHandle>;

    /// Close an open graph and release its handle.
    fn close(&self, handle: BackendHandle) -> Result<()>;

    /// Issue a state-transition or buffering command.
    fn ioctl(&self, handle: BackendHandle, command: GraphCommand<'_>) -> Result<()>;

    /// Submit a module configuration payload.
    ///
    /// The payload starts with a 16-byte parameter header and is always a
    /// multiple of 8 bytes long (hardware alignment requirement).
    fn set_custom_config(&self, handle: BackendHandle, payload: &[u8]) -> Result<()>;

    /// Register the event trampoline and its opaque token for this handle.
    ///
    /// At most one registration per handle; a later call replaces the
    /// earlier one.
    fn register_event_callback(
        &self,
        handle: BackendHandle,
        trampoline: EventTrampoline,
        token: u64,
    ) -> Result<()>;

    /// Read captured data from an endpoint. Returns the number of bytes
    /// transferred; zero is a valid (non-fatal) outcome.
    fn read(
        &self,
        handle: BackendHandle,
        endpoint: u32,
        descriptor: &TransferDescriptor,
        buf: &mut [u8],
    ) -> Result<usize>;

    /// Write playback data to an endpoint. Returns the number of bytes
    /// transferred.
    fn write(
        &self,
        handle: BackendHandle,
        endpoint: u32,
        descriptor: &TransferDescriptor,
        buf: &[u8],
    ) -> Result<usize>;

    /// Resolve a tagged module against a graph key vector.
    ///
    /// Returns `Ok(None)` when the tag is not present in the selected
    /// topology -- a graph may legitimately omit modules, so absence is not
    /// an error at this boundary.
    fn resolve_tagged_module(
        &self,
        graph: &KeyVector,
        tag: ModuleTag,
    ) -> Result<Option<ModuleHandle>>;
}
