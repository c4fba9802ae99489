//! Graph lifecycle orchestration.
//!
//! A [`Graph`] owns one open backend graph instance and drives it through
//! its lifecycle: open, prepare, start, stop, topology mutation (add /
//! change / remove device legs), host data transfer, and close. Each graph
//! carries its own mutex; every operation takes it for its full duration,
//! so operations on one graph are serialized while distinct graphs proceed
//! fully in parallel.
//!
//! ## State machine
//!
//! ```text
//!           open              prepare            start
//! CLOSED ────────▶ OPENED ────────────▶ PREPARED ──────▶ STARTED
//!                     ▲                     ▲               │
//!                     │                     │ prepare       │ stop
//!                     │ (close from any     │               ▼
//!                     │  non-closed state)  └─────────── STOPPED
//!                     │                          start ──────┘
//! ```
//!
//! `prepare` is accepted from OPENED or STOPPED, `start` from PREPARED or
//! STOPPED, `stop` only from STARTED. `pause`/`resume` are unsupported in
//! every state. Operations attempted outside their required states fail
//! with [`Error::InvalidState`] and leave the state untouched.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use cadenza_core::{Device, DeviceDirection, Direction, MetaData, Session};

use crate::backend::{
    BackendHandle, BufferParams, GraphBackend, GraphCommand, GraphEvent, GraphSelect,
    ModuleHandle, SHMEM_ENDPOINT, TransferDescriptor, TransferMode,
};
use crate::registry::{self, ConfigureFn, ModuleDescriptor, ModuleKind, ModuleTag};
use crate::{Error, Result, events};

/// Lifecycle state of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Backend handle released; the object no longer exists in this state.
    Closed,
    /// Graph opened, modules resolved but not yet configured.
    Opened,
    /// Modules configured and the backend prepared for streaming.
    Prepared,
    /// Streaming.
    Started,
    /// Streaming stopped; prepare or start may follow.
    Stopped,
}

/// Listener invoked for every backend event delivered to this graph.
///
/// Context the caller needs travels in the closure's captures. The listener
/// runs on the backend's callback thread while the graph lock is held, so it
/// must not call back into graph operations.
pub type EventCallback = Box<dyn FnMut(&GraphEvent) + Send>;

/// One resolved module participating in a graph.
///
/// Created when a tag resolves during open/add/change; destroyed at close
/// (all bindings) or when a device leg is superseded during change.
pub struct ModuleBinding {
    kind: ModuleKind,
    tag: ModuleTag,
    module: ModuleHandle,
    configured: bool,
    device: Option<Weak<Device>>,
    configure: ConfigureFn,
}

impl ModuleBinding {
    fn from_descriptor(
        desc: &ModuleDescriptor,
        module: ModuleHandle,
        device: Option<&Arc<Device>>,
    ) -> Self {
        Self {
            kind: desc.kind,
            tag: desc.tag,
            module,
            configured: false,
            device: device.map(Arc::downgrade),
            configure: desc.configure,
        }
    }

    /// Module kind.
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Backend lookup tag this binding resolved from.
    pub fn tag(&self) -> ModuleTag {
        self.tag
    }

    /// Resolved backend identifiers.
    pub fn module(&self) -> ModuleHandle {
        self.module
    }

    /// True once the configuration routine has succeeded since the last
    /// reset.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// The associated device, if this is a hardware endpoint binding and the
    /// device is still alive.
    pub fn device(&self) -> Option<Arc<Device>> {
        self.device.as_ref().and_then(Weak::upgrade)
    }
}

impl std::fmt::Debug for ModuleBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBinding")
            .field("kind", &self.kind)
            .field("module", &self.module)
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}

/// Snapshot of one binding, for introspection and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSnapshot {
    /// Module kind.
    pub kind: ModuleKind,
    /// Resolved identifiers.
    pub module: ModuleHandle,
    /// Configured flag at snapshot time.
    pub configured: bool,
}

/// Backend access handed to configuration routines.
pub struct ConfigContext<'a> {
    backend: &'a dyn GraphBackend,
    handle: BackendHandle,
    session: Option<&'a Session>,
}

impl ConfigContext<'_> {
    /// Submit a configuration payload for this graph.
    pub(crate) fn submit(&self, payload: &[u8]) -> Result<()> {
        self.backend.set_custom_config(self.handle, payload)
    }

    /// The session attached to the graph, if any.
    pub(crate) fn session(&self) -> Option<&Session> {
        self.session
    }
}

struct GraphInner {
    state: GraphState,
    bindings: Vec<ModuleBinding>,
    session: Option<Arc<Session>>,
    buf_config: Option<BufferParams>,
    listener: Option<EventCallback>,
}

/// State shared between the graph handle and the event bridge.
pub(crate) struct GraphShared {
    backend: Arc<dyn GraphBackend>,
    handle: BackendHandle,
    token: u64,
    inner: Mutex<GraphInner>,
}

impl GraphShared {
    fn lock(&self) -> MutexGuard<'_, GraphInner> {
        // A poisoned lock means a backend panicked mid-operation; the state
        // it guards is still structurally valid, so take it anyway.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a backend event to the registered listener, if any.
    pub(crate) fn deliver(&self, event: &GraphEvent) {
        let mut inner = self.lock();
        match inner.listener.as_mut() {
            Some(listener) => listener(event),
            None => tracing::debug!(event_id = event.event_id, "event with no listener dropped"),
        }
    }
}

impl Drop for GraphShared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if inner.state != GraphState::Closed {
            if let Err(err) = self.backend.close(self.handle) {
                tracing::error!(error = %err, "backend close failed during teardown");
            }
            inner.bindings.clear();
            inner.state = GraphState::Closed;
        }
        events::unbind(self.token);
    }
}

/// One open audio graph instance.
///
/// Obtained from [`Graph::open`]; the backend handle is owned exclusively by
/// this object and released by [`Graph::close`] (or on drop).
pub struct Graph {
    shared: Arc<GraphShared>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("handle", &self.shared.handle)
            .field("token", &self.shared.token)
            .finish_non_exhaustive()
    }
}

impl Graph {
    /// Open a graph selected by the metadata key vectors.
    ///
    /// When a `session` is supplied, each stream-module tag is resolved
    /// against the graph key vector; tags absent from the topology are
    /// skipped (a graph may legitimately omit modules). When a `device` is
    /// supplied, the hardware endpoint tag matching the device's direction
    /// is resolved the same way. The backend graph is then opened and an
    /// event callback registered.
    ///
    /// Any failure unwinds all partial state; no partially opened graph is
    /// ever returned.
    pub fn open(
        backend: Arc<dyn GraphBackend>,
        metadata: &MetaData,
        session: Option<Arc<Session>>,
        device: Option<&Arc<Device>>,
    ) -> Result<Graph> {
        let mut bindings = Vec::new();

        if session.is_some() {
            for desc in registry::stream_modules() {
                match backend.resolve_tagged_module(&metadata.graph, desc.tag)? {
                    Some(module) => {
                        tracing::debug!(
                            tag = ?desc.tag,
                            instance = module.instance_id,
                            "resolved stream module"
                        );
                        bindings.push(ModuleBinding::from_descriptor(desc, module, None));
                    }
                    None => {
                        tracing::debug!(tag = ?desc.tag, "tag not in topology, skipping");
                    }
                }
            }
        }

        if let Some(device) = device {
            let desc = registry::hw_endpoint_module(device.endpoint.direction);
            match backend.resolve_tagged_module(&metadata.graph, desc.tag)? {
                Some(module) => {
                    tracing::debug!(
                        tag = ?desc.tag,
                        instance = module.instance_id,
                        "resolved hw endpoint module"
                    );
                    bindings.push(ModuleBinding::from_descriptor(desc, module, Some(device)));
                }
                None => {
                    tracing::debug!(tag = ?desc.tag, "tag not in topology, skipping");
                }
            }
        }

        let handle = backend.open(&metadata.graph, &metadata.calibration)?;
        tracing::debug!(handle = handle.raw(), "graph opened");

        let token = events::next_token();
        let shared = Arc::new(GraphShared {
            backend,
            handle,
            token,
            inner: Mutex::new(GraphInner {
                state: GraphState::Opened,
                bindings,
                session,
                buf_config: None,
                listener: None,
            }),
        });
        events::bind(token, &shared);

        if let Err(err) = shared
            .backend
            .register_event_callback(handle, events::dispatch, token)
        {
            tracing::error!(error = %err, "failed to register event callback");
            // GraphShared::drop closes the handle and unbinds the token.
            return Err(err);
        }

        Ok(Graph { shared })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GraphState {
        self.shared.lock().state
    }

    /// Snapshot of the resolved bindings in discovery order.
    pub fn bindings(&self) -> Vec<BindingSnapshot> {
        self.shared
            .lock()
            .bindings
            .iter()
            .map(|b| BindingSnapshot {
                kind: b.kind,
                module: b.module,
                configured: b.configured,
            })
            .collect()
    }

    /// Buffering parameters negotiated during the last successful prepare,
    /// if any.
    pub fn buffer_config(&self) -> Option<BufferParams> {
        self.shared.lock().buf_config
    }

    /// Configure all pending modules and prepare the backend for streaming.
    ///
    /// Bindings are configured in discovery order; already-configured ones
    /// are skipped. The first configuration failure aborts and is returned
    /// as-is, leaving earlier bindings marked configured (no rollback of
    /// partial progress). For host-attached, non-hostless sessions the
    /// buffering parameters are sent once all modules are configured.
    pub fn prepare(&self) -> Result<()> {
        let shared = self.shared.as_ref();
        let mut inner = shared.lock();
        if !matches!(inner.state, GraphState::Opened | GraphState::Stopped) {
            tracing::error!(state = ?inner.state, "prepare rejected");
            return Err(Error::InvalidState(
                "prepare requires an opened or stopped graph",
            ));
        }

        let session = inner.session.clone();
        Self::configure_bindings(shared, &mut *inner, session.as_deref(), true, true)?;

        if let Some(session) = session.as_deref() {
            if !session.stream.hostless {
                let params = BufferParams {
                    size: session.buffer.size,
                    count: session.buffer.count,
                    start_threshold: session.stream.start_threshold,
                    stop_threshold: session.stream.stop_threshold,
                    mode: TransferMode::Blocking,
                };
                tracing::debug!(
                    direction = ?session.stream.direction,
                    size = params.size,
                    count = params.count,
                    "configuring buffers"
                );
                let command = match session.stream.direction {
                    Direction::Rx => GraphCommand::ConfigureWriteParams(&params),
                    Direction::Tx => GraphCommand::ConfigureReadParams(&params),
                };
                shared.backend.ioctl(shared.handle, command)?;
                inner.buf_config = Some(params);
            }
        }

        shared.backend.ioctl(shared.handle, GraphCommand::Prepare)?;
        inner.state = GraphState::Prepared;
        Ok(())
    }

    /// Start streaming.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        if !matches!(inner.state, GraphState::Prepared | GraphState::Stopped) {
            tracing::error!(state = ?inner.state, "start rejected");
            return Err(Error::InvalidState(
                "start requires a prepared or stopped graph",
            ));
        }
        self.shared
            .backend
            .ioctl(self.shared.handle, GraphCommand::Start)?;
        inner.state = GraphState::Started;
        Ok(())
    }

    /// Stop streaming.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        if inner.state != GraphState::Started {
            tracing::error!(state = ?inner.state, "stop rejected");
            return Err(Error::InvalidState("stop requires a started graph"));
        }
        self.shared
            .backend
            .ioctl(self.shared.handle, GraphCommand::Stop)?;
        inner.state = GraphState::Stopped;
        Ok(())
    }

    /// Pausing is not supported by the engine in any state.
    pub fn pause(&self) -> Result<()> {
        Err(Error::NotSupported("pause"))
    }

    /// Resuming is not supported by the engine in any state.
    pub fn resume(&self) -> Result<()> {
        Err(Error::NotSupported("resume"))
    }

    /// Add a subgraph (typically a new device leg) to the open graph.
    ///
    /// Existing stream bindings are untouched. If `device` resolves to a
    /// module instance already bound, no new binding is created and it is
    /// not reconfigured. All unconfigured bindings are configured at the
    /// end, including pre-existing ones.
    pub fn add(&self, metadata: &MetaData, device: Option<&Arc<Device>>) -> Result<()> {
        let shared = self.shared.as_ref();
        let mut inner = shared.lock();
        if inner.state == GraphState::Closed {
            return Err(Error::InvalidState("add requires an open graph"));
        }

        let select = GraphSelect {
            graph: metadata.graph.clone(),
            calibration: metadata.calibration.clone(),
        };
        shared
            .backend
            .ioctl(shared.handle, GraphCommand::AddGraph(&select))?;

        if let Some(device) = device {
            let desc = registry::hw_endpoint_module(device.endpoint.direction);
            let module = shared
                .backend
                .resolve_tagged_module(&metadata.graph, desc.tag)?
                .ok_or(Error::NotFound(desc.tag))?;
            let present = inner
                .bindings
                .iter()
                .any(|b| b.module.instance_id == module.instance_id);
            if !present {
                tracing::debug!(
                    tag = ?desc.tag,
                    instance = module.instance_id,
                    "adding device leg"
                );
                inner
                    .bindings
                    .push(ModuleBinding::from_descriptor(desc, module, Some(device)));
            }
        }

        let session = inner.session.clone();
        Self::configure_bindings(shared, &mut *inner, session.as_deref(), false, true)
    }

    /// Replace the graph topology.
    ///
    /// Disallowed while streaming. The backend implicitly discards the old
    /// topology, so every binding's configured flag is reset and all
    /// bindings are reconfigured after the change command. If `device`
    /// resolves to a new module instance, all existing hardware endpoint
    /// bindings (either direction) are dropped and replaced with one for the
    /// new device.
    pub fn change(&self, metadata: &MetaData, device: Option<&Arc<Device>>) -> Result<()> {
        let shared = self.shared.as_ref();
        let mut inner = shared.lock();
        if inner.state == GraphState::Started {
            tracing::error!("cannot change graph while started");
            return Err(Error::InvalidState("cannot change graph while started"));
        }

        for binding in &mut inner.bindings {
            binding.configured = false;
        }

        if let Some(device) = device {
            let desc = registry::hw_endpoint_module(device.endpoint.direction);
            let module = shared
                .backend
                .resolve_tagged_module(&metadata.graph, desc.tag)?
                .ok_or(Error::NotFound(desc.tag))?;
            let present = inner
                .bindings
                .iter()
                .any(|b| b.module.instance_id == module.instance_id);
            if !present {
                // The old device leg is no longer part of the graph.
                inner.bindings.retain(|b| !b.kind.is_hw_endpoint());
                tracing::debug!(
                    tag = ?desc.tag,
                    instance = module.instance_id,
                    "rebinding device leg"
                );
                inner
                    .bindings
                    .push(ModuleBinding::from_descriptor(desc, module, Some(device)));
            }
        }

        let select = GraphSelect {
            graph: metadata.graph.clone(),
            calibration: metadata.calibration.clone(),
        };
        shared
            .backend
            .ioctl(shared.handle, GraphCommand::ChangeGraph(&select))?;

        let session = inner.session.clone();
        Self::configure_bindings(shared, &mut *inner, session.as_deref(), false, false)
    }

    /// Remove the subgraph selected by the metadata's graph key vector.
    ///
    /// Bindings and their configured flags are deliberately left untouched;
    /// callers must follow with [`Graph::add`] or [`Graph::change`] before
    /// the next prepare/start cycle.
    pub fn remove(&self, metadata: &MetaData) -> Result<()> {
        let shared = &self.shared;
        let inner = shared.lock();
        if inner.state == GraphState::Closed {
            return Err(Error::InvalidState("remove requires an open graph"));
        }
        shared
            .backend
            .ioctl(shared.handle, GraphCommand::RemoveGraph(&metadata.graph))
    }

    /// Read captured data from the shared-memory endpoint.
    ///
    /// Returns the number of bytes transferred. `Ok(0)` is a valid,
    /// non-fatal outcome (no data was available); it is reported to the
    /// caller rather than escalated.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let inner = self.shared.lock();
        if inner.state != GraphState::Started {
            return Err(Error::InvalidState("read requires a started graph"));
        }
        let descriptor = TransferDescriptor::default();
        let n = self
            .shared
            .backend
            .read(self.shared.handle, SHMEM_ENDPOINT, &descriptor, buf)?;
        if n == 0 {
            tracing::debug!(requested = buf.len(), "read returned no data");
        }
        drop(inner);
        Ok(n)
    }

    /// Write playback data to the shared-memory endpoint.
    ///
    /// Returns the number of bytes transferred.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let inner = self.shared.lock();
        if inner.state != GraphState::Started {
            return Err(Error::InvalidState("write requires a started graph"));
        }
        let descriptor = TransferDescriptor::default();
        let n = self
            .shared
            .backend
            .write(self.shared.handle, SHMEM_ENDPOINT, &descriptor, buf)?;
        drop(inner);
        Ok(n)
    }

    /// Forward an opaque configuration payload to the backend.
    pub fn set_config(&self, payload: &[u8]) -> Result<()> {
        let _inner = self.shared.lock();
        self.shared
            .backend
            .set_custom_config(self.shared.handle, payload)
    }

    /// Register the event listener for this graph, replacing any previous
    /// one.
    pub fn register_callback(&self, listener: EventCallback) {
        self.shared.lock().listener = Some(listener);
    }

    /// Number of buffers the hardware has processed.
    ///
    /// TODO: query the backend once it exposes a processed-buffer count;
    /// until then this reports the fixed value the platform assumes.
    pub fn hw_processed_buffer_count(&self, _direction: Direction) -> usize {
        2
    }

    /// Close the graph: release the backend handle, then every binding.
    ///
    /// A backend close failure is logged and returned, but never prevents
    /// teardown -- bindings are released and the event registration removed
    /// regardless.
    pub fn close(self) -> Result<()> {
        let shared = &self.shared;
        let mut inner = shared.lock();
        tracing::debug!(handle = shared.handle.raw(), "closing graph");
        let ret = shared.backend.close(shared.handle);
        if let Err(err) = &ret {
            tracing::error!(error = %err, "backend close failed");
        }
        inner.bindings.clear();
        inner.listener = None;
        inner.buf_config = None;
        inner.state = GraphState::Closed;
        drop(inner);
        events::unbind(shared.token);
        ret
    }

    /// Configure bindings in list order.
    ///
    /// `validate` runs the prepare-time consistency checks before each
    /// binding; `skip_configured` leaves already-configured bindings alone.
    /// The first failure aborts the loop and is returned unmodified; earlier
    /// bindings stay marked configured.
    fn configure_bindings(
        shared: &GraphShared,
        inner: &mut GraphInner,
        session: Option<&Session>,
        validate: bool,
        skip_configured: bool,
    ) -> Result<()> {
        let ctx = ConfigContext {
            backend: &*shared.backend,
            handle: shared.handle,
            session,
        };
        for i in 0..inner.bindings.len() {
            if skip_configured && inner.bindings[i].configured {
                continue;
            }
            if validate {
                Self::validate_binding(&inner.bindings[i], session)?;
            }
            let binding = &inner.bindings[i];
            (binding.configure)(binding, &ctx)?;
            inner.bindings[i].configured = true;
        }
        Ok(())
    }

    /// Prepare-time consistency checks for one binding.
    fn validate_binding(binding: &ModuleBinding, session: Option<&Session>) -> Result<()> {
        if let Some(session) = session {
            if binding.kind == ModuleKind::SharedMemEndpoint && session.stream.hostless {
                tracing::error!("shared-memory endpoint present in a hostless session");
                return Err(Error::InvalidState(
                    "shared-memory endpoint present in a hostless session",
                ));
            }
            let conflicting = match binding.kind {
                ModuleKind::PcmDecoder => session.stream.direction == Direction::Tx,
                ModuleKind::PcmEncoder => session.stream.direction == Direction::Rx,
                _ => false,
            };
            if conflicting {
                tracing::error!(
                    kind = ?binding.kind,
                    direction = ?session.stream.direction,
                    "stream module direction conflicts with session"
                );
                return Err(Error::InvalidState(
                    "stream module direction conflicts with session direction",
                ));
            }
        }

        // First-use check only: once the device has been started at least
        // once its wiring is known good.
        if let Some(device) = binding.device() {
            if device.start_count() == 0 {
                let mismatch = match binding.kind {
                    ModuleKind::HwEndpointRx => {
                        device.endpoint.direction == DeviceDirection::Input
                    }
                    ModuleKind::HwEndpointTx => {
                        device.endpoint.direction == DeviceDirection::Output
                    }
                    _ => false,
                };
                if mismatch {
                    tracing::error!(
                        kind = ?binding.kind,
                        direction = ?device.endpoint.direction,
                        "device direction conflicts with endpoint"
                    );
                    return Err(Error::InvalidState(
                        "device direction conflicts with endpoint direction",
                    ));
                }
            }
        }
        Ok(())
    }
}
