//! Static catalog of module kinds known to the engine.
//!
//! The registry is an immutable, process-wide table mapping each module kind
//! to its backend lookup tag and its configuration routine. It carries no
//! per-graph state -- resolved identifiers and configured flags live on
//! [`crate::graph::ModuleBinding`] -- so it is shared read-only across all
//! graphs without synchronization.

use cadenza_core::DeviceDirection;

use crate::Result;
use crate::dispatch;
use crate::graph::{ConfigContext, ModuleBinding};

/// Kind of processing module participating in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Hardware endpoint on the render side.
    HwEndpointRx,
    /// Hardware endpoint on the capture side.
    HwEndpointTx,
    /// PCM encoder (capture stream leg).
    PcmEncoder,
    /// PCM decoder (playback stream leg).
    PcmDecoder,
    /// PCM sample converter.
    PcmConverter,
    /// Shared-memory endpoint between host and DSP.
    SharedMemEndpoint,
}

impl ModuleKind {
    /// True for the two hardware endpoint kinds.
    pub const fn is_hw_endpoint(self) -> bool {
        matches!(self, ModuleKind::HwEndpointRx | ModuleKind::HwEndpointTx)
    }
}

/// Backend lookup tag of a tagged module.
///
/// Discriminants are the wire values used in graph key-vector lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ModuleTag {
    /// PCM encoder stream module.
    StreamPcmEncoder = 0xC000_0001,
    /// PCM decoder stream module.
    StreamPcmDecoder = 0xC000_0002,
    /// PCM converter stream module.
    StreamPcmConverter = 0xC000_0003,
    /// Shared-memory endpoint (stream input media format).
    StreamInputMediaFormat = 0xC000_0004,
    /// Hardware endpoint, render side.
    DeviceHwEndpointRx = 0xC000_0005,
    /// Hardware endpoint, capture side.
    DeviceHwEndpointTx = 0xC000_0006,
}

/// Configuration routine invoked once per binding during prepare/add/change.
pub type ConfigureFn = fn(&ModuleBinding, &ConfigContext<'_>) -> Result<()>;

/// Immutable descriptor of one module kind.
#[derive(Clone, Copy)]
pub struct ModuleDescriptor {
    /// Module kind.
    pub kind: ModuleKind,
    /// Backend lookup tag.
    pub tag: ModuleTag,
    /// Kind-specific configuration routine.
    pub configure: ConfigureFn,
}

impl std::fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("kind", &self.kind)
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Stream modules resolved for host-attached graphs, in discovery order.
static STREAM_MODULES: [ModuleDescriptor; 4] = [
    ModuleDescriptor {
        kind: ModuleKind::PcmEncoder,
        tag: ModuleTag::StreamPcmEncoder,
        configure: dispatch::configure_pcm_stream,
    },
    ModuleDescriptor {
        kind: ModuleKind::PcmDecoder,
        tag: ModuleTag::StreamPcmDecoder,
        configure: dispatch::configure_pcm_stream,
    },
    ModuleDescriptor {
        kind: ModuleKind::PcmConverter,
        tag: ModuleTag::StreamPcmConverter,
        configure: dispatch::configure_pcm_stream,
    },
    ModuleDescriptor {
        kind: ModuleKind::SharedMemEndpoint,
        tag: ModuleTag::StreamInputMediaFormat,
        configure: dispatch::configure_shared_mem,
    },
];

static HW_ENDPOINT_RX: ModuleDescriptor = ModuleDescriptor {
    kind: ModuleKind::HwEndpointRx,
    tag: ModuleTag::DeviceHwEndpointRx,
    configure: dispatch::configure_hw_endpoint,
};

static HW_ENDPOINT_TX: ModuleDescriptor = ModuleDescriptor {
    kind: ModuleKind::HwEndpointTx,
    tag: ModuleTag::DeviceHwEndpointTx,
    configure: dispatch::configure_hw_endpoint,
};

/// The stream-module descriptors in discovery order.
pub fn stream_modules() -> &'static [ModuleDescriptor] {
    &STREAM_MODULES
}

/// The hardware endpoint descriptor applicable to a device direction.
///
/// An output device (speaker side) feeds the render endpoint; an input
/// device (microphone side) feeds the capture endpoint.
pub fn hw_endpoint_module(direction: DeviceDirection) -> &'static ModuleDescriptor {
    match direction {
        DeviceDirection::Output => &HW_ENDPOINT_RX,
        DeviceDirection::Input => &HW_ENDPOINT_TX,
    }
}
