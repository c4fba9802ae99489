//! Hardware endpoint device descriptors.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::media::MediaConfig;

/// Hardware audio interface behind an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioInterface {
    /// Codec DMA -- requires an interface-specific configuration payload.
    CodecDma,
    /// MI2S serial interface.
    Mi2s,
    /// TDM serial interface.
    Tdm,
    /// Auxiliary PCM interface.
    Auxpcm,
}

/// Physical direction of a hardware endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceDirection {
    /// Microphone-side: audio enters the system here.
    Input,
    /// Speaker-side: audio leaves the system here.
    Output,
}

/// Description of a hardware endpoint interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwEndpointInfo {
    /// Interface type.
    pub interface: AudioInterface,
    /// Physical direction.
    pub direction: DeviceDirection,
    /// Interface index on the SoC (which DMA/I2S instance).
    pub interface_index: u32,
    /// Low-power audio interface type identifier.
    pub lpaif_type: u32,
}

/// Hardware endpoint device.
///
/// Immutable descriptor apart from the start reference count, which the
/// session layer bumps whenever a graph using this device is started. The
/// engine reads the count to decide whether the first-use direction conflict
/// check still applies.
#[derive(Debug)]
pub struct Device {
    /// Endpoint interface description.
    pub endpoint: HwEndpointInfo,
    /// Media configuration of the hardware path.
    pub media: MediaConfig,
    start_refs: AtomicU32,
}

impl Device {
    /// Create a device descriptor with a zero start count.
    pub fn new(endpoint: HwEndpointInfo, media: MediaConfig) -> Self {
        Self {
            endpoint,
            media,
            start_refs: AtomicU32::new(0),
        }
    }

    /// Number of times this device has been started and not yet stopped.
    pub fn start_count(&self) -> u32 {
        self.start_refs.load(Ordering::Acquire)
    }

    /// Record a start of a graph using this device.
    pub fn mark_started(&self) {
        self.start_refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a stop. Saturates at zero.
    pub fn mark_stopped(&self) {
        let _ = self
            .start_refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}
