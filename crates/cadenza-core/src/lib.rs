//! Core descriptor types for the cadenza audio-graph engine.
//!
//! This crate holds the plain-data vocabulary shared by the orchestration
//! layer and its callers:
//!
//! - **Key vectors**: [`KeyVector`] and [`MetaData`] select which compiled
//!   backend topology and calibration data a graph uses
//! - **Media configuration**: [`MediaConfig`], [`SampleFormat`], and the
//!   default [`Channel`] map table
//! - **Session descriptors**: [`Session`] with stream and buffer parameters
//! - **Device descriptors**: [`Device`] hardware endpoint descriptions
//!
//! All types here are immutable from the engine's perspective (the one
//! exception is the device start reference count, which is an atomic).
//! Descriptor types derive `serde` traits so callers can load graph and
//! session descriptions from configuration files.

mod device;
mod keys;
mod media;
mod session;

pub use device::{AudioInterface, Device, DeviceDirection, HwEndpointInfo};
pub use keys::{KeyValue, KeyVector, MetaData};
pub use media::{Channel, Direction, MediaConfig, SampleFormat, default_channel_map};
pub use session::{BufferConfig, Session, SessionConfig};
