//! Session descriptors.
//!
//! A [`Session`] describes one host-attached stream: direction, media format,
//! stream behavior, and buffering. Sessions are created by the layer above
//! the graph engine and are read-only here.

use serde::{Deserialize, Serialize};

use crate::media::{Direction, MediaConfig};

/// Stream behavior for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Data flow direction.
    pub direction: Direction,
    /// True for device-to-device loopback with no host data path.
    pub hostless: bool,
    /// Number of buffers that must be queued before rendering starts.
    pub start_threshold: u32,
    /// Buffer level at which the stream stops.
    pub stop_threshold: u32,
}

impl SessionConfig {
    /// Playback configuration with default thresholds.
    pub fn playback() -> Self {
        Self {
            direction: Direction::Rx,
            hostless: false,
            start_threshold: 1,
            stop_threshold: 0,
        }
    }

    /// Capture configuration with default thresholds.
    pub fn capture() -> Self {
        Self {
            direction: Direction::Tx,
            hostless: false,
            start_threshold: 1,
            stop_threshold: 0,
        }
    }
}

/// Host-side buffering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Size of one buffer in bytes.
    pub size: u32,
    /// Number of buffers.
    pub count: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            size: 4096,
            count: 4,
        }
    }
}

/// One host-attached stream, immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Sample rate, channels, and format of the host data path.
    pub media: MediaConfig,
    /// Stream behavior.
    pub stream: SessionConfig,
    /// Buffering parameters.
    pub buffer: BufferConfig,
}

impl Session {
    /// Create a session descriptor.
    pub fn new(media: MediaConfig, stream: SessionConfig, buffer: BufferConfig) -> Self {
        Self {
            media,
            stream,
            buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_from_toml() {
        let session: Session = toml::from_str(
            r#"
            media = { rate = 44100, channels = 2, format = "S24Le" }
            stream = { direction = "Rx", hostless = false, start_threshold = 2, stop_threshold = 0 }
            buffer = { size = 8192, count = 4 }
            "#,
        )
        .unwrap();
        assert_eq!(session.media.rate, 44100);
        assert_eq!(session.media.format, crate::SampleFormat::S24Le);
        assert!(!session.stream.hostless);
        assert_eq!(session.buffer.count, 4);
    }

    #[test]
    fn playback_capture_directions() {
        assert_eq!(SessionConfig::playback().direction, Direction::Rx);
        assert_eq!(SessionConfig::capture().direction, Direction::Tx);
    }
}
