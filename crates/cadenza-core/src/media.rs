//! Media configuration: sample formats, directions, and channel maps.

use serde::{Deserialize, Serialize};

/// Data flow direction of a session, seen from the host.
///
/// `Rx` is playback (host writes, device renders), `Tx` is capture
/// (device produces, host reads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Playback: data flows host -> device.
    Rx,
    /// Capture: data flows device -> host.
    Tx,
}

/// PCM sample format.
///
/// The engine maps each format onto the fixed-point description the DSP
/// expects: a bit width, a container width (bits per sample), and a Q factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian.
    #[default]
    S16Le,
    /// Signed 24-bit in a 32-bit container, LSB aligned.
    S24Le,
    /// Packed signed 24-bit (3 bytes per sample).
    S24Le3,
    /// Signed 32-bit little-endian.
    S32Le,
}

impl SampleFormat {
    /// Significant bits per sample.
    pub const fn bit_width(self) -> u16 {
        match self {
            SampleFormat::S16Le => 16,
            SampleFormat::S24Le | SampleFormat::S24Le3 => 24,
            SampleFormat::S32Le => 32,
        }
    }

    /// Container width in bits.
    ///
    /// `S24Le` carries 24 significant bits in a 32-bit word; every other
    /// format fills its container exactly.
    pub const fn bits_per_sample(self) -> u16 {
        match self {
            SampleFormat::S24Le => 32,
            other => other.bit_width(),
        }
    }

    /// Fixed-point Q factor.
    ///
    /// `S24Le` uses Q27 (24 bits LSB aligned in 32); everything else is
    /// full-scale, `bit_width - 1`.
    pub const fn q_factor(self) -> u16 {
        match self {
            SampleFormat::S24Le => 27,
            other => other.bit_width() - 1,
        }
    }
}

/// Media configuration shared by sessions and devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Sample rate in Hz.
    pub rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Sample format.
    pub format: SampleFormat,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            rate: 48000,
            channels: 2,
            format: SampleFormat::default(),
        }
    }
}

/// Speaker position identifiers used in channel maps.
///
/// Values are the wire encoding the DSP expects, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    /// Front left.
    Left = 1,
    /// Front right.
    Right = 2,
    /// Front center.
    Center = 3,
    /// Low frequency effects.
    LowFrequency = 4,
    /// Left back (surround).
    LeftBack = 5,
    /// Right back (surround).
    RightBack = 6,
    /// Center surround.
    CenterSurround = 7,
    /// Left side.
    LeftSide = 8,
    /// Right side.
    RightSide = 9,
}

/// Default channel map for 1 to 8 channels.
///
/// Used whenever the caller does not supply an explicit map. Counts outside
/// 1..=8 produce an empty map; the mismatch surfaces when the configuration
/// payload is validated against the channel count.
pub fn default_channel_map(channels: u16) -> Vec<Channel> {
    use Channel::{
        Center, CenterSurround, Left, LeftBack, LeftSide, LowFrequency, Right, RightBack,
        RightSide,
    };
    match channels {
        1 => vec![Center],
        2 => vec![Left, Right],
        3 => vec![Left, Right, Center],
        4 => vec![Left, Right, LeftBack, RightBack],
        5 => vec![Left, Right, Center, LeftBack, RightBack],
        6 => vec![Left, Right, Center, LowFrequency, LeftBack, RightBack],
        // 5.1 plus one extra channel; can be customized per DSP.
        7 => vec![
            Left,
            Right,
            Center,
            LowFrequency,
            LeftBack,
            RightBack,
            CenterSurround,
        ],
        8 => vec![
            Left,
            Right,
            Center,
            LowFrequency,
            LeftBack,
            RightBack,
            LeftSide,
            RightSide,
        ],
        _ => Vec::new(),
    }
}
