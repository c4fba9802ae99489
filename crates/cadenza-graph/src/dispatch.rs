//! Per-module configuration payload construction and submission.
//!
//! Every custom-config payload sent to the backend has the same shape: a
//! 16-byte little-endian parameter header addressing the resolved module
//! instance, followed by a parameter-specific body, padded so the total
//! length is a multiple of 8 bytes (hardware alignment requirement).
//!
//! The numeric policy for sample formats (bit width, container width, Q
//! factor) lives on [`SampleFormat`]; this module only assembles bytes and
//! forwards backend errors unmodified. No retries happen here.

use cadenza_core::{
    AudioInterface, Channel, Direction, HwEndpointInfo, MediaConfig, SampleFormat,
    default_channel_map,
};

use crate::backend::ModuleHandle;
use crate::graph::{ConfigContext, ModuleBinding};
use crate::{Error, Result};

/// Parameter id: hardware endpoint media format.
pub const PARAM_ID_HW_EP_MF_CFG: u32 = 0x0800_1017;
/// Parameter id: codec DMA interface configuration.
pub const PARAM_ID_CODEC_DMA_INTF_CFG: u32 = 0x0800_1063;
/// Parameter id: PCM output format for encoder/decoder/converter modules.
pub const PARAM_ID_PCM_OUTPUT_FORMAT_CFG: u32 = 0x0800_100E;
/// Parameter id: media format for the shared-memory endpoint.
pub const PARAM_ID_MEDIA_FORMAT: u32 = 0x0800_100B;

/// Media format id for PCM inside a media-format header.
pub const MEDIA_FMT_ID_PCM: u32 = 0x0900_1000;
/// Data format: fixed point.
pub const DATA_FORMAT_FIXED_POINT: u32 = 1;

const PCM_LITTLE_ENDIAN: u16 = 1;
const PCM_LSB_ALIGNED: u16 = 1;
const PCM_INTERLEAVED: u16 = 1;
const PCM_DEINTERLEAVED_UNPACKED: u16 = 3;

/// Active channel mask for codec DMA endpoints. Fixed until the calibration
/// data carries per-device masks.
const CODEC_DMA_ACTIVE_CHANNEL_MASK: u32 = 3;

const PARAM_HEADER_LEN: usize = 16;

/// Round a payload length up to the next multiple of 8 bytes.
const fn align8(len: usize) -> usize {
    len.next_multiple_of(8)
}

/// Accumulates a little-endian parameter body.
struct PayloadBuilder {
    body: Vec<u8>,
}

impl PayloadBuilder {
    fn new() -> Self {
        Self { body: Vec::new() }
    }

    fn put_u16(&mut self, v: u16) -> &mut Self {
        self.body.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn put_u32(&mut self, v: u32) -> &mut Self {
        self.body.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn put_u8(&mut self, v: u8) -> &mut Self {
        self.body.push(v);
        self
    }

    /// Prefix the parameter header and pad to the 8-byte boundary.
    ///
    /// The header's `param_size` records the padded total, matching what the
    /// DSP expects to consume.
    fn finish(self, module: ModuleHandle, param_id: u32) -> Vec<u8> {
        let padded = align8(PARAM_HEADER_LEN + self.body.len());
        let mut payload = Vec::with_capacity(padded);
        payload.extend_from_slice(&module.instance_id.to_le_bytes());
        payload.extend_from_slice(&param_id.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes()); // error_code
        payload.extend_from_slice(&(padded as u32).to_le_bytes());
        payload.extend_from_slice(&self.body);
        payload.resize(padded, 0);
        payload
    }
}

/// Resolve the channel map to use: caller-supplied, or the default table.
fn channel_map_for(media: &MediaConfig, supplied: Option<&[Channel]>) -> Result<Vec<Channel>> {
    let map = match supplied {
        Some(map) => map.to_vec(),
        None => default_channel_map(media.channels),
    };
    if map.len() != media.channels as usize {
        return Err(Error::InvalidArgument(
            "channel map length does not match channel count",
        ));
    }
    Ok(map)
}

/// Build the hardware endpoint media-format payload.
pub fn hw_endpoint_media_format(module: ModuleHandle, media: &MediaConfig) -> Vec<u8> {
    let mut b = PayloadBuilder::new();
    b.put_u32(media.rate)
        .put_u32(u32::from(media.format.bit_width()))
        .put_u32(u32::from(media.channels))
        .put_u32(DATA_FORMAT_FIXED_POINT);
    b.finish(module, PARAM_ID_HW_EP_MF_CFG)
}

/// Build the codec DMA interface payload.
///
/// Only emitted for [`AudioInterface::CodecDma`] endpoints, after the
/// media-format payload.
pub fn codec_dma_interface(module: ModuleHandle, endpoint: &HwEndpointInfo) -> Vec<u8> {
    let mut b = PayloadBuilder::new();
    b.put_u32(endpoint.lpaif_type)
        .put_u32(endpoint.interface_index)
        .put_u32(CODEC_DMA_ACTIVE_CHANNEL_MASK);
    b.finish(module, PARAM_ID_CODEC_DMA_INTF_CFG)
}

/// Shared PCM format body for stream modules and the shared-memory endpoint.
///
/// `sample_rate` is present only in the shared-memory variant; `interleave`
/// only in the stream variant.
fn put_pcm_format(
    b: &mut PayloadBuilder,
    format: SampleFormat,
    channels: u16,
    interleave: Option<u16>,
    sample_rate: Option<u32>,
    map: &[Channel],
) {
    if let Some(rate) = sample_rate {
        b.put_u32(rate);
    }
    b.put_u16(PCM_LITTLE_ENDIAN)
        .put_u16(format.bit_width())
        .put_u16(PCM_LSB_ALIGNED)
        .put_u16(format.bits_per_sample())
        .put_u16(format.q_factor())
        .put_u16(channels);
    if let Some(mode) = interleave {
        b.put_u16(mode);
    }
    for &ch in map {
        b.put_u8(ch as u8);
    }
}

/// Build the PCM output-format payload for encoder/decoder/converter modules.
///
/// Playback (Rx) sessions use deinterleaved-unpacked mode; everything else
/// is interleaved. The channel map defaults to the fixed table when the
/// caller supplies none.
pub fn pcm_output_format(
    module: ModuleHandle,
    media: &MediaConfig,
    direction: Direction,
    channel_map: Option<&[Channel]>,
) -> Result<Vec<u8>> {
    let map = channel_map_for(media, channel_map)?;
    let interleave = match direction {
        Direction::Rx => PCM_DEINTERLEAVED_UNPACKED,
        Direction::Tx => PCM_INTERLEAVED,
    };

    // Seven u16 fields plus one map byte per channel.
    let mut b = PayloadBuilder::new();
    let inner_size = 14 + map.len();
    b.put_u32(DATA_FORMAT_FIXED_POINT)
        .put_u32(MEDIA_FMT_ID_PCM)
        .put_u32(inner_size as u32);
    put_pcm_format(
        &mut b,
        media.format,
        media.channels,
        Some(interleave),
        None,
        &map,
    );
    Ok(b.finish(module, PARAM_ID_PCM_OUTPUT_FORMAT_CFG))
}

/// Build the media-format payload for the shared-memory endpoint.
pub fn shared_mem_media_format(
    module: ModuleHandle,
    media: &MediaConfig,
    channel_map: Option<&[Channel]>,
) -> Result<Vec<u8>> {
    let map = channel_map_for(media, channel_map)?;

    // Sample rate u32, six u16 fields, one map byte per channel.
    let mut b = PayloadBuilder::new();
    let inner_size = 16 + map.len();
    b.put_u32(DATA_FORMAT_FIXED_POINT)
        .put_u32(MEDIA_FMT_ID_PCM)
        .put_u32(inner_size as u32);
    put_pcm_format(
        &mut b,
        media.format,
        media.channels,
        None,
        Some(media.rate),
        &map,
    );
    Ok(b.finish(module, PARAM_ID_MEDIA_FORMAT))
}

/// Configuration routine for hardware endpoint modules.
///
/// Sends the media-format payload, then the interface-specific payload for
/// codec DMA endpoints. Other interface types need no follow-up.
pub(crate) fn configure_hw_endpoint(
    binding: &ModuleBinding,
    ctx: &ConfigContext<'_>,
) -> Result<()> {
    let device = binding
        .device()
        .ok_or(Error::InvalidArgument("hardware endpoint device released"))?;
    let module = binding.module();
    tracing::debug!(
        instance = module.instance_id,
        module = module.module_id,
        "configuring hw endpoint"
    );

    let payload = hw_endpoint_media_format(module, &device.media);
    ctx.submit(&payload)?;

    match device.endpoint.interface {
        AudioInterface::CodecDma => {
            let payload = codec_dma_interface(module, &device.endpoint);
            ctx.submit(&payload)
        }
        _ => Ok(()),
    }
}

/// Configuration routine for PCM encoder/decoder/converter modules.
///
/// All three carry the same PCM output-format parameter, so one routine
/// serves them.
pub(crate) fn configure_pcm_stream(binding: &ModuleBinding, ctx: &ConfigContext<'_>) -> Result<()> {
    let session = ctx
        .session()
        .ok_or(Error::InvalidArgument("stream module without a session"))?;
    let module = binding.module();
    tracing::debug!(
        instance = module.instance_id,
        module = module.module_id,
        "configuring pcm stream module"
    );

    let payload = pcm_output_format(module, &session.media, session.stream.direction, None)?;
    ctx.submit(&payload)
}

/// Configuration routine for the shared-memory endpoint.
pub(crate) fn configure_shared_mem(binding: &ModuleBinding, ctx: &ConfigContext<'_>) -> Result<()> {
    let session = ctx
        .session()
        .ok_or(Error::InvalidArgument("shared-memory endpoint without a session"))?;
    let module = binding.module();
    tracing::debug!(
        instance = module.instance_id,
        module = module.module_id,
        "configuring shared-memory endpoint"
    );

    let payload = shared_mem_media_format(module, &session.media, None)?;
    ctx.submit(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> ModuleHandle {
        ModuleHandle {
            instance_id: 0x4001,
            module_id: 0x0700_10BE,
        }
    }

    fn media(channels: u16, format: SampleFormat) -> MediaConfig {
        MediaConfig {
            rate: 48000,
            channels,
            format,
        }
    }

    #[test]
    fn header_addresses_module_instance() {
        let payload = hw_endpoint_media_format(module(), &media(2, SampleFormat::S16Le));
        assert_eq!(&payload[0..4], &0x4001u32.to_le_bytes());
        assert_eq!(&payload[4..8], &PARAM_ID_HW_EP_MF_CFG.to_le_bytes());
        // error_code zero
        assert_eq!(&payload[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn param_size_records_padded_total() {
        let payload = codec_dma_interface(
            module(),
            &HwEndpointInfo {
                interface: AudioInterface::CodecDma,
                direction: cadenza_core::DeviceDirection::Output,
                interface_index: 1,
                lpaif_type: 4,
            },
        );
        let recorded = u32::from_le_bytes(payload[12..16].try_into().unwrap());
        assert_eq!(recorded as usize, payload.len());
        assert_eq!(payload.len() % 8, 0);
    }

    #[test]
    fn pcm_payload_interleave_follows_direction() {
        let rx = pcm_output_format(module(), &media(2, SampleFormat::S16Le), Direction::Rx, None)
            .unwrap();
        let tx = pcm_output_format(module(), &media(2, SampleFormat::S16Le), Direction::Tx, None)
            .unwrap();
        // interleave field sits after header (16) + media fmt hdr (12) +
        // six u16 fields (12).
        let off = 16 + 12 + 12;
        assert_eq!(u16::from_le_bytes(rx[off..off + 2].try_into().unwrap()), 3);
        assert_eq!(u16::from_le_bytes(tx[off..off + 2].try_into().unwrap()), 1);
    }

    #[test]
    fn explicit_channel_map_overrides_default() {
        let map = [Channel::Right, Channel::Left];
        let payload = pcm_output_format(
            module(),
            &media(2, SampleFormat::S16Le),
            Direction::Tx,
            Some(&map),
        )
        .unwrap();
        let off = 16 + 12 + 14;
        assert_eq!(payload[off], Channel::Right as u8);
        assert_eq!(payload[off + 1], Channel::Left as u8);
    }

    #[test]
    fn mismatched_channel_map_rejected() {
        let map = [Channel::Left];
        let err = pcm_output_format(
            module(),
            &media(2, SampleFormat::S16Le),
            Direction::Tx,
            Some(&map),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn unsupported_channel_count_rejected() {
        let err =
            pcm_output_format(module(), &media(9, SampleFormat::S16Le), Direction::Tx, None)
                .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn shared_mem_payload_carries_sample_rate() {
        let payload =
            shared_mem_media_format(module(), &media(1, SampleFormat::S32Le), None).unwrap();
        let rate = u32::from_le_bytes(payload[28..32].try_into().unwrap());
        assert_eq!(rate, 48000);
        assert_eq!(payload.len() % 8, 0);
    }
}
