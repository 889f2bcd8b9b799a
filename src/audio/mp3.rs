use crate::foundation::error::{PackError, PackResult};

/// MPEG audio version from the frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1 (32, 44.1 and 48 kHz).
    Mpeg1,
    /// MPEG-2 LSF (16, 22.05 and 24 kHz).
    Mpeg2,
    /// Unofficial MPEG-2.5 (8, 11.025 and 12 kHz).
    Mpeg25,
}

/// Stream parameters read from the first MPEG audio frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mp3StreamInfo {
    /// Byte offset of the first frame.
    pub frame_offset: usize,
    /// MPEG version.
    pub version: MpegVersion,
    /// Layer (1, 2 or 3).
    pub layer: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// 1 for mono, 2 otherwise.
    pub channels: u16,
    /// Bitrate of the first frame.
    pub bitrate_kbps: u32,
}

const BITRATES_V1: [[u32; 14]; 3] = [
    [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];
const BITRATES_V2: [[u32; 14]; 2] = [
    [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

#[derive(Clone, Copy, Debug)]
struct FrameHeader {
    version: MpegVersion,
    layer: u8,
    sample_rate: u32,
    channels: u16,
    bitrate_kbps: u32,
    frame_len: usize,
}

impl FrameHeader {
    fn parse(b: &[u8]) -> Option<Self> {
        let &[b0, b1, b2, b3] = b.get(..4)? else {
            return None;
        };
        if b0 != 0xff || b1 & 0xe0 != 0xe0 {
            return None;
        }

        let version = match (b1 >> 3) & 0b11 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return None,
        };
        let layer = match (b1 >> 1) & 0b11 {
            1 => 3,
            2 => 2,
            3 => 1,
            _ => return None,
        };

        let bitrate_idx = usize::from(b2 >> 4);
        // 0 is free format, 15 is invalid.
        if bitrate_idx == 0 || bitrate_idx == 15 {
            return None;
        }
        let bitrate_kbps = match version {
            MpegVersion::Mpeg1 => BITRATES_V1[usize::from(layer - 1)][bitrate_idx - 1],
            _ => BITRATES_V2[usize::from(layer != 1)][bitrate_idx - 1],
        };

        let base_rate = match (b2 >> 2) & 0b11 {
            0 => 44_100,
            1 => 48_000,
            2 => 32_000,
            _ => return None,
        };
        let sample_rate = match version {
            MpegVersion::Mpeg1 => base_rate,
            MpegVersion::Mpeg2 => base_rate / 2,
            MpegVersion::Mpeg25 => base_rate / 4,
        };

        let padding = usize::from((b2 >> 1) & 1);
        let channels = if b3 >> 6 == 0b11 { 1 } else { 2 };

        let bits = bitrate_kbps as usize * 1000;
        let rate = sample_rate as usize;
        let frame_len = match (layer, version) {
            (1, _) => (12 * bits / rate + padding) * 4,
            (3, MpegVersion::Mpeg2 | MpegVersion::Mpeg25) => 72 * bits / rate + padding,
            _ => 144 * bits / rate + padding,
        };

        Some(Self {
            version,
            layer,
            sample_rate,
            channels,
            bitrate_kbps,
            frame_len,
        })
    }
}

/// Find the first MPEG audio frame and report its stream parameters.
///
/// A candidate header is accepted when it is followed by another compatible header, or when its
/// frame ends exactly at the end of the data. Tags should be stripped beforehand.
pub fn probe_mp3(bytes: &[u8]) -> PackResult<Mp3StreamInfo> {
    for offset in 0..bytes.len().saturating_sub(3) {
        let Some(frame) = FrameHeader::parse(&bytes[offset..]) else {
            continue;
        };
        let next = offset + frame.frame_len;
        let confirmed = next == bytes.len()
            || bytes.get(next..).and_then(FrameHeader::parse).is_some_and(|n| {
                n.version == frame.version
                    && n.layer == frame.layer
                    && n.sample_rate == frame.sample_rate
            });
        if !confirmed {
            continue;
        }

        if offset > 0 {
            tracing::debug!(offset, "skipped leading bytes before first MPEG frame");
        }
        return Ok(Mp3StreamInfo {
            frame_offset: offset,
            version: frame.version,
            layer: frame.layer,
            sample_rate: frame.sample_rate,
            channels: frame.channels,
            bitrate_kbps: frame.bitrate_kbps,
        });
    }
    Err(PackError::decode("no MPEG audio frame found"))
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mp3.rs"]
mod tests;
