use crate::audio::codec::{AudioQuality, AudioTarget};
use crate::foundation::error::{PackError, PackResult};
use crate::model::pack::AudioFormat;
use crate::raster::quantize::PALETTE_LEN;

/// Knobs of the transcode policy.
///
/// Every field has a default, so a partial JSON object is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscodeOptions {
    /// Lossy format WAV audio becomes under the compressed profile.
    pub compressed_audio: AudioFormat,
    /// Vorbis quality for OGG output (0..=10).
    pub ogg_quality: u8,
    /// Bitrate for MP3 output (32..=320 kbit/s).
    pub mp3_bitrate_kbps: u32,
    /// Channel count required by the firmware profile.
    pub firmware_channels: u16,
    /// Sample rate required by the firmware profile.
    pub firmware_sample_rate: u32,
    /// Palette size for firmware images (2..=16).
    pub max_palette_colors: usize,
    /// Apply error diffusion when quantizing firmware images.
    pub dither: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            compressed_audio: AudioFormat::Ogg,
            ogg_quality: 4,
            mp3_bitrate_kbps: 128,
            firmware_channels: 1,
            firmware_sample_rate: 44_100,
            max_palette_colors: PALETTE_LEN,
            dither: true,
        }
    }
}

impl TranscodeOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> PackResult<Self> {
        use anyhow::Context as _;

        let opts: Self = serde_json::from_str(s).context("parse transcode options JSON")?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check value ranges.
    pub fn validate(&self) -> PackResult<()> {
        if self.ogg_quality > 10 {
            return Err(PackError::validation(format!(
                "ogg_quality must be in 0..=10, got {}",
                self.ogg_quality
            )));
        }
        if !(32..=320).contains(&self.mp3_bitrate_kbps) {
            return Err(PackError::validation(format!(
                "mp3_bitrate_kbps must be in 32..=320, got {}",
                self.mp3_bitrate_kbps
            )));
        }
        if !(1..=2).contains(&self.firmware_channels) {
            return Err(PackError::validation(format!(
                "firmware_channels must be 1 or 2, got {}",
                self.firmware_channels
            )));
        }
        if !(8_000..=48_000).contains(&self.firmware_sample_rate) {
            return Err(PackError::validation(format!(
                "firmware_sample_rate must be in 8000..=48000, got {}",
                self.firmware_sample_rate
            )));
        }
        if !(2..=PALETTE_LEN).contains(&self.max_palette_colors) {
            return Err(PackError::validation(format!(
                "max_palette_colors must be in 2..={PALETTE_LEN}, got {}",
                self.max_palette_colors
            )));
        }
        Ok(())
    }

    /// Codec target for WAV audio under the compressed profile.
    pub fn compressed_audio_target(&self) -> AudioTarget {
        AudioTarget {
            quality: self.lossy_quality(self.compressed_audio),
            ..AudioTarget::new(self.compressed_audio)
        }
    }

    /// Codec target for the uncompressed profile.
    pub fn uncompressed_audio_target(&self) -> AudioTarget {
        AudioTarget::new(AudioFormat::Wav)
    }

    /// Codec target for the firmware profile.
    pub fn firmware_audio_target(&self) -> AudioTarget {
        AudioTarget {
            format: AudioFormat::Mp3,
            channels: Some(self.firmware_channels),
            sample_rate: Some(self.firmware_sample_rate),
            quality: self.lossy_quality(AudioFormat::Mp3),
        }
    }

    fn lossy_quality(&self, format: AudioFormat) -> AudioQuality {
        match format {
            AudioFormat::Ogg => AudioQuality::Vorbis(self.ogg_quality),
            AudioFormat::Mp3 => AudioQuality::BitrateKbps(self.mp3_bitrate_kbps),
            AudioFormat::Wav => AudioQuality::CodecDefault,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transcode/options.rs"]
mod tests;
