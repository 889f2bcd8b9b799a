use std::{fmt, sync::Arc};

use tracing::debug;

use crate::audio::{
    codec::{AudioCodec, AudioTarget, FfmpegAudioCodec},
    id3::strip_id3_tags,
    mp3::probe_mp3,
};
use crate::foundation::error::{PackError, PackResult};
use crate::model::pack::{AssetKind, AudioAsset, AudioFormat, ImageAsset, ImageFormat};
use crate::raster::{
    convert::{decode_opaque_rgb, encode_bmp, encode_png, is_rle4_bitmap},
    quantize::{NeuQuantizer, Quantizer},
    rle4::Rle4Writer,
    rle4_fix::fix_rle4_padding,
};
use crate::transcode::{options::TranscodeOptions, profile::TargetProfile};

/// Per-asset conversion rules for each [`TargetProfile`].
///
/// Both entry points are pure with respect to the pack: they read one asset and return one asset.
/// When no rule applies the input is returned with its bytes shared.
#[derive(Clone)]
pub struct Transcoder {
    options: TranscodeOptions,
    audio: Arc<dyn AudioCodec>,
    quantizer: Arc<dyn Quantizer>,
    rle4: Rle4Writer,
}

impl fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder")
            .field("options", &self.options)
            .field("rle4", &self.rle4)
            .finish_non_exhaustive()
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(TranscodeOptions::default())
    }
}

impl Transcoder {
    /// Transcoder with the ffmpeg audio codec and the NeuQuant quantizer.
    pub fn new(options: TranscodeOptions) -> Self {
        Self {
            options,
            audio: Arc::new(FfmpegAudioCodec::default()),
            quantizer: Arc::new(NeuQuantizer::default()),
            rle4: Rle4Writer::default(),
        }
    }

    /// Replace the audio codec.
    pub fn with_audio_codec(mut self, codec: Arc<dyn AudioCodec>) -> Self {
        self.audio = codec;
        self
    }

    /// Replace the quantizer.
    pub fn with_quantizer(mut self, quantizer: Arc<dyn Quantizer>) -> Self {
        self.quantizer = quantizer;
        self
    }

    /// Replace the 4-bit bitmap writer.
    pub fn with_rle4_writer(mut self, writer: Rle4Writer) -> Self {
        self.rle4 = writer;
        self
    }

    /// Options in effect.
    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// Apply the image rule of `profile` to `asset`.
    pub fn transcode_image(
        &self,
        profile: TargetProfile,
        asset: &ImageAsset,
    ) -> PackResult<ImageAsset> {
        let bytes = asset.bytes();
        match (profile, asset.format) {
            (TargetProfile::Compressed, ImageFormat::Bmp) => {
                debug!("compressing BMP image asset into PNG");
                let png = non_empty(encode_png(&decode_opaque_rgb(bytes)?)?, "PNG")?;
                Ok(ImageAsset::new(ImageFormat::Png, png))
            }
            (TargetProfile::Compressed, ImageFormat::Png | ImageFormat::Jpeg) => Ok(asset.clone()),

            (TargetProfile::Uncompressed, ImageFormat::Png | ImageFormat::Jpeg) => {
                debug!(from = %asset.format, "uncompressing image asset into BMP");
                self.to_plain_bmp(bytes)
            }
            (TargetProfile::Uncompressed, ImageFormat::Bmp) if is_rle4_bitmap(bytes) => {
                debug!("expanding 4-bit RLE BMP image asset into 24-bit BMP");
                self.to_plain_bmp(bytes)
            }
            (TargetProfile::Uncompressed, ImageFormat::Bmp) => Ok(asset.clone()),

            (TargetProfile::Firmware, ImageFormat::Bmp) if is_rle4_bitmap(bytes) => {
                Ok(asset.clone())
            }
            (TargetProfile::Firmware, _) => {
                debug!(from = %asset.format, "converting image asset into 4-bit RLE BMP");
                self.to_firmware_bitmap(bytes)
            }
        }
    }

    /// Apply the audio rule of `profile` to `asset`.
    pub fn transcode_audio(
        &self,
        profile: TargetProfile,
        asset: &AudioAsset,
    ) -> PackResult<AudioAsset> {
        match (profile, asset.format) {
            (TargetProfile::Compressed, AudioFormat::Wav) => {
                let target = self.options.compressed_audio_target();
                if !target.format.is_lossy() {
                    return Err(PackError::unsupported_transition(
                        AssetKind::Audio,
                        asset.format,
                        target.format,
                        profile,
                    ));
                }
                debug!(to = %target.format, "compressing WAV audio asset");
                self.encode_audio(asset, asset.bytes(), &target)
            }
            (TargetProfile::Compressed, AudioFormat::Ogg | AudioFormat::Mp3) => Ok(asset.clone()),

            (TargetProfile::Uncompressed, AudioFormat::Ogg | AudioFormat::Mp3) => {
                debug!(from = %asset.format, "uncompressing audio asset into WAV");
                self.encode_audio(
                    asset,
                    asset.bytes(),
                    &self.options.uncompressed_audio_target(),
                )
            }
            (TargetProfile::Uncompressed, AudioFormat::Wav) => Ok(asset.clone()),

            (TargetProfile::Firmware, AudioFormat::Wav | AudioFormat::Ogg) => {
                debug!(from = %asset.format, "converting audio asset into MP3");
                self.encode_audio(
                    asset,
                    asset.bytes(),
                    &self.options.firmware_audio_target(),
                )
            }
            (TargetProfile::Firmware, AudioFormat::Mp3) => self.normalize_mp3(asset),
        }
    }

    fn to_plain_bmp(&self, bytes: &[u8]) -> PackResult<ImageAsset> {
        let bmp = non_empty(encode_bmp(&decode_opaque_rgb(bytes)?)?, "BMP")?;
        Ok(ImageAsset::new(ImageFormat::Bmp, bmp))
    }

    fn to_firmware_bitmap(&self, bytes: &[u8]) -> PackResult<ImageAsset> {
        let rgb = decode_opaque_rgb(bytes)?;
        let indexed =
            self.quantizer
                .quantize(&rgb, self.options.max_palette_colors, self.options.dither)?;
        let encoded = non_empty(self.rle4.encode(&indexed)?, "RLE4 BMP")?;
        let fixed = fix_rle4_padding(&encoded)?;
        Ok(ImageAsset::new(ImageFormat::Bmp, fixed))
    }

    /// Strip tags and keep the stream when it already has the firmware layout.
    fn normalize_mp3(&self, asset: &AudioAsset) -> PackResult<AudioAsset> {
        let target = self.options.firmware_audio_target();
        let stripped = strip_id3_tags(asset.bytes())?;
        let info = probe_mp3(stripped)?;

        if Some(info.channels) != target.channels || Some(info.sample_rate) != target.sample_rate {
            debug!(
                channels = info.channels,
                sample_rate = info.sample_rate,
                "re-encoding MP3 audio asset to firmware layout"
            );
            return self.encode_audio(asset, stripped, &target);
        }
        if stripped.len() == asset.bytes().len() {
            return Ok(asset.clone());
        }
        debug!(
            removed = asset.bytes().len() - stripped.len(),
            "stripped tags from MP3 audio asset"
        );
        Ok(AudioAsset::new(AudioFormat::Mp3, stripped))
    }

    fn encode_audio(
        &self,
        asset: &AudioAsset,
        input: &[u8],
        target: &AudioTarget,
    ) -> PackResult<AudioAsset> {
        let out = self.audio.transcode(input, asset.format, target)?;
        let out = non_empty(out, target.format.mime())?;
        Ok(AudioAsset::new(target.format, out))
    }
}

fn non_empty(bytes: Vec<u8>, what: &str) -> PackResult<Vec<u8>> {
    if bytes.is_empty() {
        return Err(PackError::encode(format!("{what} encoder produced no bytes")));
    }
    Ok(bytes)
}

#[cfg(test)]
#[path = "../../tests/unit/transcode/policy.rs"]
mod tests;
