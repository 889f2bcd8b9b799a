use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::foundation::error::{PackError, PackResult};
use crate::model::pack::AudioFormat;

/// Encoder quality knob for lossy targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AudioQuality {
    /// Let the encoder pick.
    #[default]
    CodecDefault,
    /// Vorbis VBR quality, 0..=10.
    Vorbis(u8),
    /// Constant bitrate in kbit/s.
    BitrateKbps(u32),
}

/// What an [`AudioCodec`] should produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioTarget {
    /// Output container/codec.
    pub format: AudioFormat,
    /// Output channel count; `None` keeps the source layout.
    pub channels: Option<u16>,
    /// Output sample rate in Hz; `None` keeps the source rate.
    pub sample_rate: Option<u32>,
    /// Encoder quality.
    pub quality: AudioQuality,
}

impl AudioTarget {
    /// Target with the source layout and default quality.
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            channels: None,
            sample_rate: None,
            quality: AudioQuality::CodecDefault,
        }
    }
}

/// Audio decode/encode collaborator.
///
/// Implementations must be deterministic enough for caching: the pipeline calls `transcode` at
/// most once per distinct input and reuses the result.
pub trait AudioCodec: Send + Sync {
    /// Convert `input` (encoded as `from`) to `target`.
    fn transcode(&self, input: &[u8], from: AudioFormat, target: &AudioTarget)
    -> PackResult<Vec<u8>>;
}

/// [`AudioCodec`] backed by the system `ffmpeg` binary (feature `media-ffmpeg`).
#[derive(Clone, Debug)]
pub struct FfmpegAudioCodec {
    program: PathBuf,
}

impl Default for FfmpegAudioCodec {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegAudioCodec {
    /// Use a specific `ffmpeg` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

/// Whether an `ffmpeg` binary can be run from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn extension(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::Wav => "wav",
        AudioFormat::Ogg => "ogg",
        AudioFormat::Mp3 => "mp3",
    }
}

/// Command line converting `input` into `output` for `target`.
#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
pub(crate) fn ffmpeg_args(input: &Path, output: &Path, target: &AudioTarget) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(["-vn", "-map_metadata", "-1"].map(OsString::from));

    let codec = match target.format {
        AudioFormat::Wav => "pcm_s16le",
        AudioFormat::Ogg => "libvorbis",
        AudioFormat::Mp3 => "libmp3lame",
    };
    args.extend(["-c:a", codec].map(OsString::from));

    match (target.format, target.quality) {
        (AudioFormat::Ogg, AudioQuality::Vorbis(q)) => {
            args.extend([OsString::from("-q:a"), OsString::from(q.min(10).to_string())]);
        }
        (AudioFormat::Ogg | AudioFormat::Mp3, AudioQuality::BitrateKbps(kbps)) => {
            args.extend([OsString::from("-b:a"), OsString::from(format!("{kbps}k"))]);
        }
        _ => {}
    }
    if target.format == AudioFormat::Mp3 {
        args.extend(["-id3v2_version", "0", "-write_id3v1", "0"].map(OsString::from));
    }
    if let Some(channels) = target.channels {
        args.extend([OsString::from("-ac"), OsString::from(channels.to_string())]);
    }
    if let Some(rate) = target.sample_rate {
        args.extend([OsString::from("-ar"), OsString::from(rate.to_string())]);
    }

    args.extend(["-f", extension(target.format)].map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

#[cfg(feature = "media-ffmpeg")]
impl AudioCodec for FfmpegAudioCodec {
    fn transcode(
        &self,
        input: &[u8],
        from: AudioFormat,
        target: &AudioTarget,
    ) -> PackResult<Vec<u8>> {
        use anyhow::Context as _;

        let in_path = TempFileGuard::new(extension(from));
        let out_path = TempFileGuard::new(extension(target.format));
        std::fs::write(&in_path.0, input)
            .with_context(|| format!("failed to write '{}'", in_path.0.display()))?;

        let out = std::process::Command::new(&self.program)
            .args(ffmpeg_args(&in_path.0, &out_path.0, target))
            .output()
            .map_err(|e| PackError::encode(format!("failed to run ffmpeg: {e}")))?;

        if !out.status.success() {
            let msg = String::from_utf8_lossy(&out.stderr);
            let msg = msg.trim();
            // ffmpeg reports undecodable input this way; anything else is on the encode side.
            if msg.contains("Invalid data") {
                return Err(PackError::decode(format!("ffmpeg could not read {from}: {msg}")));
            }
            return Err(PackError::encode(format!(
                "ffmpeg {from} -> {} failed: {msg}",
                target.format
            )));
        }

        let bytes = std::fs::read(&out_path.0)
            .with_context(|| format!("failed to read '{}'", out_path.0.display()))?;
        if bytes.is_empty() {
            return Err(PackError::encode(format!(
                "ffmpeg produced an empty {} file",
                target.format
            )));
        }
        tracing::debug!(from = %from, to = %target.format, bytes = bytes.len(), "ffmpeg transcode");
        Ok(bytes)
    }
}

#[cfg(not(feature = "media-ffmpeg"))]
impl AudioCodec for FfmpegAudioCodec {
    fn transcode(
        &self,
        _input: &[u8],
        from: AudioFormat,
        target: &AudioTarget,
    ) -> PackResult<Vec<u8>> {
        Err(PackError::encode(format!(
            "{from} -> {} audio transcoding requires the 'media-ffmpeg' feature",
            target.format
        )))
    }
}

#[cfg(feature = "media-ffmpeg")]
struct TempFileGuard(PathBuf);

#[cfg(feature = "media-ffmpeg")]
impl TempFileGuard {
    fn new(ext: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};

        static NEXT: AtomicU64 = AtomicU64::new(0);
        let seq = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(std::env::temp_dir().join(format!(
            "storypack_audio_{}_{seq}.{ext}",
            std::process::id()
        )))
    }
}

#[cfg(feature = "media-ffmpeg")]
impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/codec.rs"]
mod tests;
