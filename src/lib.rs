//! Asset transcoding for story packs.
//!
//! A story pack is an ordered list of stage nodes, each carrying an optional picture and an
//! optional sound. This crate converts every asset of a pack to one of three profiles:
//!
//! - [`TargetProfile::Compressed`]: PNG pictures, Ogg Vorbis (or MP3) sound
//! - [`TargetProfile::Uncompressed`]: 24-bit BMP pictures, PCM WAV sound
//! - [`TargetProfile::Firmware`]: 16-color RLE4 BMP pictures, mono 44.1 kHz MP3 sound
//!
//! Identical inputs are transcoded once per run through a content-digest cache, and every
//! transform returns a new [`StoryPack`].
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod audio;
mod foundation;
mod model;
mod raster;
mod transcode;

pub use crate::assets::cache::{AssetCache, CacheStats};
pub use crate::audio::codec::{
    AudioCodec, AudioQuality, AudioTarget, FfmpegAudioCodec, is_ffmpeg_on_path,
};
pub use crate::audio::id3::{strip_id3_tags, strip_id3v1, strip_id3v2};
pub use crate::audio::mp3::{Mp3StreamInfo, MpegVersion, probe_mp3};
pub use crate::foundation::digest::ContentDigest;
pub use crate::foundation::error::{PackError, PackResult};
pub use crate::model::pack::{
    AssetKind, AudioAsset, AudioFormat, ImageAsset, ImageFormat, MediaAsset, StageNode, StoryPack,
};
pub use crate::raster::convert::{decode_opaque_rgb, encode_bmp, encode_png, is_rle4_bitmap};
pub use crate::raster::quantize::{IndexedImage, NeuQuantizer, PALETTE_LEN, Palette16, Quantizer};
pub use crate::raster::rle4::{AbsolutePadding, RLE4_HEADER_LEN, Rle4Header, Rle4Writer};
pub use crate::raster::rle4_fix::fix_rle4_padding;
pub use crate::transcode::options::TranscodeOptions;
pub use crate::transcode::pipeline::{
    PipelineThreading, TranscodeStats, has_non_canonical_assets, to_compressed,
    to_firmware_profile, to_uncompressed, transcode_pack, transcode_pack_with_stats,
};
pub use crate::transcode::policy::Transcoder;
pub use crate::transcode::profile::TargetProfile;
