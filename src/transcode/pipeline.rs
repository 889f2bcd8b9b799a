use std::collections::HashSet;

use rayon::prelude::*;
use tracing::info;

use crate::assets::cache::AssetCache;
use crate::foundation::{
    digest::ContentDigest,
    error::{PackError, PackResult},
};
use crate::model::pack::{
    AssetKind, AudioAsset, AudioFormat, ImageAsset, ImageFormat, StageNode, StoryPack,
};
use crate::transcode::{policy::Transcoder, profile::TargetProfile};

/// Whether any image is not BMP or any audio is not WAV.
pub fn has_non_canonical_assets(pack: &StoryPack) -> bool {
    pack.nodes.iter().any(|node| {
        node.image
            .as_ref()
            .is_some_and(|a| a.format != ImageFormat::Bmp)
            || node
                .audio
                .as_ref()
                .is_some_and(|a| a.format != AudioFormat::Wav)
    })
}

/// Convert a pack to PNG images and lossy audio with default settings.
pub fn to_compressed(pack: &StoryPack) -> PackResult<StoryPack> {
    transcode_pack(pack, TargetProfile::Compressed, &Transcoder::default())
}

/// Convert a pack to 24-bit BMP images and WAV audio with default settings.
pub fn to_uncompressed(pack: &StoryPack) -> PackResult<StoryPack> {
    transcode_pack(pack, TargetProfile::Uncompressed, &Transcoder::default())
}

/// Convert a pack to the device firmware layout (4-bit RLE BMP, mono MP3) with default settings.
pub fn to_firmware_profile(pack: &StoryPack) -> PackResult<StoryPack> {
    transcode_pack(pack, TargetProfile::Firmware, &Transcoder::default())
}

/// Transcode every asset of `pack` for `profile`, sequentially.
pub fn transcode_pack(
    pack: &StoryPack,
    profile: TargetProfile,
    transcoder: &Transcoder,
) -> PackResult<StoryPack> {
    transcode_pack_with_stats(pack, profile, transcoder, &PipelineThreading::default())
        .map(|(pack, _)| pack)
}

/// Worker settings of a pack transform.
#[derive(Clone, Debug, Default)]
pub struct PipelineThreading {
    /// Transcode distinct assets on a worker pool.
    pub parallel: bool,
    /// Worker count; `None` lets rayon decide. `Some(0)` is rejected.
    pub threads: Option<usize>,
}

/// Counters of one pack transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    /// Assets in the pack.
    pub assets_total: u64,
    /// Distinct inputs the policy ran on.
    pub assets_transcoded: u64,
    /// Assets answered from the dedup cache.
    pub cache_hits: u64,
}

/// Transcode every asset of `pack` for `profile` and report counters.
///
/// Each distinct input (per asset kind) is transcoded once and the result is reused for every
/// node carrying the same bytes. The input pack is left untouched; untouched assets share their
/// bytes with it. Any asset failure aborts the whole transform.
#[tracing::instrument(skip_all, fields(profile = %profile, nodes = pack.nodes.len()))]
pub fn transcode_pack_with_stats(
    pack: &StoryPack,
    profile: TargetProfile,
    transcoder: &Transcoder,
    threading: &PipelineThreading,
) -> PackResult<(StoryPack, TranscodeStats)> {
    transcoder.options().validate()?;
    if threading.threads == Some(0) {
        return Err(PackError::validation(
            "pipeline threading 'threads' must be >= 1 when set",
        ));
    }

    let digests = pack
        .nodes
        .iter()
        .map(|node| NodeDigests {
            image: node.image.as_ref().map(|a| ContentDigest::of(a.bytes())),
            audio: node.audio.as_ref().map(|a| ContentDigest::of(a.bytes())),
        })
        .collect::<Vec<_>>();

    let mut images = AssetCache::<ImageAsset>::new();
    let mut audio = AssetCache::<AudioAsset>::new();

    if threading.parallel {
        let pool = build_thread_pool(threading.threads)?;
        prefill_parallel(pack, &digests, profile, transcoder, &pool, &mut images, &mut audio)?;
    }

    let mut nodes = Vec::with_capacity(pack.nodes.len());
    for (idx, (node, digest)) in pack.nodes.iter().zip(&digests).enumerate() {
        let image = match (&node.image, digest.image) {
            (Some(asset), Some(d)) => Some(
                images
                    .get_or_compute_digest(d, asset.bytes(), |_| {
                        transcoder.transcode_image(profile, asset)
                    })
                    .map_err(|e| e.in_asset(idx, AssetKind::Image))?,
            ),
            _ => None,
        };
        let sound = match (&node.audio, digest.audio) {
            (Some(asset), Some(d)) => Some(
                audio
                    .get_or_compute_digest(d, asset.bytes(), |_| {
                        transcoder.transcode_audio(profile, asset)
                    })
                    .map_err(|e| e.in_asset(idx, AssetKind::Audio))?,
            ),
            _ => None,
        };
        nodes.push(StageNode {
            uuid: node.uuid.clone(),
            image,
            audio: sound,
        });
    }

    let total = pack.asset_count() as u64;
    let transcoded = (images.len() + audio.len()) as u64;
    let stats = TranscodeStats {
        assets_total: total,
        assets_transcoded: transcoded,
        cache_hits: total.saturating_sub(transcoded),
    };
    info!(
        assets_total = stats.assets_total,
        assets_transcoded = stats.assets_transcoded,
        cache_hits = stats.cache_hits,
        "pack transcoded"
    );

    Ok((
        StoryPack {
            uuid: pack.uuid.clone(),
            title: pack.title.clone(),
            nodes,
        },
        stats,
    ))
}

#[derive(Clone, Copy)]
struct NodeDigests {
    image: Option<ContentDigest>,
    audio: Option<ContentDigest>,
}

enum Job<'a> {
    Image(usize, ContentDigest, &'a ImageAsset),
    Audio(usize, ContentDigest, &'a AudioAsset),
}

enum Done {
    Image(ContentDigest, ImageAsset),
    Audio(ContentDigest, AudioAsset),
}

/// Transcode the first occurrence of every distinct input on `pool` and seed the caches.
///
/// Jobs keep traversal order, so the error reported is the one the sequential path would hit.
fn prefill_parallel(
    pack: &StoryPack,
    digests: &[NodeDigests],
    profile: TargetProfile,
    transcoder: &Transcoder,
    pool: &rayon::ThreadPool,
    images: &mut AssetCache<ImageAsset>,
    audio: &mut AssetCache<AudioAsset>,
) -> PackResult<()> {
    let mut seen_images = HashSet::new();
    let mut seen_audio = HashSet::new();
    let mut jobs = Vec::new();
    for (idx, (node, digest)) in pack.nodes.iter().zip(digests).enumerate() {
        if let (Some(asset), Some(d)) = (&node.image, digest.image)
            && seen_images.insert(d)
        {
            jobs.push(Job::Image(idx, d, asset));
        }
        if let (Some(asset), Some(d)) = (&node.audio, digest.audio)
            && seen_audio.insert(d)
        {
            jobs.push(Job::Audio(idx, d, asset));
        }
    }
    tracing::debug!(unique = jobs.len(), "transcoding distinct assets in parallel");

    let results = pool.install(|| {
        jobs.par_iter()
            .map(|job| match *job {
                Job::Image(idx, d, asset) => transcoder
                    .transcode_image(profile, asset)
                    .map(|out| Done::Image(d, out))
                    .map_err(|e| e.in_asset(idx, AssetKind::Image)),
                Job::Audio(idx, d, asset) => transcoder
                    .transcode_audio(profile, asset)
                    .map(|out| Done::Audio(d, out))
                    .map_err(|e| e.in_asset(idx, AssetKind::Audio)),
            })
            .collect::<Vec<_>>()
    });

    for result in results {
        match result? {
            Done::Image(d, out) => {
                images.insert_first(d, out);
            }
            Done::Audio(d, out) => {
                audio.insert_first(d, out);
            }
        }
    }
    Ok(())
}

fn build_thread_pool(threads: Option<usize>) -> PackResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PackError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/transcode/pipeline.rs"]
mod tests;
