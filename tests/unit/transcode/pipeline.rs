use std::io::Cursor;

use super::*;
use crate::transcode::options::TranscodeOptions;

fn png_asset(shade: u8) -> ImageAsset {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([shade, shade, shade]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    ImageAsset::new(ImageFormat::Png, buf)
}

fn canonical_pack() -> StoryPack {
    StoryPack::new(
        "pack",
        "Canonical",
        vec![
            StageNode::new("a")
                .with_image(ImageAsset::new(ImageFormat::Bmp, b"BM".to_vec()))
                .with_audio(AudioAsset::new(AudioFormat::Wav, b"RIFF".to_vec())),
            StageNode::new("b"),
        ],
    )
}

#[test]
fn canonical_pack_has_no_foreign_assets() {
    assert!(!has_non_canonical_assets(&canonical_pack()));
    assert!(!has_non_canonical_assets(&StoryPack::default()));
}

#[test]
fn any_single_foreign_asset_is_detected() {
    let mut with_png = canonical_pack();
    with_png.nodes[1].image = Some(png_asset(1));
    assert!(has_non_canonical_assets(&with_png));

    let mut with_ogg = canonical_pack();
    with_ogg.nodes[0].audio = Some(AudioAsset::new(AudioFormat::Ogg, b"OggS".to_vec()));
    assert!(has_non_canonical_assets(&with_ogg));
}

#[test]
fn zero_threads_is_rejected() {
    let err = transcode_pack_with_stats(
        &canonical_pack(),
        TargetProfile::Uncompressed,
        &Transcoder::default(),
        &PipelineThreading {
            parallel: true,
            threads: Some(0),
        },
    )
    .unwrap_err();
    assert!(matches!(err, PackError::Validation(_)));
}

#[test]
fn invalid_options_are_rejected_before_any_work() {
    let transcoder = Transcoder::new(TranscodeOptions {
        max_palette_colors: 40,
        ..Default::default()
    });
    let err = transcode_pack(&canonical_pack(), TargetProfile::Firmware, &transcoder).unwrap_err();
    assert!(matches!(err, PackError::Validation(_)));
}

#[test]
fn untouched_assets_share_bytes_and_are_counted() {
    let shared = png_asset(7);
    let pack = StoryPack::new(
        "pack",
        "Pictures",
        vec![
            StageNode::new("a").with_image(shared.clone()),
            StageNode::new("b").with_image(shared.clone()),
            StageNode::new("c").with_image(png_asset(9)),
        ],
    );

    let (out, stats) = transcode_pack_with_stats(
        &pack,
        TargetProfile::Compressed,
        &Transcoder::default(),
        &PipelineThreading::default(),
    )
    .unwrap();

    assert_eq!(out, pack);
    let first = out.nodes[0].image.as_ref().unwrap();
    assert!(first.shares_bytes_with(&shared));
    assert_eq!(
        stats,
        TranscodeStats {
            assets_total: 3,
            assets_transcoded: 2,
            cache_hits: 1,
        }
    );
}

#[test]
fn failures_name_the_node() {
    let pack = StoryPack::new(
        "pack",
        "Broken",
        vec![
            StageNode::new("ok").with_image(png_asset(3)),
            StageNode::new("bad").with_image(ImageAsset::new(ImageFormat::Bmp, b"BMxx".to_vec())),
        ],
    );
    let err = transcode_pack(&pack, TargetProfile::Compressed, &Transcoder::default()).unwrap_err();
    match &err {
        PackError::Asset { node, kind, .. } => {
            assert_eq!((*node, *kind), (1, AssetKind::Image));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(matches!(err.root_cause(), PackError::Decode(_)));
}
