use std::io::Cursor;
use std::sync::Mutex;

use image::{Rgb, RgbImage};

use super::*;
use crate::audio::codec::AudioQuality;
use crate::raster::quantize::IndexedImage;

#[derive(Default)]
struct RecordingCodec {
    calls: Mutex<Vec<(AudioFormat, AudioTarget)>>,
    empty_output: bool,
}

impl RecordingCodec {
    fn calls(&self) -> Vec<(AudioFormat, AudioTarget)> {
        self.calls.lock().unwrap().clone()
    }
}

impl AudioCodec for RecordingCodec {
    fn transcode(
        &self,
        _input: &[u8],
        from: AudioFormat,
        target: &AudioTarget,
    ) -> PackResult<Vec<u8>> {
        self.calls.lock().unwrap().push((from, *target));
        if self.empty_output {
            return Ok(Vec::new());
        }
        Ok(match target.format {
            AudioFormat::Wav => b"RIFF\0\0\0\0WAVE".to_vec(),
            AudioFormat::Ogg => b"OggS\0\x02".to_vec(),
            AudioFormat::Mp3 => mp3_frames(0xc4, 2),
        })
    }
}

/// MPEG-1 layer III, 128 kbit/s, 44.1 kHz; `mode_byte` 0xc4 is mono, 0x04 stereo.
fn mp3_frames(mode_byte: u8, count: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..count {
        out.extend_from_slice(&[0xff, 0xfb, 0x90, mode_byte]);
        out.resize(out.len() + 413, 0);
    }
    out
}

fn png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn picture() -> RgbImage {
    RgbImage::from_fn(24, 10, |x, y| Rgb([(x * 10) as u8, (y * 25) as u8, 90]))
}

fn transcoder(codec: &Arc<RecordingCodec>) -> Transcoder {
    Transcoder::default().with_audio_codec(codec.clone())
}

#[test]
fn compressed_profile_turns_bmp_into_png() {
    let bmp = ImageAsset::new(ImageFormat::Bmp, encode_bmp(&picture()).unwrap());
    let out = Transcoder::default()
        .transcode_image(TargetProfile::Compressed, &bmp)
        .unwrap();
    assert_eq!(out.format, ImageFormat::Png);
    assert_eq!(decode_opaque_rgb(out.bytes()).unwrap(), picture());

    let again = Transcoder::default()
        .transcode_image(TargetProfile::Compressed, &out)
        .unwrap();
    assert!(again.shares_bytes_with(&out));
}

#[test]
fn uncompressed_profile_produces_24_bit_bmp() {
    let t = Transcoder::default();
    let png = ImageAsset::new(ImageFormat::Png, png(&picture()));
    let bmp = t.transcode_image(TargetProfile::Uncompressed, &png).unwrap();
    assert_eq!(bmp.format, ImageFormat::Bmp);
    assert!(!is_rle4_bitmap(bmp.bytes()));
    assert_eq!(decode_opaque_rgb(bmp.bytes()).unwrap(), picture());

    let same = t.transcode_image(TargetProfile::Uncompressed, &bmp).unwrap();
    assert!(same.shares_bytes_with(&bmp));
}

#[test]
fn firmware_bitmap_is_expanded_by_uncompressed_profile() {
    let t = Transcoder::default();
    let png = ImageAsset::new(ImageFormat::Png, png(&picture()));
    let rle = t.transcode_image(TargetProfile::Firmware, &png).unwrap();
    assert_eq!(rle.format, ImageFormat::Bmp);
    assert!(is_rle4_bitmap(rle.bytes()));

    let plain = t.transcode_image(TargetProfile::Uncompressed, &rle).unwrap();
    assert!(!is_rle4_bitmap(plain.bytes()));
    assert_eq!(decode_opaque_rgb(plain.bytes()).unwrap().dimensions(), (24, 10));
}

#[test]
fn firmware_profile_keeps_rle4_bitmaps() {
    let t = Transcoder::default();
    let jpeg = {
        let mut buf = Vec::new();
        picture()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        ImageAsset::new(ImageFormat::Jpeg, buf)
    };
    let once = t.transcode_image(TargetProfile::Firmware, &jpeg).unwrap();
    let twice = t.transcode_image(TargetProfile::Firmware, &once).unwrap();
    assert!(twice.shares_bytes_with(&once));
}

struct FixedQuantizer {
    seen: Mutex<Vec<(usize, bool)>>,
}

impl Quantizer for FixedQuantizer {
    fn quantize(
        &self,
        image: &RgbImage,
        max_colors: usize,
        dither: bool,
    ) -> PackResult<IndexedImage> {
        self.seen.lock().unwrap().push((max_colors, dither));
        let palette = crate::raster::quantize::Palette16::from_colors([Rgb([0, 0, 0])]);
        let len = (image.width() * image.height()) as usize;
        IndexedImage::new(image.width(), image.height(), palette, vec![0; len])
    }
}

#[test]
fn firmware_images_use_configured_quantizer_settings() {
    let quantizer = Arc::new(FixedQuantizer {
        seen: Mutex::new(Vec::new()),
    });
    let t = Transcoder::new(TranscodeOptions {
        max_palette_colors: 8,
        dither: false,
        ..Default::default()
    })
    .with_quantizer(quantizer.clone());

    let png = ImageAsset::new(ImageFormat::Png, png(&picture()));
    t.transcode_image(TargetProfile::Firmware, &png).unwrap();
    assert_eq!(*quantizer.seen.lock().unwrap(), vec![(8, false)]);
}

#[test]
fn undecodable_image_is_a_decode_error() {
    let bogus = ImageAsset::new(ImageFormat::Png, b"not a png".to_vec());
    let err = Transcoder::default()
        .transcode_image(TargetProfile::Firmware, &bogus)
        .unwrap_err();
    assert!(matches!(err, PackError::Decode(_)));
}

#[test]
fn compressed_profile_encodes_wav_with_options() {
    let codec = Arc::new(RecordingCodec::default());
    let wav = AudioAsset::new(AudioFormat::Wav, b"RIFF....WAVE".to_vec());
    let out = transcoder(&codec)
        .transcode_audio(TargetProfile::Compressed, &wav)
        .unwrap();

    assert_eq!(out.format, AudioFormat::Ogg);
    let calls = codec.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, AudioFormat::Wav);
    assert_eq!(calls[0].1.quality, AudioQuality::Vorbis(4));
}

#[test]
fn lossless_compressed_target_is_unsupported() {
    let codec = Arc::new(RecordingCodec::default());
    let t = Transcoder::new(TranscodeOptions {
        compressed_audio: AudioFormat::Wav,
        ..Default::default()
    })
    .with_audio_codec(codec.clone());

    let wav = AudioAsset::new(AudioFormat::Wav, b"RIFF".to_vec());
    let err = t.transcode_audio(TargetProfile::Compressed, &wav).unwrap_err();
    assert!(matches!(
        err,
        PackError::UnsupportedTransition {
            kind: AssetKind::Audio,
            ..
        }
    ));
    assert!(codec.calls().is_empty());
}

#[test]
fn uncompressed_profile_decodes_lossy_audio_to_wav() {
    let codec = Arc::new(RecordingCodec::default());
    let t = transcoder(&codec);
    let ogg = AudioAsset::new(AudioFormat::Ogg, b"OggS".to_vec());
    let wav = t.transcode_audio(TargetProfile::Uncompressed, &ogg).unwrap();
    assert_eq!(wav.format, AudioFormat::Wav);

    let same = t.transcode_audio(TargetProfile::Uncompressed, &wav).unwrap();
    assert!(same.shares_bytes_with(&wav));
    assert_eq!(codec.calls().len(), 1);
}

#[test]
fn firmware_mp3_is_stripped_without_reencoding() {
    let codec = Arc::new(RecordingCodec::default());
    let mut tagged = b"ID3\x04\x00\x00\x00\x00\x00\x05hello".to_vec();
    tagged.extend_from_slice(&mp3_frames(0xc4, 3));

    let asset = AudioAsset::new(AudioFormat::Mp3, tagged);
    let out = transcoder(&codec)
        .transcode_audio(TargetProfile::Firmware, &asset)
        .unwrap();

    assert_eq!(out.bytes(), &mp3_frames(0xc4, 3)[..]);
    assert!(codec.calls().is_empty());

    let again = transcoder(&codec)
        .transcode_audio(TargetProfile::Firmware, &out)
        .unwrap();
    assert!(again.shares_bytes_with(&out));
}

#[test]
fn firmware_stereo_mp3_is_reencoded() {
    let codec = Arc::new(RecordingCodec::default());
    let asset = AudioAsset::new(AudioFormat::Mp3, mp3_frames(0x04, 3));
    let out = transcoder(&codec)
        .transcode_audio(TargetProfile::Firmware, &asset)
        .unwrap();

    assert_eq!(out.format, AudioFormat::Mp3);
    let calls = codec.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.channels, Some(1));
    assert_eq!(calls[0].1.sample_rate, Some(44_100));
}

#[test]
fn firmware_wav_becomes_mp3() {
    let codec = Arc::new(RecordingCodec::default());
    let wav = AudioAsset::new(AudioFormat::Wav, b"RIFF".to_vec());
    let out = transcoder(&codec)
        .transcode_audio(TargetProfile::Firmware, &wav)
        .unwrap();
    assert_eq!(out.format, AudioFormat::Mp3);
    assert_eq!(codec.calls()[0].1.format, AudioFormat::Mp3);
}

#[test]
fn empty_codec_output_is_an_encode_error() {
    let codec = Arc::new(RecordingCodec {
        empty_output: true,
        ..Default::default()
    });
    let wav = AudioAsset::new(AudioFormat::Wav, b"RIFF".to_vec());
    let err = transcoder(&codec)
        .transcode_audio(TargetProfile::Firmware, &wav)
        .unwrap_err();
    assert!(matches!(err, PackError::Encode(_)));
}
