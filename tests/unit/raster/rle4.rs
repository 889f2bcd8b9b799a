use image::Rgb;

use super::*;
use crate::raster::quantize::Palette16;

fn palette() -> Palette16 {
    Palette16::from_colors((0..16u8).map(|i| Rgb([i * 16, 255 - i * 16, i])))
}

fn indexed(width: u32, height: u32, indices: Vec<u8>) -> IndexedImage {
    IndexedImage::new(width, height, palette(), indices).unwrap()
}

fn body(bmp: &[u8]) -> &[u8] {
    &bmp[RLE4_HEADER_LEN..]
}

#[test]
fn pad_len_follows_each_layout() {
    let legacy: Vec<_> = (3..=8).map(|n| AbsolutePadding::PixelPairs.pad_len(n)).collect();
    let aligned: Vec<_> = (3..=8).map(|n| AbsolutePadding::WordAligned.pad_len(n)).collect();
    assert_eq!(legacy, [1, 0, 0, 1, 1, 0]);
    assert_eq!(aligned, [0, 0, 1, 1, 0, 0]);
}

#[test]
fn header_fields_are_written_little_endian() {
    let bmp = Rle4Writer::default()
        .encode(&indexed(3, 2, vec![0; 6]))
        .unwrap();

    assert_eq!(&bmp[..2], b"BM");
    assert_eq!(read_u32(&bmp, 2) as usize, bmp.len());
    assert_eq!(read_u32(&bmp, 10) as usize, RLE4_HEADER_LEN);
    assert_eq!(bmp[BMP_BPP_OFFSET], 4);
    assert_eq!(read_u32(&bmp, BMP_COMPRESSION_OFFSET), BI_RLE4);
    assert_eq!(read_u32(&bmp, 34) as usize, bmp.len() - RLE4_HEADER_LEN);
    // Palette entry 1 is stored as BGR0.
    assert_eq!(&bmp[54 + 4..54 + 8], &[1, 239, 16, 0]);

    let header = Rle4Header::parse(&bmp).unwrap();
    assert_eq!(
        header,
        Rle4Header {
            pixel_offset: RLE4_HEADER_LEN,
            width: 3,
            height: 2,
            palette_len: 16,
        }
    );
}

#[test]
fn rows_are_bottom_up_with_eol_and_eob() {
    let bmp = Rle4Writer::default()
        .encode(&indexed(3, 2, vec![1, 1, 1, 2, 2, 2]))
        .unwrap();
    assert_eq!(body(&bmp), &[3, 0x22, 0, 0, 3, 0x11, 0, 1]);
}

#[test]
fn short_stretches_use_encoded_pairs() {
    let bmp = Rle4Writer::default()
        .encode(&indexed(5, 1, vec![1, 1, 1, 1, 2]))
        .unwrap();
    assert_eq!(body(&bmp), &[4, 0x11, 1, 0x20, 0, 1]);
}

#[test]
fn absolute_runs_differ_only_in_padding() {
    let image = indexed(5, 1, vec![1, 2, 3, 4, 5]);
    let legacy = Rle4Writer::new(AbsolutePadding::PixelPairs)
        .encode(&image)
        .unwrap();
    let aligned = Rle4Writer::new(AbsolutePadding::WordAligned)
        .encode(&image)
        .unwrap();

    assert_eq!(body(&legacy), &[0, 5, 0x12, 0x34, 0x50, 0, 1]);
    assert_eq!(body(&aligned), &[0, 5, 0x12, 0x34, 0x50, 0, 0, 1]);
}

#[test]
fn long_runs_are_split_at_255() {
    let bmp = Rle4Writer::default()
        .encode(&indexed(300, 1, vec![7; 300]))
        .unwrap();
    assert_eq!(body(&bmp), &[255, 0x77, 45, 0x77, 0, 1]);
}

#[test]
fn word_aligned_output_decodes_to_palette_colors() {
    let (w, h) = (11u32, 4u32);
    let indices: Vec<u8> = (0..w * h)
        .map(|i| match i % 7 {
            0..=2 => 3,
            n => (n * 2 + i / 7) as u8 % 16,
        })
        .collect();
    let image = indexed(w, h, indices.clone());
    let bmp = Rle4Writer::new(AbsolutePadding::WordAligned)
        .encode(&image)
        .unwrap();

    let decoded = image::load_from_memory(&bmp).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (w, h));
    for (px, &idx) in decoded.pixels().zip(&indices) {
        assert_eq!(*px, image.palette().colors()[usize::from(idx)]);
    }
}

#[test]
fn parse_rejects_bad_headers() {
    let good = Rle4Writer::default()
        .encode(&indexed(2, 2, vec![0; 4]))
        .unwrap();

    let mut bad_sig = good.clone();
    bad_sig[0] = b'X';
    let mut eight_bpp = good.clone();
    eight_bpp[BMP_BPP_OFFSET] = 8;
    let mut top_down = good.clone();
    top_down[22..26].copy_from_slice(&(-2i32).to_le_bytes());
    let mut far_offset = good.clone();
    far_offset[10..14].copy_from_slice(&10_000u32.to_le_bytes());
    let mut big_palette = good.clone();
    big_palette[46..50].copy_from_slice(&17u32.to_le_bytes());

    for bytes in [
        &bad_sig[..],
        &eight_bpp[..],
        &top_down[..],
        &far_offset[..],
        &big_palette[..],
        &good[..20],
    ] {
        let err = Rle4Header::parse(bytes).unwrap_err();
        assert!(matches!(err, PackError::MalformedRle(_)), "{err}");
    }
}

#[test]
fn parse_accepts_non_standard_offset() {
    let mut bmp = Rle4Writer::default()
        .encode(&indexed(2, 1, vec![0, 1]))
        .unwrap();
    // Two-entry palette: the pixel data may start right after it.
    bmp[46..50].copy_from_slice(&2u32.to_le_bytes());
    bmp[10..14].copy_from_slice(&100u32.to_le_bytes());

    let header = Rle4Header::parse(&bmp).unwrap();
    assert_eq!(header.pixel_offset, 100);
    assert_eq!(header.palette_len, 2);
}

#[test]
fn odd_runs_are_split_when_aligned_stream_reads_as_legacy() {
    // Word aligned this row is `0,5,..,0, 0,3,..,3,32, 0,1`, which a legacy reader also
    // accepts as a complete 11 pixel row.
    let image = indexed(11, 1, vec![0, 1, 2, 1, 3, 2, 2, 2, 0, 3, 2]);
    let expected: [u8; 14] = [0, 4, 0x01, 0x21, 1, 0x30, 3, 0x22, 2, 0x03, 1, 0x20, 0, 1];

    for padding in [AbsolutePadding::PixelPairs, AbsolutePadding::WordAligned] {
        let bmp = Rle4Writer::new(padding).encode(&image).unwrap();
        assert_eq!(body(&bmp), &expected, "{padding:?}");
    }
}
