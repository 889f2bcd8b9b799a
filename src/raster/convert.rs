use std::io::Cursor;

use image::{Rgb, RgbImage, RgbaImage};

use crate::foundation::error::{PackError, PackResult};

/// Byte offset of the bits-per-pixel field in a BMP file.
pub(crate) const BMP_BPP_OFFSET: usize = 28;
/// Byte offset of the compression-method field in a BMP file.
pub(crate) const BMP_COMPRESSION_OFFSET: usize = 30;
/// `biCompression` value for 4-bit run-length encoding.
pub(crate) const BI_RLE4: u32 = 2;

/// Whether `bytes` is a BMP whose header declares 4 bits per pixel and RLE4 compression.
///
/// Only the two header bytes are inspected; the rest of the file is not validated.
pub fn is_rle4_bitmap(bytes: &[u8]) -> bool {
    bytes.len() > BMP_COMPRESSION_OFFSET
        && bytes[BMP_BPP_OFFSET] == 0x04
        && bytes[BMP_COMPRESSION_OFFSET] == BI_RLE4 as u8
}

/// Decode any supported image and flatten it to opaque RGB over black.
///
/// Downstream consumers assume opaque pixels, so transparent areas become black.
pub fn decode_opaque_rgb(bytes: &[u8]) -> PackResult<RgbImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| PackError::decode(format!("decode image from memory: {e}")))?;
    if dyn_img.width() == 0 || dyn_img.height() == 0 {
        return Err(PackError::decode("decoded image has zero width or height"));
    }
    Ok(flatten_over_black(&dyn_img.to_rgba8()))
}

/// Encode an opaque RGB image as PNG.
pub fn encode_png(img: &RgbImage) -> PackResult<Vec<u8>> {
    encode_rgb(img, image::ImageFormat::Png)
}

/// Encode an opaque RGB image as an uncompressed 24-bit BMP.
pub fn encode_bmp(img: &RgbImage) -> PackResult<Vec<u8>> {
    encode_rgb(img, image::ImageFormat::Bmp)
}

fn encode_rgb(img: &RgbImage, format: image::ImageFormat) -> PackResult<Vec<u8>> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| PackError::encode(format!("encode {format:?}: {e}")))?;
    if buf.is_empty() {
        return Err(PackError::encode(format!(
            "{format:?} encoder produced no bytes"
        )));
    }
    Ok(buf)
}

/// Composite straight-alpha RGBA over an opaque black background.
pub(crate) fn flatten_over_black(src: &RgbaImage) -> RgbImage {
    let (width, height) = src.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = src.get_pixel(x, y).0;
        if a == 255 {
            return Rgb([r, g, b]);
        }
        let a = u16::from(a);
        let over_black = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        Rgb([over_black(r), over_black(g), over_black(b)])
    })
}

#[cfg(test)]
#[path = "../../tests/unit/raster/convert.rs"]
mod tests;
