use tracing::debug;

use crate::foundation::error::{PackError, PackResult};
use crate::raster::convert::{BI_RLE4, BMP_BPP_OFFSET, BMP_COMPRESSION_OFFSET};
use crate::raster::quantize::{IndexedImage, PALETTE_LEN};
use crate::raster::rle4_fix::scan_layout;

/// Size of a BMP file header plus a `BITMAPINFOHEADER` and a full 16-color palette.
pub const RLE4_HEADER_LEN: usize = 14 + 40 + PALETTE_LEN * 4;

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_MIN_LEN: u32 = 40;
const PIXELS_PER_METER: u32 = 2835;
const MAX_RUN: usize = 255;
const MIN_ABSOLUTE_RUN: usize = 3;

/// Padding rule applied after the payload of an absolute-mode run of `n` pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AbsolutePadding {
    /// Legacy layout: a pad byte follows when `floor(n / 2)` is odd.
    ///
    /// Produced by older 4-bit encoders and rejected by device firmware.
    #[default]
    PixelPairs,
    /// Conformant layout: the run (payload plus padding) ends on a 16-bit boundary.
    WordAligned,
}

impl AbsolutePadding {
    /// Number of pad bytes after the `ceil(n / 2)` payload bytes of an `n`-pixel run.
    pub fn pad_len(self, n: usize) -> usize {
        match self {
            Self::PixelPairs => (n / 2) % 2,
            Self::WordAligned => n.div_ceil(2) % 2,
        }
    }
}

/// Encoder for 4-bit run-length bitmaps (`BI_RLE4`).
///
/// Rows are written bottom-up. Runs of three or more equal pixels use encoded mode. Other
/// stretches of three or more pixels use absolute mode and shorter ones use encoded pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rle4Writer {
    padding: AbsolutePadding,
}

impl Rle4Writer {
    /// Writer with the given absolute-run layout.
    pub fn new(padding: AbsolutePadding) -> Self {
        Self { padding }
    }

    /// Absolute-run layout this writer produces.
    pub fn padding(&self) -> AbsolutePadding {
        self.padding
    }

    /// Encode `image` as a complete BMP file.
    ///
    /// When the word-aligned form of the stream would also read as a valid legacy stream, odd
    /// absolute runs are split into even absolute runs and encoded tokens. Both layouts then
    /// produce the same bytes, which [`fix_rle4_padding`](crate::fix_rle4_padding) leaves alone.
    pub fn encode(&self, image: &IndexedImage) -> PackResult<Vec<u8>> {
        let width = i32::try_from(image.width())
            .map_err(|_| PackError::encode("image too wide for a BMP header"))?;
        let height = i32::try_from(image.height())
            .map_err(|_| PackError::encode("image too tall for a BMP header"))?;

        let header = Rle4Header {
            pixel_offset: RLE4_HEADER_LEN,
            width: image.width(),
            height: image.height(),
            palette_len: PALETTE_LEN,
        };
        let aligned = BodyEncoder::new(AbsolutePadding::WordAligned).encode(image);
        let body = if aligned.odd_runs
            && scan_layout(&aligned.bytes, &header, AbsolutePadding::PixelPairs)
        {
            debug!(
                width,
                height, "word-aligned RLE4 stream also reads as legacy, splitting odd runs"
            );
            BodyEncoder {
                padding: self.padding,
                even_runs_only: true,
            }
            .encode(image)
            .bytes
        } else if self.padding == AbsolutePadding::WordAligned {
            aligned.bytes
        } else {
            BodyEncoder::new(self.padding).encode(image).bytes
        };

        let image_size = u32::try_from(body.len())
            .map_err(|_| PackError::encode("RLE4 body exceeds 4 GiB"))?;
        let file_size = u32::try_from(RLE4_HEADER_LEN + body.len())
            .map_err(|_| PackError::encode("RLE4 file exceeds 4 GiB"))?;

        let mut out = Vec::with_capacity(RLE4_HEADER_LEN + body.len());
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(RLE4_HEADER_LEN as u32).to_le_bytes());

        out.extend_from_slice(&INFO_HEADER_MIN_LEN.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&BI_RLE4.to_le_bytes());
        out.extend_from_slice(&image_size.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
        out.extend_from_slice(&(PALETTE_LEN as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        for c in image.palette().colors() {
            let [r, g, b] = c.0;
            out.extend_from_slice(&[b, g, r, 0]);
        }
        debug_assert_eq!(out.len(), RLE4_HEADER_LEN);

        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// RLE stream of one image.
struct EncodedBody {
    bytes: Vec<u8>,
    /// Whether any absolute run has an odd pixel count.
    odd_runs: bool,
}

struct BodyEncoder {
    padding: AbsolutePadding,
    even_runs_only: bool,
}

impl BodyEncoder {
    fn new(padding: AbsolutePadding) -> Self {
        Self {
            padding,
            even_runs_only: false,
        }
    }

    fn encode(&self, image: &IndexedImage) -> EncodedBody {
        let mut body = EncodedBody {
            bytes: Vec::new(),
            odd_runs: false,
        };
        for y in (0..image.height()).rev() {
            self.encode_row(image.row(y), &mut body);
            // End of line between rows, end of bitmap after the last one.
            body.bytes
                .extend_from_slice(if y == 0 { &[0, 1] } else { &[0, 0] });
        }
        body
    }

    fn encode_row(&self, row: &[u8], body: &mut EncodedBody) {
        let mut i = 0;
        while i < row.len() {
            let run = run_len(&row[i..]);
            if run >= MIN_ABSOLUTE_RUN {
                let c = row[i];
                body.bytes.extend_from_slice(&[run as u8, (c << 4) | c]);
                i += run;
                continue;
            }

            let mut end = i;
            while end < row.len() && end - i < MAX_RUN && run_len(&row[end..]) < MIN_ABSOLUTE_RUN {
                end += 1;
            }
            let literal = &row[i..end];
            match literal.len() {
                n if n < MIN_ABSOLUTE_RUN => write_pair(literal, &mut body.bytes),
                n if n % 2 == 0 || !self.even_runs_only => {
                    body.odd_runs |= n % 2 == 1;
                    self.write_absolute(literal, &mut body.bytes);
                }
                MIN_ABSOLUTE_RUN => {
                    write_pair(&literal[..2], &mut body.bytes);
                    write_pair(&literal[2..], &mut body.bytes);
                }
                n => {
                    self.write_absolute(&literal[..n - 1], &mut body.bytes);
                    write_pair(&literal[n - 1..], &mut body.bytes);
                }
            }
            i = end;
        }
    }

    fn write_absolute(&self, pixels: &[u8], out: &mut Vec<u8>) {
        out.extend_from_slice(&[0, pixels.len() as u8]);
        for pair in pixels.chunks(2) {
            let hi = pair[0] << 4;
            let lo = pair.get(1).copied().unwrap_or(0);
            out.push(hi | lo);
        }
        out.resize(out.len() + self.padding.pad_len(pixels.len()), 0);
    }
}

fn run_len(pixels: &[u8]) -> usize {
    match pixels.first() {
        Some(&first) => pixels
            .iter()
            .take(MAX_RUN)
            .take_while(|&&p| p == first)
            .count(),
        None => 0,
    }
}

/// One or two pixels as an encoded-mode token.
fn write_pair(pixels: &[u8], out: &mut Vec<u8>) {
    let hi = pixels[0] << 4;
    let lo = pixels.get(1).copied().unwrap_or(0);
    out.extend_from_slice(&[pixels.len() as u8, hi | lo]);
}

/// Validated header fields of a `BI_RLE4` bitmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rle4Header {
    /// Offset of the RLE stream (`bfOffBits`).
    pub pixel_offset: usize,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels (bottom-up).
    pub height: u32,
    /// Palette entries declared by the header.
    pub palette_len: usize,
}

impl Rle4Header {
    /// Parse and validate the file and info headers of `bytes`.
    pub fn parse(bytes: &[u8]) -> PackResult<Self> {
        if bytes.len() < FILE_HEADER_LEN + INFO_HEADER_MIN_LEN as usize {
            return Err(PackError::malformed_rle(format!(
                "{} bytes is too short for a BMP header",
                bytes.len()
            )));
        }
        if &bytes[..2] != b"BM" {
            return Err(PackError::malformed_rle("missing BM signature"));
        }

        let pixel_offset = read_u32(bytes, 10) as usize;
        let info_len = read_u32(bytes, 14);
        if info_len < INFO_HEADER_MIN_LEN {
            return Err(PackError::malformed_rle(format!(
                "info header of {info_len} bytes is too short"
            )));
        }
        let bpp = u16::from_le_bytes([bytes[BMP_BPP_OFFSET], bytes[BMP_BPP_OFFSET + 1]]);
        let compression = read_u32(bytes, BMP_COMPRESSION_OFFSET);
        if bpp != 4 || compression != BI_RLE4 {
            return Err(PackError::malformed_rle(format!(
                "expected 4 bpp RLE4, found {bpp} bpp with compression {compression}"
            )));
        }

        let width = read_i32(bytes, 18);
        let height = read_i32(bytes, 22);
        if width <= 0 || height <= 0 {
            return Err(PackError::malformed_rle(format!(
                "unsupported dimensions {width}x{height} (RLE4 must be bottom-up and non-empty)"
            )));
        }

        let palette_len = match read_u32(bytes, 46) as usize {
            0 => PALETTE_LEN,
            n if n <= PALETTE_LEN => n,
            n => {
                return Err(PackError::malformed_rle(format!(
                    "palette of {n} entries exceeds 16"
                )));
            }
        };

        let min_offset = FILE_HEADER_LEN + info_len as usize + 4 * palette_len;
        if pixel_offset < min_offset || pixel_offset > bytes.len() {
            return Err(PackError::malformed_rle(format!(
                "pixel data offset {pixel_offset} outside {min_offset}..={}",
                bytes.len()
            )));
        }
        if pixel_offset != RLE4_HEADER_LEN {
            debug!(pixel_offset, "RLE4 bitmap with non-standard header length");
        }

        Ok(Self {
            pixel_offset,
            width: width as u32,
            height: height as u32,
            palette_len,
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    read_u32(bytes, at) as i32
}

#[cfg(test)]
#[path = "../../tests/unit/raster/rle4.rs"]
mod tests;
