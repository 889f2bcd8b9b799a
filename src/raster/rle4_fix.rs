use tracing::{debug, trace};

use crate::foundation::error::{PackError, PackResult};
use crate::raster::rle4::{AbsolutePadding, Rle4Header};

/// Re-pad the absolute-mode runs of a `BI_RLE4` bitmap so each run ends on a 16-bit boundary.
///
/// Header bytes are copied verbatim (size fields included) and encoded-mode tokens pass through
/// untouched. A body that already decodes cleanly with word-aligned runs, and not with legacy
/// runs, is returned unchanged. For any stream [`Rle4Writer`](crate::Rle4Writer) emits, applying
/// this twice is the same as applying it once.
///
/// Fails with [`PackError::MalformedRle`] on an invalid header or a truncated run.
pub fn fix_rle4_padding(bytes: &[u8]) -> PackResult<Vec<u8>> {
    let header = Rle4Header::parse(bytes)?;
    let body = &bytes[header.pixel_offset..];

    if scan_layout(body, &header, AbsolutePadding::WordAligned)
        && !scan_layout(body, &header, AbsolutePadding::PixelPairs)
    {
        debug!("RLE4 runs already word aligned");
        return Ok(bytes.to_vec());
    }

    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 64);
    out.extend_from_slice(&bytes[..header.pixel_offset]);
    repad_absolute_runs(body, &mut out)?;
    Ok(out)
}

fn repad_absolute_runs(body: &[u8], out: &mut Vec<u8>) -> PackResult<()> {
    let mut pos = 0;
    let mut inserted = 0usize;
    let mut dropped = 0usize;

    while pos < body.len() {
        let Some(&[b1, b2]) = body.get(pos..pos + 2) else {
            return Err(PackError::malformed_rle(format!(
                "truncated token at body offset {pos}"
            )));
        };
        out.extend_from_slice(&[b1, b2]);
        pos += 2;

        if b1 != 0 || b2 <= 2 {
            continue;
        }

        let pixels = usize::from(b2);
        let declared = pixels.div_ceil(2);
        let Some(payload) = body.get(pos..pos + declared) else {
            return Err(PackError::malformed_rle(format!(
                "absolute run of {pixels} pixels at body offset {} is truncated",
                pos - 2
            )));
        };
        out.extend_from_slice(payload);
        pos += declared;

        let required = pixels / 2;
        match (required % 2 == 0, declared % 2 == 1) {
            (true, true) => {
                out.push(0);
                inserted += 1;
            }
            (false, false) => {
                if pos >= body.len() {
                    return Err(PackError::malformed_rle(format!(
                        "missing pad byte after absolute run at body offset {pos}"
                    )));
                }
                pos += 1;
                dropped += 1;
            }
            (false, true) => {
                let Some(&pad) = body.get(pos) else {
                    return Err(PackError::malformed_rle(format!(
                        "missing pad byte after absolute run at body offset {pos}"
                    )));
                };
                out.push(pad);
                pos += 1;
            }
            (true, false) => {}
        }
    }

    trace!(inserted, dropped, "RLE4 absolute runs re-padded");
    Ok(())
}

/// Whether `body` is a complete RLE4 stream for `header` when absolute runs use `padding`.
///
/// Every row must cover exactly `width` pixels, rows are separated by end-of-line escapes and
/// the stream must end with end-of-bitmap as its last two bytes. Delta escapes are rejected.
pub(crate) fn scan_layout(body: &[u8], header: &Rle4Header, padding: AbsolutePadding) -> bool {
    let width = header.width as usize;
    let height = header.height as usize;
    let mut pos = 0;
    let mut x = 0usize;
    let mut rows = 0usize;

    while let Some(&[b1, b2]) = body.get(pos..pos + 2) {
        pos += 2;
        match (b1, b2) {
            (0, 0) => {
                if x != width || rows == height {
                    return false;
                }
                rows += 1;
                x = 0;
            }
            (0, 1) => {
                // A trailing end-of-line before end-of-bitmap is tolerated.
                let complete =
                    (x == width && rows + 1 == height) || (x == 0 && rows == height);
                return complete && pos == body.len();
            }
            (0, 2) => return false,
            (0, n) => {
                let n = usize::from(n);
                pos += n.div_ceil(2) + padding.pad_len(n);
                x += n;
                if pos > body.len() || x > width {
                    return false;
                }
            }
            (n, _) => {
                x += usize::from(n);
                if x > width {
                    return false;
                }
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "../../tests/unit/raster/rle4_fix.rs"]
mod tests;
