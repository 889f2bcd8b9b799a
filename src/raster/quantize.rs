use std::collections::HashMap;

use image::{Rgb, RgbImage, imageops::ColorMap};

use crate::foundation::error::{PackError, PackResult};

/// Number of palette slots in a 4-bit indexed bitmap.
pub const PALETTE_LEN: usize = 16;

/// Below this many pixels NeuQuant has too few samples to train on; a popularity palette is used.
const NEUQUANT_MIN_PIXELS: usize = 100;

/// Fixed 16-entry palette.
///
/// The first [`Palette16::used`] entries are the distinct colors supplied by the quantizer, in
/// order. Remaining slots are black filler and never chosen by [`Palette16::nearest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette16 {
    colors: [Rgb<u8>; PALETTE_LEN],
    used: usize,
}

impl Palette16 {
    /// Build a palette from quantizer output: duplicates are dropped, the list is truncated to
    /// 16 entries and padded with black.
    pub fn from_colors(colors: impl IntoIterator<Item = Rgb<u8>>) -> Self {
        let mut out = [Rgb([0, 0, 0]); PALETTE_LEN];
        let mut used = 0;
        for c in colors {
            if used == PALETTE_LEN {
                break;
            }
            if out[..used].contains(&c) {
                continue;
            }
            out[used] = c;
            used += 1;
        }
        Self {
            colors: out,
            // An empty input still needs one selectable entry.
            used: used.max(1),
        }
    }

    /// All 16 slots, filler included.
    pub fn colors(&self) -> &[Rgb<u8>; PALETTE_LEN] {
        &self.colors
    }

    /// Count of real (non-filler) entries.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Index of the closest real entry by squared RGB distance; ties go to the lower index.
    pub fn nearest(&self, color: &Rgb<u8>) -> usize {
        let mut best = 0;
        let mut best_dist = u32::MAX;
        for (idx, c) in self.colors[..self.used].iter().enumerate() {
            let dist = c
                .0
                .iter()
                .zip(color.0.iter())
                .map(|(&a, &b)| {
                    let d = i32::from(a) - i32::from(b);
                    (d * d) as u32
                })
                .sum::<u32>();
            if dist < best_dist {
                best = idx;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best
    }
}

impl ColorMap for Palette16 {
    type Color = Rgb<u8>;

    fn index_of(&self, color: &Rgb<u8>) -> usize {
        self.nearest(color)
    }

    fn map_color(&self, color: &mut Rgb<u8>) {
        *color = self.colors[self.nearest(color)];
    }
}

/// Palette-indexed image, top-down row-major, one index (`< 16`) per byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedImage {
    width: u32,
    height: u32,
    palette: Palette16,
    indices: Vec<u8>,
}

impl IndexedImage {
    /// Validate dimensions and indices and build the image.
    pub fn new(width: u32, height: u32, palette: Palette16, indices: Vec<u8>) -> PackResult<Self> {
        if width == 0 || height == 0 {
            return Err(PackError::validation(
                "indexed image width/height must be non-zero",
            ));
        }
        if indices.len() != width as usize * height as usize {
            return Err(PackError::validation(format!(
                "indexed image has {} indices, expected {}x{}",
                indices.len(),
                width,
                height
            )));
        }
        if let Some(bad) = indices.iter().find(|&&i| usize::from(i) >= PALETTE_LEN) {
            return Err(PackError::validation(format!(
                "palette index {bad} out of range for a 16-color palette"
            )));
        }
        Ok(Self {
            width,
            height,
            palette,
            indices,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Palette the indices refer to.
    pub fn palette(&self) -> &Palette16 {
        &self.palette
    }

    /// All indices, top-down.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Indices of row `y` (0 = top).
    pub fn row(&self, y: u32) -> &[u8] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.indices[start..start + w]
    }
}

/// Color reduction collaborator used by the firmware profile.
pub trait Quantizer: Send + Sync {
    /// Reduce `image` to at most `max_colors` (≤ 16) colors, optionally with error diffusion.
    fn quantize(&self, image: &RgbImage, max_colors: usize, dither: bool)
    -> PackResult<IndexedImage>;
}

/// Default quantizer: exact palette when the image already fits, NeuQuant otherwise, then
/// Floyd–Steinberg dithering and nearest-color indexing.
#[derive(Clone, Copy, Debug)]
pub struct NeuQuantizer {
    /// NeuQuant sampling factor (1 = best quality, 30 = fastest).
    pub sample_factor: i32,
}

impl Default for NeuQuantizer {
    fn default() -> Self {
        Self { sample_factor: 10 }
    }
}

impl Quantizer for NeuQuantizer {
    fn quantize(
        &self,
        image: &RgbImage,
        max_colors: usize,
        dither: bool,
    ) -> PackResult<IndexedImage> {
        if !(1..=PALETTE_LEN).contains(&max_colors) {
            return Err(PackError::validation(format!(
                "max_colors must be in 1..={PALETTE_LEN}, got {max_colors}"
            )));
        }

        let palette = match exact_colors(image, max_colors) {
            Some(colors) => Palette16::from_colors(colors),
            None => Palette16::from_colors(self.train_palette(image, max_colors)),
        };

        let mut work = image.clone();
        if dither {
            image::imageops::dither(&mut work, &palette);
        }
        let indices = image::imageops::index_colors(&work, &palette).into_raw();
        IndexedImage::new(image.width(), image.height(), palette, indices)
    }
}

impl NeuQuantizer {
    fn train_palette(&self, image: &RgbImage, max_colors: usize) -> Vec<Rgb<u8>> {
        let pixel_count = image.as_raw().len() / 3;
        if pixel_count < NEUQUANT_MIN_PIXELS || max_colors < 2 {
            return popular_colors(image, max_colors);
        }

        let mut rgba = Vec::with_capacity(pixel_count * 4);
        for px in image.as_raw().chunks_exact(3) {
            rgba.extend_from_slice(px);
            rgba.push(255);
        }
        // Keep at least NEUQUANT_MIN_PIXELS samples per training pass.
        let max_factor = i32::try_from(pixel_count / NEUQUANT_MIN_PIXELS).unwrap_or(i32::MAX);
        let sample_factor = self.sample_factor.clamp(1, 30).min(max_factor.max(1));

        let nq = color_quant::NeuQuant::new(sample_factor, max_colors, &rgba);
        nq.color_map_rgb()
            .chunks_exact(3)
            .map(|c| Rgb([c[0], c[1], c[2]]))
            .collect()
    }
}

/// Distinct colors in first-seen order, or `None` when there are more than `max_colors`.
fn exact_colors(image: &RgbImage, max_colors: usize) -> Option<Vec<Rgb<u8>>> {
    let mut out = Vec::with_capacity(max_colors);
    for px in image.pixels() {
        if out.contains(px) {
            continue;
        }
        if out.len() == max_colors {
            return None;
        }
        out.push(*px);
    }
    Some(out)
}

/// Most frequent colors, ties broken by first appearance.
fn popular_colors(image: &RgbImage, max_colors: usize) -> Vec<Rgb<u8>> {
    let mut counts = HashMap::<[u8; 3], (usize, usize)>::new();
    for (order, px) in image.pixels().enumerate() {
        counts.entry(px.0).or_insert((0, order)).0 += 1;
    }
    let mut ranked = counts.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
    ranked
        .into_iter()
        .take(max_colors)
        .map(|(c, _)| Rgb(c))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/raster/quantize.rs"]
mod tests;
