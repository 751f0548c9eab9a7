//! Sample image output
//!
//! Renders the generated glyphs, the ground truth and the composited glyph
//! network input of a font as individual PNG files.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use tch::Tensor;

use crate::data::glyph::{denormalize_pixel, tensor_to_array4};
use crate::error::Result;

/// Directory receiving the samples of an epoch
pub fn sample_dir(results_dir: impl AsRef<Path>, epoch: usize) -> PathBuf {
    results_dir.as_ref().join(format!("orna{}", epoch))
}

/// Render a `(3, H, W)` image in [-1, 1]
pub fn rgb_image(chw: ArrayView3<'_, f32>) -> RgbImage {
    let (_, height, width) = chw.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            denormalize_pixel(chw[[0, y, x]]),
            denormalize_pixel(chw[[1, y, x]]),
            denormalize_pixel(chw[[2, y, x]]),
        ])
    })
}

/// Render a single `(H, W)` channel in [-1, 1]
pub fn gray_image(hw: ArrayView2<'_, f32>) -> GrayImage {
    let (height, width) = hw.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([denormalize_pixel(hw[[y as usize, x as usize]])])
    })
}

/// Write `generated_{font}_{i}.png`, `groundTruth{font}_{i}.png` and
/// `glyphnet{font}_{i}.png` for every letter.
///
/// `fake` and `real` are `(letters, 3, H, W)` tensors, `composite` is the
/// `(H, W, letters)` glyph network composite. Returns the number of letters
/// written.
pub fn save_sample_triples(
    dir: impl AsRef<Path>,
    font: usize,
    fake: &Tensor,
    real: &Tensor,
    composite: &Array3<f32>,
) -> Result<usize> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let fake = tensor_to_array4(fake)?;
    let real = tensor_to_array4(real)?;
    let letters = fake
        .len_of(Axis(0))
        .min(real.len_of(Axis(0)))
        .min(composite.len_of(Axis(2)));

    for i in 0..letters {
        rgb_image(fake.index_axis(Axis(0), i)).save(dir.join(format!("generated_{}_{}.png", font, i)))?;
        rgb_image(real.index_axis(Axis(0), i)).save(dir.join(format!("groundTruth{}_{}.png", font, i)))?;
        gray_image(composite.index_axis(Axis(2), i)).save(dir.join(format!("glyphnet{}_{}.png", font, i)))?;
    }

    Ok(letters)
}
