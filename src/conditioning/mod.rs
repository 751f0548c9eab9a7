//! Conditioning-image assembly
//!
//! This module provides:
//! - Masked query batches for the glyph network
//! - The glyph network capability and its TorchScript implementation
//! - Compositing of glyph predictions into the generator's conditioning input

mod compositor;
mod predictor;
mod sampler;

pub use compositor::{broadcast_rgb, composite};
pub use predictor::{glyph_network_path, GlyphPredictor, TorchScriptGlyphPredictor};
pub use sampler::{build_batch, ConditionImageSampler, ConditioningBatch, SamplerConfig};

use ndarray::{Array3, Array4};
use rand::Rng;

use crate::data::glyph::GlyphTensor;
use crate::error::Result;

/// Conditioning input for one font
#[derive(Debug, Clone)]
pub struct Conditioning {
    /// Fused glyph predictions, `(H, W, C)`
    pub composite: Array3<f32>,
    /// One RGB conditioning image per letter, `(C, 3, H, W)`
    pub rgb: Array4<f32>,
    /// Letters revealed to the glyph network
    pub selected: Vec<usize>,
}

/// Sample, predict and composite the conditioning input for a font
pub fn build_conditioning<P, R>(
    sampler: &ConditionImageSampler,
    predictor: &P,
    glyphs: &GlyphTensor,
    rng: &mut R,
) -> Result<Conditioning>
where
    P: GlyphPredictor + ?Sized,
    R: Rng + ?Sized,
{
    let batch = sampler.sample(glyphs, rng)?;
    let predictions = predictor.predict(&batch.entries)?;
    let composite = composite(&predictions, &batch.selected)?;
    let rgb = broadcast_rgb(&composite);

    Ok(Conditioning {
        composite,
        rgb,
        selected: batch.selected,
    })
}
