//! Upstream glyph network
//!
//! The glyph network is a frozen image-to-image model that completes a font
//! from a handful of revealed letters. Training only needs its predictions,
//! so it is consumed through the [`GlyphPredictor`] capability.

use std::path::{Path, PathBuf};

use ndarray::Array4;
use tch::{CModule, Device};
use tracing::info;

use crate::data::glyph::{array4_to_tensor, tensor_to_array4};
use crate::error::{OrnaError, Result};

/// Batch image-to-image predictor.
///
/// Input and output are channel-last, `(batch, H, W, C)`. Each call blocks
/// until the prediction is available.
pub trait GlyphPredictor {
    /// Predict one completed glyph image per batch entry
    fn predict(&self, batch: &Array4<f32>) -> Result<Array4<f32>>;
}

impl<P: GlyphPredictor + ?Sized> GlyphPredictor for Box<P> {
    fn predict(&self, batch: &Array4<f32>) -> Result<Array4<f32>> {
        (**self).predict(batch)
    }
}

/// Location of the glyph network for a given block size and epoch
pub fn glyph_network_path(models_dir: impl AsRef<Path>, block_size: usize, epoch: usize) -> PathBuf {
    models_dir
        .as_ref()
        .join(format!("glyph_net{}", block_size))
        .join(epoch.to_string())
        .join("generator.pt")
}

/// Glyph network exported as TorchScript (architecture and weights in one file).
///
/// The scripted module takes and returns NCHW tensors.
pub struct TorchScriptGlyphPredictor {
    module: CModule,
    device: Device,
}

impl TorchScriptGlyphPredictor {
    /// Load the scripted module; a missing file is a configuration error
    pub fn load(path: impl AsRef<Path>, device: Device) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(OrnaError::config(format!(
                "glyph network not found at {}",
                path.display()
            )));
        }
        let mut module = CModule::load_on_device(path, device)?;
        module.set_eval();
        info!("Loaded glyph network from {}", path.display());
        Ok(Self { module, device })
    }
}

impl GlyphPredictor for TorchScriptGlyphPredictor {
    fn predict(&self, batch: &Array4<f32>) -> Result<Array4<f32>> {
        let input = array4_to_tensor(batch, self.device).permute([0, 3, 1, 2]);
        let output = tch::no_grad(|| self.module.forward_ts(&[input]))?;
        tensor_to_array4(&output.permute([0, 2, 3, 1]))
    }
}
