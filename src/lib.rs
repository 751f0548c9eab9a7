//! # ORNA: ornamented glyph GAN
//!
//! A conditional GAN that turns the predictions of a frozen glyph network
//! into fully colored and ornamented letters. For every font a few letters
//! are revealed to the glyph network, its predictions are fused into one
//! conditioning image per letter, and a U-Net generator learns to paint the
//! font's colored alphabet from it against a two-scale discriminator.
//!
//! ## Modules
//!
//! - `data`: Font strip loading and glyph tensor layout
//! - `conditioning`: Letter sampling, glyph network, compositing
//! - `model`: Generator and discriminator architectures
//! - `training`: Training loop and loss functions
//! - `utils`: Configuration, checkpoints and sample images

pub mod conditioning;
pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod utils;

pub use conditioning::{
    build_conditioning, ConditionImageSampler, Conditioning, GlyphPredictor, TorchScriptGlyphPredictor,
};
pub use data::{FontDataset, FontSample, GlyphTensor};
pub use error::{OrnaError, Result};
pub use model::{Discriminator, Generator, OrnaModel};
pub use training::{LossHistory, LossRecord, Trainer, TrainingConfig, TrainingContext};
pub use utils::{load_checkpoint, save_checkpoint, Config};
