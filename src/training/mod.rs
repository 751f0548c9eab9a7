//! Training module for ORNA
//!
//! This module provides:
//! - Training loop implementation
//! - Adversarial and reconstruction losses
//! - The generator update through the frozen discriminator
//! - Per-step loss records and their CSV log

mod combined;
mod losses;
mod metrics;
mod trainer;

pub use combined::{CombinedTrainer, GeneratorStep};
pub use losses::{
    adversarial_loss, generator_losses, reconstruction_loss, sigmoid_reconstruction_loss, GeneratorLosses,
    LossWeights,
};
pub use metrics::{LossHistory, LossRecord, LOSS_NAMES};
pub use trainer::{
    discriminator_step, train_step, DiscriminatorStep, Trainer, TrainingConfig, TrainingContext,
};
