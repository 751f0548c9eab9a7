//! Dual-scale patch discriminator
//!
//! The discriminator scores a (candidate, conditioning) pair. A local head
//! taps the trunk early and scores 4×4 patches; a global head at the end of
//! the trunk scores the whole image. Outputs are raw scores trained with a
//! squared-error objective against 0 (fake) and 1 (real).

use serde::{Deserialize, Serialize};
use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::layers::{batch_norm_config, down_conv, leaky_relu, pad_same, same_conv, LEAKY_SLOPE};
use crate::error::{OrnaError, Result};

/// Discriminator network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    /// Channels of each of the two input images
    pub image_channels: i64,
    /// Base number of filters (`df`)
    pub base_filters: i64,
    /// Width of each stage as a multiple of `df`
    pub width_multipliers: Vec<i64>,
    /// Stage (1-based) feeding the local head
    pub local_stage: usize,
    /// Stage (1-based) feeding the global head
    pub global_stage: usize,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            image_channels: 3,
            base_filters: 52,
            width_multipliers: vec![1, 2, 4, 8, 16, 16],
            local_stage: 4,
            global_stage: 6,
        }
    }
}

impl DiscriminatorConfig {
    /// Check that both heads tap an existing stage
    pub fn validate(&self) -> Result<()> {
        let stages = self.width_multipliers.len();
        for (name, stage) in [("local", self.local_stage), ("global", self.global_stage)] {
            if stage == 0 || stage > stages {
                return Err(OrnaError::config(format!(
                    "{} head taps stage {}, discriminator has {} stages",
                    name, stage, stages
                )));
            }
        }
        if self.base_filters <= 0 || self.width_multipliers.iter().any(|&m| m <= 0) {
            return Err(OrnaError::config("discriminator widths must be > 0"));
        }
        Ok(())
    }
}

/// Strided conv, leaky ReLU, optional batch norm
#[derive(Debug)]
struct Stage {
    conv: nn::Conv2D,
    bn: Option<nn::BatchNorm>,
}

/// Discriminator network
#[derive(Debug)]
pub struct Discriminator {
    config: DiscriminatorConfig,
    stages: Vec<Stage>,
    local_head: nn::Conv2D,
    global_head: nn::Conv2D,
}

impl Discriminator {
    /// Create a new Discriminator network; fails if a head taps a missing stage
    pub fn new(vs: &nn::Path, config: DiscriminatorConfig) -> Result<Self> {
        config.validate()?;
        let base = config.base_filters;

        let mut stages = Vec::with_capacity(config.width_multipliers.len());
        let mut in_channels = config.image_channels * 2;
        let mut widths = Vec::with_capacity(config.width_multipliers.len());
        for (i, mult) in config.width_multipliers.iter().enumerate() {
            let width = base * mult;
            let conv = down_conv(vs / format!("d{}", i + 1), in_channels, width);
            let bn = (i > 0).then(|| nn::batch_norm2d(vs / format!("d{}_bn", i + 1), width, batch_norm_config()));
            stages.push(Stage { conv, bn });
            widths.push(width);
            in_channels = width;
        }

        let local_head = same_conv(vs / "local", widths[config.local_stage - 1], 1);
        let global_head = same_conv(vs / "global", widths[config.global_stage - 1], 1);

        Ok(Self {
            config,
            stages,
            local_head,
            global_head,
        })
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `candidate` - Real or generated images (batch, 3, H, W)
    /// * `cond` - Conditioning images of the same shape
    /// * `train` - Whether in training mode (batch statistics)
    ///
    /// # Returns
    ///
    /// `(local, global)` score maps, (batch, 1, H/16, W/16) and
    /// (batch, 1, H/64, W/64) with the default configuration
    pub fn forward_t(&self, candidate: &Tensor, cond: &Tensor, train: bool) -> (Tensor, Tensor) {
        let mut x = Tensor::cat(&[candidate, cond], 1);
        let mut features = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            x = leaky_relu(&stage.conv.forward(&x), LEAKY_SLOPE);
            if let Some(bn) = &stage.bn {
                x = bn.forward_t(&x, train);
            }
            features.push(x.shallow_clone());
        }

        let local = self.local_head.forward(&pad_same(&features[self.config.local_stage - 1]));
        let global = self.global_head.forward(&pad_same(&features[self.config.global_stage - 1]));
        (local, global)
    }

    /// Get configuration
    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}
