//! U-Net generator
//!
//! Maps a conditioning image to a stylized glyph image. The contracting path
//! halves the resolution at every stage; the expanding path mirrors it and
//! concatenates each stage with the matching contracting output so fine glyph
//! detail survives the bottleneck.

use serde::{Deserialize, Serialize};
use tch::{nn, nn::Module, nn::ModuleT, Tensor};

use super::layers::{batch_norm_config, down_conv, leaky_relu, pad_same, same_conv, upsample2, LEAKY_SLOPE};
use crate::error::{OrnaError, Result};

/// Generator network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Channels of the conditioning image
    pub in_channels: i64,
    /// Channels of the generated image
    pub out_channels: i64,
    /// Filters of the first contracting stage (`gf`)
    pub base_filters: i64,
    /// Number of contracting stages; the width doubles at each one
    pub depth: usize,
    /// Dropout rate of the expanding stages (training only)
    pub dropout: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            out_channels: 3,
            base_filters: 64,
            depth: 4,
            dropout: 0.4,
        }
    }
}

impl GeneratorConfig {
    /// Width of contracting stage `stage`
    fn stage_width(&self, stage: usize) -> i64 {
        self.base_filters << stage
    }

    /// Check the configuration describes a buildable network
    pub fn validate(&self) -> Result<()> {
        if self.depth < 2 {
            return Err(OrnaError::config("generator needs at least two stages"));
        }
        if self.base_filters <= 0 || self.in_channels <= 0 || self.out_channels <= 0 {
            return Err(OrnaError::config("generator widths must be > 0"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(OrnaError::config(format!("dropout {} not in [0, 1)", self.dropout)));
        }
        Ok(())
    }
}

/// Strided conv, optional batch norm, leaky ReLU
#[derive(Debug)]
struct DownStage {
    conv: nn::Conv2D,
    bn: Option<nn::BatchNorm>,
}

impl DownStage {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let x = self.conv.forward(xs);
        let x = match &self.bn {
            Some(bn) => bn.forward_t(&x, train),
            None => x,
        };
        leaky_relu(&x, LEAKY_SLOPE)
    }
}

/// Upsample, conv + ReLU, dropout, batch norm, concat skip
#[derive(Debug)]
struct UpStage {
    conv: nn::Conv2D,
    bn: nn::BatchNorm,
}

impl UpStage {
    fn forward_t(&self, xs: &Tensor, skip: &Tensor, dropout: f64, train: bool) -> Tensor {
        let x = upsample2(xs);
        let x = self.conv.forward(&pad_same(&x)).relu();
        let x = x.dropout(dropout, train);
        let x = self.bn.forward_t(&x, train);
        Tensor::cat(&[x, skip.shallow_clone()], 1)
    }
}

/// Generator network
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    down: Vec<DownStage>,
    up: Vec<UpStage>,
    output: nn::Conv2D,
}

impl Generator {
    /// Create a new Generator network
    pub fn new(vs: &nn::Path, config: GeneratorConfig) -> Self {
        let depth = config.depth;

        let mut down = Vec::with_capacity(depth);
        let mut in_channels = config.in_channels;
        for stage in 0..depth {
            let width = config.stage_width(stage);
            let conv = down_conv(vs / format!("down{}", stage + 1), in_channels, width);
            // no normalization on the first stage
            let bn = (stage > 0).then(|| {
                nn::batch_norm2d(vs / format!("down{}_bn", stage + 1), width, batch_norm_config())
            });
            down.push(DownStage { conv, bn });
            in_channels = width;
        }

        let mut up = Vec::with_capacity(depth.saturating_sub(1));
        for stage in 0..depth.saturating_sub(1) {
            let width = config.stage_width(depth - 1 - stage);
            let skip_width = config.stage_width(depth - 2 - stage);
            let conv = same_conv(vs / format!("up{}", stage + 1), in_channels, width);
            let bn = nn::batch_norm2d(vs / format!("up{}_bn", stage + 1), width, batch_norm_config());
            up.push(UpStage { conv, bn });
            in_channels = width + skip_width;
        }

        let output = same_conv(vs / "output", in_channels, config.out_channels);

        Self {
            config,
            down,
            up,
            output,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `cond` - Conditioning images of shape (batch, in_channels, H, W)
    /// * `train` - Whether in training mode (dropout, batch statistics)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch, out_channels, H, W) with values in [-1, 1]
    pub fn forward_t(&self, cond: &Tensor, train: bool) -> Tensor {
        let mut skips = Vec::with_capacity(self.down.len());
        let mut x = cond.shallow_clone();
        for stage in &self.down {
            x = stage.forward_t(&x, train);
            skips.push(x.shallow_clone());
        }
        // the deepest output is the bottleneck, not a skip
        skips.pop();

        for (stage, skip) in self.up.iter().zip(skips.iter().rev()) {
            x = stage.forward_t(&x, skip, self.config.dropout, train);
        }

        let x = upsample2(&x);
        self.output.forward(&pad_same(&x)).tanh()
    }

    /// Generate images (inference mode)
    pub fn generate(&self, cond: &Tensor) -> Tensor {
        self.forward_t(cond, false)
    }

    /// Get configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}
