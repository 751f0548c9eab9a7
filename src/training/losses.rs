//! Loss functions for ORNA training
//!
//! Validity maps are regressed with a squared error towards 1 (real) or 0
//! (fake). The generator objective adds pixel reconstruction terms.

use serde::{Deserialize, Serialize};
use tch::{Reduction, Tensor};

/// Weights of the four generator objectives
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    /// Local validity map vs ones
    pub local: f64,
    /// Global validity map vs ones
    pub global: f64,
    /// Mean absolute error between generated and real images
    pub reconstruction: f64,
    /// Squared error between `sigmoid(fake)` and `sigmoid(cond)`
    pub sigmoid_reconstruction: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            local: 1.0,
            global: 10.0,
            reconstruction: 300.0,
            sigmoid_reconstruction: 300.0,
        }
    }
}

/// Squared error of a validity map against a constant target
pub fn adversarial_loss(scores: &Tensor, target: f64) -> Tensor {
    let targets = Tensor::full_like(scores, target);
    scores.mse_loss(&targets, Reduction::Mean)
}

/// Mean absolute pixel error
pub fn reconstruction_loss(fake: &Tensor, real: &Tensor) -> Tensor {
    fake.l1_loss(real, Reduction::Mean)
}

/// Squared error between the sigmoids of the generated and conditioning images
pub fn sigmoid_reconstruction_loss(fake: &Tensor, cond: &Tensor) -> Tensor {
    fake.sigmoid().mse_loss(&cond.sigmoid(), Reduction::Mean)
}

/// Unweighted generator terms and their weighted sum
#[derive(Debug)]
pub struct GeneratorLosses {
    pub local: Tensor,
    pub global: Tensor,
    pub reconstruction: Tensor,
    pub sigmoid_reconstruction: Tensor,
    pub total: Tensor,
}

/// Compute the generator objective
pub fn generator_losses(
    weights: &LossWeights,
    local: &Tensor,
    global: &Tensor,
    fake: &Tensor,
    real: &Tensor,
    cond: &Tensor,
) -> GeneratorLosses {
    let local = adversarial_loss(local, 1.0);
    let global = adversarial_loss(global, 1.0);
    let reconstruction = reconstruction_loss(fake, real);
    let sigmoid_reconstruction = sigmoid_reconstruction_loss(fake, cond);

    let total = &local * weights.local
        + &global * weights.global
        + &reconstruction * weights.reconstruction
        + &sigmoid_reconstruction * weights.sigmoid_reconstruction;

    GeneratorLosses {
        local,
        global,
        reconstruction,
        sigmoid_reconstruction,
        total,
    }
}
