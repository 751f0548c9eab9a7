//! Generator update through the frozen discriminator

use tch::{nn, Tensor};

use super::losses::{generator_losses, LossWeights};
use crate::error::Result;
use crate::model::OrnaModel;

/// Scalar generator losses of one step (unweighted terms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorStep {
    pub local: f64,
    pub global: f64,
    pub l1: f64,
    pub sigmoid: f64,
    pub total: f64,
}

/// Generator → discriminator pipeline that only updates the generator
#[derive(Debug, Clone, Default)]
pub struct CombinedTrainer {
    weights: LossWeights,
}

impl CombinedTrainer {
    /// Create a combined trainer with the given objective weights
    pub fn new(weights: LossWeights) -> Self {
        Self { weights }
    }

    /// Objective weights
    pub fn weights(&self) -> &LossWeights {
        &self.weights
    }

    /// One generator step.
    ///
    /// Discriminator variables are frozen for the duration of the step and its
    /// batch-norm running statistics are restored afterwards, so `gen_opt` is
    /// the only writer.
    pub fn step(
        &self,
        model: &mut OrnaModel,
        gen_opt: &mut nn::Optimizer,
        real: &Tensor,
        cond: &Tensor,
    ) -> Result<GeneratorStep> {
        model.freeze_discriminator();
        let stats = model.discriminator_statistics();

        let fake = model.generator.forward_t(cond, true);
        let (local, global) = model.discriminator.forward_t(&fake, cond, true);
        let losses = generator_losses(&self.weights, &local, &global, &fake, real, cond);

        gen_opt.zero_grad();
        losses.total.backward();
        gen_opt.step();

        model.restore_discriminator_statistics(&stats);
        model.unfreeze_discriminator();

        Ok(GeneratorStep {
            local: losses.local.f_double_value(&[])?,
            global: losses.global.f_double_value(&[])?,
            l1: losses.reconstruction.f_double_value(&[])?,
            sigmoid: losses.sigmoid_reconstruction.f_double_value(&[])?,
            total: losses.total.f_double_value(&[])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdamSettings, DiscriminatorConfig, GeneratorConfig};
    use tch::{Device, Kind};

    fn small_model() -> OrnaModel {
        let gen_config = GeneratorConfig {
            base_filters: 4,
            ..Default::default()
        };
        let disc_config = DiscriminatorConfig {
            base_filters: 4,
            ..Default::default()
        };
        OrnaModel::new(gen_config, disc_config, Device::Cpu).unwrap()
    }

    #[test]
    fn test_step_leaves_discriminator_untouched() {
        tch::manual_seed(3);
        let mut model = small_model();
        let mut gen_opt = model.gen_optimizer(&AdamSettings::default()).unwrap();

        // weights and batch-norm running statistics
        let disc_before: Vec<(String, Tensor)> = model
            .disc_vs
            .variables()
            .into_iter()
            .map(|(name, v)| (name, v.detach().copy()))
            .collect();
        assert!(disc_before.iter().any(|(name, _)| name == "d2_bn.running_mean"));
        let gen_before: Vec<Tensor> = model
            .gen_vs
            .trainable_variables()
            .iter()
            .map(|v| v.detach().copy())
            .collect();

        let real = Tensor::rand([2, 3, 64, 64], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let cond = Tensor::rand([2, 3, 64, 64], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;

        let trainer = CombinedTrainer::default();
        let losses = trainer.step(&mut model, &mut gen_opt, &real, &cond).unwrap();
        assert!(losses.total.is_finite());
        assert!(losses.total >= losses.local);

        let disc_after = model.disc_vs.variables();
        for (name, before) in &disc_before {
            assert!(before.equal(&disc_after[name]), "{} changed", name);
        }
        let changed = gen_before
            .iter()
            .zip(model.gen_vs.trainable_variables().iter())
            .any(|(before, after)| !before.equal(after));
        assert!(changed);

        // discriminator is trainable again afterwards
        assert!(model.disc_vs.trainable_variables().iter().all(|v| v.requires_grad()));
    }
}
