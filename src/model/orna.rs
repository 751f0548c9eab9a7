//! ORNA model pairing the generator and discriminator
//!
//! Each network owns its own variable store, so optimizer steps and
//! checkpoints can address them separately.

use std::path::Path;

use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Tensor};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};
use crate::error::Result;

/// Adam hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AdamSettings {
    /// Learning rate
    pub learning_rate: f64,
    /// First moment decay
    pub beta1: f64,
    /// Second moment decay
    pub beta2: f64,
}

impl Default for AdamSettings {
    fn default() -> Self {
        Self {
            learning_rate: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
        }
    }
}

impl AdamSettings {
    fn build(&self, vs: &VarStore) -> Result<nn::Optimizer> {
        let adam = nn::Adam {
            beta1: self.beta1,
            beta2: self.beta2,
            ..Default::default()
        };
        Ok(adam.build(vs, self.learning_rate)?)
    }
}

/// Complete ORNA model
pub struct OrnaModel {
    /// Generator network
    pub generator: Generator,
    /// Discriminator network
    pub discriminator: Discriminator,
    /// Variable store for generator
    pub gen_vs: VarStore,
    /// Variable store for discriminator
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
}

impl OrnaModel {
    /// Create a new ORNA model
    pub fn new(gen_config: GeneratorConfig, disc_config: DiscriminatorConfig, device: Device) -> Result<Self> {
        gen_config.validate()?;

        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = Generator::new(&gen_vs.root(), gen_config);
        let discriminator = Discriminator::new(&disc_vs.root(), disc_config)?;

        Ok(Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
        })
    }

    /// Create a model with the default architecture
    pub fn with_defaults(device: Device) -> Result<Self> {
        Self::new(GeneratorConfig::default(), DiscriminatorConfig::default(), device)
    }

    /// Generate images from conditioning images (inference mode)
    pub fn generate(&self, cond: &Tensor) -> Tensor {
        tch::no_grad(|| self.generator.generate(cond))
    }

    /// Score a (candidate, conditioning) pair (inference mode)
    pub fn discriminate(&self, candidate: &Tensor, cond: &Tensor) -> (Tensor, Tensor) {
        tch::no_grad(|| self.discriminator.forward_t(candidate, cond, false))
    }

    /// Adam optimizer over the generator variables
    pub fn gen_optimizer(&self, settings: &AdamSettings) -> Result<nn::Optimizer> {
        settings.build(&self.gen_vs)
    }

    /// Adam optimizer over the discriminator variables
    pub fn disc_optimizer(&self, settings: &AdamSettings) -> Result<nn::Optimizer> {
        settings.build(&self.disc_vs)
    }

    /// Stop gradients from reaching the discriminator variables
    pub fn freeze_discriminator(&mut self) {
        self.disc_vs.freeze();
    }

    /// Re-enable gradients for the discriminator variables
    pub fn unfreeze_discriminator(&mut self) {
        self.disc_vs.unfreeze();
    }

    /// Copies of the discriminator's batch-norm running statistics
    pub fn discriminator_statistics(&self) -> Vec<(String, Tensor)> {
        self.disc_vs
            .variables()
            .into_iter()
            .filter(|(name, _)| name.ends_with("running_mean") || name.ends_with("running_var"))
            .map(|(name, var)| (name, var.detach().copy()))
            .collect()
    }

    /// Write statistics taken with [`Self::discriminator_statistics`] back
    pub fn restore_discriminator_statistics(&self, stats: &[(String, Tensor)]) {
        let vars = self.disc_vs.variables();
        tch::no_grad(|| {
            for (name, saved) in stats {
                if let Some(var) = vars.get(name) {
                    var.shallow_clone().copy_(saved);
                }
            }
        });
    }

    /// Save both weight sets
    pub fn save(&self, gen_path: impl AsRef<Path>, disc_path: impl AsRef<Path>) -> Result<()> {
        self.gen_vs.save(gen_path)?;
        self.disc_vs.save(disc_path)?;
        Ok(())
    }

    /// Load both weight sets
    pub fn load(&mut self, gen_path: impl AsRef<Path>, disc_path: impl AsRef<Path>) -> Result<()> {
        self.gen_vs.load(gen_path)?;
        self.disc_vs.load(disc_path)?;
        Ok(())
    }
}
