//! Training loop implementation for ORNA
//!
//! Fonts are visited in dataset order once per epoch. For every font the
//! conditioning input is rebuilt with fresh random letters, the discriminator
//! takes one step on the real pair and one on the generated pair, then the
//! generator takes one step through the frozen discriminator.

use std::path::PathBuf;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tch::{nn, Device, Tensor};
use tracing::{debug, info};

use super::combined::{CombinedTrainer, GeneratorStep};
use super::losses::{adversarial_loss, LossWeights};
use super::metrics::{LossHistory, LossRecord};
use crate::conditioning::{build_conditioning, ConditionImageSampler, GlyphPredictor, SamplerConfig};
use crate::data::glyph::array4_to_tensor;
use crate::data::FontDataset;
use crate::error::{OrnaError, Result};
use crate::model::{AdamSettings, OrnaModel};
use crate::utils::{checkpoint_root, imaging, save_checkpoint};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Write sample images every N epochs
    pub sample_interval: usize,
    /// Save a checkpoint every N epochs
    pub checkpoint_interval: usize,
    /// Directory for sample images
    pub results_dir: String,
    /// Directory for the scalar log
    pub log_dir: String,
    /// Device: "cpu" or "cuda"
    pub device: String,
    /// Seed for letter sampling and weight initialization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Draw a progress bar per epoch
    pub show_progress: bool,
    /// Optimizer for the discriminator
    pub disc_adam: AdamSettings,
    /// Optimizer for the generator
    pub gen_adam: AdamSettings,
    /// Generator objective weights
    pub loss_weights: LossWeights,
    /// Revealed-letter sampling
    pub sampler: SamplerConfig,
}

impl TrainingConfig {
    /// Check the intervals and the letter range
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(OrnaError::config("number of epochs must be > 0"));
        }
        if self.sample_interval == 0 || self.checkpoint_interval == 0 {
            return Err(OrnaError::config("sample and checkpoint intervals must be > 0"));
        }
        ConditionImageSampler::new(&self.sampler)?;
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10000,
            sample_interval: 500,
            checkpoint_interval: 500,
            results_dir: "results".to_string(),
            log_dir: "graphs/orna".to_string(),
            device: "cpu".to_string(),
            seed: None,
            show_progress: true,
            disc_adam: AdamSettings::default(),
            gen_adam: AdamSettings::default(),
            loss_weights: LossWeights::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

/// Mutable state of a training run
pub struct TrainingContext {
    /// Fonts, read-only for the whole run
    pub dataset: FontDataset,
    /// Source of letter sampling randomness
    pub rng: StdRng,
    /// Next epoch to run
    pub epoch: usize,
    /// Completed training steps
    pub step: usize,
    /// Scalar log
    pub history: LossHistory,
    /// Start of the run
    pub started: Instant,
}

impl TrainingContext {
    /// Create a context starting at epoch 0
    pub fn new(dataset: FontDataset, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            dataset,
            rng,
            epoch: 0,
            step: 0,
            history: LossHistory::new(),
            started: Instant::now(),
        }
    }

    /// Continue from a checkpointed epoch
    pub fn resume_from(mut self, epoch: usize) -> Self {
        self.epoch = epoch;
        self
    }

    /// Start from an existing scalar log
    pub fn with_history(mut self, history: LossHistory) -> Self {
        self.history = history;
        self
    }
}

/// Discriminator losses of one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscriminatorStep {
    /// Local loss, mean of the real and fake steps
    pub local: f64,
    /// Global loss, mean of the real and fake steps
    pub global: f64,
}

/// One optimizer step of the discriminator towards a constant target
fn discriminator_update(
    model: &OrnaModel,
    disc_opt: &mut nn::Optimizer,
    candidate: &Tensor,
    cond: &Tensor,
    target: f64,
) -> Result<(f64, f64)> {
    let (local, global) = model.discriminator.forward_t(candidate, cond, true);
    let local_loss = adversarial_loss(&local, target);
    let global_loss = adversarial_loss(&global, target);

    disc_opt.zero_grad();
    (&local_loss + &global_loss).backward();
    disc_opt.step();

    Ok((local_loss.f_double_value(&[])?, global_loss.f_double_value(&[])?))
}

/// Real pair towards ones, generated pair towards zeros
pub fn discriminator_step(
    model: &OrnaModel,
    disc_opt: &mut nn::Optimizer,
    real: &Tensor,
    fake: &Tensor,
    cond: &Tensor,
) -> Result<DiscriminatorStep> {
    let (real_local, real_global) = discriminator_update(model, disc_opt, real, cond, 1.0)?;
    let (fake_local, fake_global) = discriminator_update(model, disc_opt, fake, cond, 0.0)?;

    Ok(DiscriminatorStep {
        local: 0.5 * (real_local + fake_local),
        global: 0.5 * (real_global + fake_global),
    })
}

/// Discriminator step followed by a generator step on one font
pub fn train_step(
    model: &mut OrnaModel,
    combined: &CombinedTrainer,
    gen_opt: &mut nn::Optimizer,
    disc_opt: &mut nn::Optimizer,
    real: &Tensor,
    cond: &Tensor,
) -> Result<(DiscriminatorStep, GeneratorStep, Tensor)> {
    let fake = model.generate(cond);
    let d_step = discriminator_step(model, disc_opt, real, &fake, cond)?;
    let g_step = combined.step(model, gen_opt, real, cond)?;
    Ok((d_step, g_step, fake))
}

/// ORNA trainer
pub struct Trainer {
    config: TrainingConfig,
    device: Device,
    sampler: ConditionImageSampler,
    combined: CombinedTrainer,
    checkpoint_root: PathBuf,
}

impl Trainer {
    /// Create a new trainer
    ///
    /// `models_dir` and `block_size` locate the checkpoint directories.
    pub fn new(config: TrainingConfig, models_dir: &str, block_size: usize, device: Device) -> Result<Self> {
        config.validate()?;
        let sampler = ConditionImageSampler::new(&config.sampler)?;
        let combined = CombinedTrainer::new(config.loss_weights);
        Ok(Self {
            config,
            device,
            sampler,
            combined,
            checkpoint_root: checkpoint_root(models_dir, block_size),
        })
    }

    /// Train the ORNA model until the configured epoch count
    ///
    /// # Arguments
    ///
    /// * `model` - ORNA model to train
    /// * `predictor` - Frozen glyph network
    /// * `ctx` - Dataset, randomness and loss history of the run
    pub fn train(
        &self,
        model: &mut OrnaModel,
        predictor: &dyn GlyphPredictor,
        ctx: &mut TrainingContext,
    ) -> Result<()> {
        let mut gen_opt = model.gen_optimizer(&self.config.gen_adam)?;
        let mut disc_opt = model.disc_optimizer(&self.config.disc_adam)?;

        let num_fonts = ctx.dataset.len();
        info!(
            "Starting training at epoch {} of {}, {} fonts per epoch",
            ctx.epoch, self.config.epochs, num_fonts
        );

        std::fs::create_dir_all(&self.config.log_dir)?;

        while ctx.epoch < self.config.epochs {
            let epoch = ctx.epoch;
            let pb = self.progress_bar(num_fonts);

            for font_idx in 0..num_fonts {
                let record = self.train_font(model, predictor, ctx, font_idx, &mut gen_opt, &mut disc_opt)?;

                pb.set_message(format!(
                    "D: {:.4}/{:.4} G: {:.4}/{:.4}/{:.4}",
                    record.dloss_local, record.dloss_global, record.gloss_local, record.gloss_global, record.gloss_l1
                ));
                pb.inc(1);
            }
            pb.finish_and_clear();

            if let Some(means) = ctx.history.epoch_mean(epoch) {
                let summary: Vec<String> = means.iter().map(|(name, v)| format!("{}={:.4}", name, v)).collect();
                info!(
                    "Epoch {}/{}: {} time: {:?}",
                    epoch + 1,
                    self.config.epochs,
                    summary.join(", "),
                    ctx.started.elapsed()
                );
            }

            if epoch % self.config.checkpoint_interval == 0 {
                save_checkpoint(model, ctx.history.latest(), epoch, &self.checkpoint_root)?;
                self.save_scalars(&ctx.history)?;
            }

            ctx.epoch += 1;
        }

        self.save_scalars(&ctx.history)?;
        info!("Training complete after {} steps", ctx.step);
        Ok(())
    }

    /// Condition, update and log one font
    fn train_font(
        &self,
        model: &mut OrnaModel,
        predictor: &dyn GlyphPredictor,
        ctx: &mut TrainingContext,
        font_idx: usize,
        gen_opt: &mut nn::Optimizer,
        disc_opt: &mut nn::Optimizer,
    ) -> Result<LossRecord> {
        let epoch = ctx.epoch;
        let TrainingContext { dataset, rng, history, .. } = ctx;
        let font = dataset
            .get(font_idx)
            .ok_or_else(|| OrnaError::config(format!("font {} out of range", font_idx)))?;

        let conditioning = build_conditioning(&self.sampler, predictor, &font.glyphs, rng)?;
        let cond = array4_to_tensor(&conditioning.rgb, self.device);
        let real = font.color_tensor(self.device);

        let (d_step, g_step, fake) = train_step(model, &self.combined, gen_opt, disc_opt, &real, &cond)?;

        let record = LossRecord {
            epoch,
            font: font_idx,
            dloss_local: d_step.local,
            dloss_global: d_step.global,
            gloss_local: g_step.local,
            gloss_global: g_step.global,
            gloss_l1: g_step.l1,
        };
        history.push(record);
        ctx.step += 1;

        debug!(
            "[Epoch {}] [Font {}] [D local: {:.6}, global: {:.6}] [G local: {:.6}, global: {:.6}, L1: {:.6}, total: {:.6}] letters: {:?}",
            epoch,
            font_idx,
            d_step.local,
            d_step.global,
            g_step.local,
            g_step.global,
            g_step.l1,
            g_step.total,
            conditioning.selected
        );

        if epoch % self.config.sample_interval == 0 {
            let dir = imaging::sample_dir(&self.config.results_dir, epoch);
            imaging::save_sample_triples(&dir, font_idx, &fake, &real, &conditioning.composite)?;
        }

        Ok(record)
    }

    /// Location of the scalar CSV
    pub fn scalars_path(&self) -> PathBuf {
        PathBuf::from(&self.config.log_dir).join("scalars.csv")
    }

    fn save_scalars(&self, history: &LossHistory) -> Result<()> {
        history.save_csv(self.scalars_path())
    }

    /// Scalar log of a previous run up to and including `epoch`
    ///
    /// Steps after the checkpoint are dropped since they are trained again.
    /// A missing log yields an empty history.
    pub fn resume_history(&self, epoch: usize) -> Result<LossHistory> {
        let path = self.scalars_path();
        if !path.is_file() {
            return Ok(LossHistory::new());
        }
        let mut history = LossHistory::load_csv(&path)?;
        history.retain_through(epoch);
        info!("Kept {} logged steps from {}", history.len(), path.display());
        Ok(history)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map(|s| s.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    /// Get configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Directory checkpoints are written under
    pub fn checkpoint_root(&self) -> &PathBuf {
        &self.checkpoint_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscriminatorConfig, GeneratorConfig};
    use tch::Kind;

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 10000);
        assert_eq!(config.sample_interval, 500);
        assert_eq!(config.gen_adam.beta1, 0.5);
        assert_eq!(config.loss_weights.global, 10.0);
    }

    #[test]
    fn test_trainer_rejects_zero_intervals() {
        let config = TrainingConfig {
            sample_interval: 0,
            ..Default::default()
        };
        assert!(Trainer::new(config, "saved_models", 50, Device::Cpu).is_err());

        let config = TrainingConfig {
            checkpoint_interval: 0,
            ..Default::default()
        };
        assert!(Trainer::new(config, "saved_models", 50, Device::Cpu).is_err());
    }

    #[test]
    fn test_resume_history_keeps_checkpointed_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainingConfig {
            log_dir: dir.path().to_string_lossy().to_string(),
            ..Default::default()
        };
        let trainer = Trainer::new(config, "saved_models", 50, Device::Cpu).unwrap();
        assert!(trainer.resume_history(3).unwrap().is_empty());

        let mut history = LossHistory::new();
        for epoch in 0..5 {
            history.push(LossRecord {
                epoch,
                font: 0,
                dloss_local: 0.5,
                dloss_global: 0.5,
                gloss_local: 1.0,
                gloss_global: 1.0,
                gloss_l1: 0.1,
            });
        }
        history.save_csv(trainer.scalars_path()).unwrap();

        let kept = trainer.resume_history(3).unwrap();
        assert_eq!(kept.len(), 4);
        assert_eq!(kept.latest().unwrap().epoch, 3);
    }

    #[test]
    fn test_discriminator_step_reduces_loss_on_fixed_batch() {
        tch::manual_seed(5);
        let gen_config = GeneratorConfig {
            base_filters: 4,
            ..Default::default()
        };
        let disc_config = DiscriminatorConfig {
            base_filters: 4,
            ..Default::default()
        };
        let model = OrnaModel::new(gen_config, disc_config, Device::Cpu).unwrap();
        let settings = AdamSettings {
            learning_rate: 1e-3,
            ..Default::default()
        };
        let mut disc_opt = model.disc_optimizer(&settings).unwrap();

        let real = Tensor::rand([4, 3, 64, 64], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;

        let mut losses = Vec::new();
        for _ in 0..30 {
            let (local, global) = discriminator_update(&model, &mut disc_opt, &real, &real, 1.0).unwrap();
            losses.push(local + global);
        }

        let first = losses[0];
        let last = losses[losses.len() - 1];
        assert!(last < first, "loss went from {} to {}", first, last);
    }
}
