//! End-to-end tests of conditioning and training with stub glyph networks

use ndarray::{Array3, Array4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::Device;

use orna_gan::conditioning::{build_batch, build_conditioning, composite, ConditionImageSampler, SamplerConfig};
use orna_gan::data::{FontDataset, FontSample, ALPHABET_SIZE, GLYPH_SIZE, RGB_CHANNELS};
use orna_gan::model::{DiscriminatorConfig, GeneratorConfig, OrnaModel};
use orna_gan::training::{LossHistory, Trainer, TrainingConfig, TrainingContext};
use orna_gan::utils::{checkpoint_root, find_latest_checkpoint, load_checkpoint};
use orna_gan::{GlyphPredictor, Result};

/// Returns its input unchanged
struct IdentityPredictor;

impl GlyphPredictor for IdentityPredictor {
    fn predict(&self, batch: &Array4<f32>) -> Result<Array4<f32>> {
        Ok(batch.clone())
    }
}

/// Always predicts the complete font it was built with
struct OraclePredictor {
    glyphs: Array3<f32>,
}

impl GlyphPredictor for OraclePredictor {
    fn predict(&self, batch: &Array4<f32>) -> Result<Array4<f32>> {
        let count = batch.shape()[0];
        let (h, w, c) = self.glyphs.dim();
        Ok(Array4::from_shape_fn((count, h, w, c), |(_, y, x, l)| self.glyphs[[y, x, l]]))
    }
}

fn zero_glyphs() -> Array3<f32> {
    Array3::zeros((GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE))
}

fn synthetic_font(name: &str, seed: f32) -> FontSample {
    let glyphs = Array3::from_shape_fn((GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE), |(y, x, l)| {
        ((y + x + l) as f32 * 0.1 + seed).sin()
    });
    let color = Array4::from_shape_fn(
        (ALPHABET_SIZE, GLYPH_SIZE, GLYPH_SIZE, RGB_CHANNELS),
        |(l, y, x, c)| ((y * 3 + x + l + c) as f32 * 0.05 + seed).cos(),
    );
    FontSample::new(name, glyphs, color).unwrap()
}

fn tiny_model() -> OrnaModel {
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
fn test_oracle_composite_reproduces_source() {
    let glyphs = zero_glyphs();
    let sampler = ConditionImageSampler::new(&SamplerConfig::default()).unwrap();
    let predictor = OraclePredictor { glyphs: glyphs.clone() };
    let mut rng = StdRng::seed_from_u64(17);

    let conditioning = build_conditioning(&sampler, &predictor, &glyphs, &mut rng).unwrap();

    assert!(sampler.letter_range().contains(&conditioning.selected.len()));
    assert_eq!(conditioning.composite.dim(), (GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE));
    assert!(conditioning.composite.iter().all(|&v| v == 0.0));
    assert_eq!(
        conditioning.rgb.dim(),
        (ALPHABET_SIZE, RGB_CHANNELS, GLYPH_SIZE, GLYPH_SIZE)
    );
}

#[test]
fn test_identity_composite_of_five_letters() {
    let glyphs = zero_glyphs();
    let batch = build_batch(&glyphs, vec![0, 4, 9, 13, 25]).unwrap();
    assert_eq!(batch.len(), 6);

    let predictions = IdentityPredictor.predict(&batch.entries).unwrap();
    let fused = composite(&predictions, &batch.selected).unwrap();

    // revealed letters come back blanked from their masked entry and every
    // other letter was never revealed, so nothing of the zero font survives
    assert!(fused.iter().all(|&v| v == 1.0));
}

#[test]
fn test_short_training_run_and_resume() {
    tch::manual_seed(7);
    let dir = tempfile::tempdir().unwrap();
    let models_dir = dir.path().join("saved_models");
    let results_dir = dir.path().join("results");
    let log_dir = dir.path().join("graphs");

    let dataset = FontDataset::from_fonts(vec![synthetic_font("a", 0.0), synthetic_font("b", 1.0)]);
    let config = TrainingConfig {
        epochs: 2,
        sample_interval: 1,
        checkpoint_interval: 1,
        results_dir: results_dir.to_string_lossy().to_string(),
        log_dir: log_dir.to_string_lossy().to_string(),
        seed: Some(3),
        show_progress: false,
        ..Default::default()
    };

    let mut model = tiny_model();
    let mut ctx = TrainingContext::new(dataset.clone(), config.seed);
    let trainer = Trainer::new(config.clone(), models_dir.to_str().unwrap(), 2, Device::Cpu).unwrap();
    trainer.train(&mut model, &IdentityPredictor, &mut ctx).unwrap();

    assert_eq!(ctx.epoch, 2);
    assert_eq!(ctx.history.len(), 4);
    for record in ctx.history.records() {
        assert!(record.dloss_local.is_finite());
        assert!(record.gloss_l1.is_finite());
    }

    let sample_dir = results_dir.join("orna1");
    assert!(sample_dir.join("generated_1_25.png").is_file());
    assert!(sample_dir.join("groundTruth0_0.png").is_file());
    assert!(sample_dir.join("glyphnet1_3.png").is_file());

    let scalars = LossHistory::load_csv(log_dir.join("scalars.csv")).unwrap();
    assert_eq!(scalars.len(), 4);

    let root = checkpoint_root(&models_dir, 2);
    assert!(root.join("0").is_dir());
    let latest = find_latest_checkpoint(&root).unwrap();
    assert_eq!(latest, root.join("1"));

    let (mut resumed, meta) = load_checkpoint(&latest, Device::Cpu).unwrap();
    assert_eq!(meta.epoch, 1);

    let config = TrainingConfig { epochs: 3, ..config };
    let trainer = Trainer::new(config, models_dir.to_str().unwrap(), 2, Device::Cpu).unwrap();
    let history = trainer.resume_history(meta.epoch).unwrap();
    assert_eq!(history.len(), 4);
    let mut ctx = TrainingContext::new(dataset, Some(4))
        .resume_from(meta.epoch + 1)
        .with_history(history);
    trainer.train(&mut resumed, &IdentityPredictor, &mut ctx).unwrap();

    assert_eq!(ctx.history.len(), 6);
    assert!(root.join("2").is_dir());

    // the scalar log spans both runs
    let scalars = LossHistory::load_csv(log_dir.join("scalars.csv")).unwrap();
    assert_eq!(scalars.len(), 6);
    let epochs: Vec<usize> = scalars.records().iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![0, 0, 1, 1, 2, 2]);
}
