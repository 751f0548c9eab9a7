//! ORNA glyph GAN
//!
//! Main entry point providing CLI interface for:
//! - Training the ORNA model against a frozen glyph network
//! - Rendering samples from a checkpoint
//! - Writing a default configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use orna_gan::{
    conditioning::{build_conditioning, ConditionImageSampler, TorchScriptGlyphPredictor},
    data::{glyph::array4_to_tensor, FontDataset},
    model::OrnaModel,
    training::{LossHistory, Trainer, TrainingContext},
    utils::{checkpoint_root, find_latest_checkpoint, imaging, load_checkpoint, Config},
};

/// Conditional GAN for ornamented glyphs
#[derive(Parser)]
#[command(name = "orna_gan")]
#[command(version = "0.1.0")]
#[command(about = "Train a GAN that colors and ornaments glyph network predictions")]
struct Cli {
    /// Path to configuration file (.toml or .json)
    #[arg(short, long, default_value = "orna.toml")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the ORNA model
    Train {
        /// Number of epochs, overriding the configuration
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Directory of font strip images, overriding the configuration
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Resume from a checkpoint directory, or "latest"
        #[arg(long)]
        resume: Option<String>,
    },

    /// Render generated, ground truth and glyph network images from a checkpoint
    Sample {
        /// Checkpoint directory; defaults to the latest one
        #[arg(long)]
        checkpoint: Option<String>,

        /// Number of fonts to render
        #[arg(short, long, default_value = "1")]
        fonts: usize,

        /// Output directory
        #[arg(short, long, default_value = "samples")]
        output: String,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path
        #[arg(short, long, default_value = "orna.toml")]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = cli.command.unwrap_or(Commands::Train {
        epochs: None,
        data_dir: None,
        resume: None,
    });

    match command {
        Commands::Train {
            epochs,
            data_dir,
            resume,
        } => {
            train_model(&cli.config, epochs, data_dir, resume)?;
        }
        Commands::Sample {
            checkpoint,
            fonts,
            output,
        } => {
            render_samples(&cli.config, checkpoint, fonts, &output)?;
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

fn load_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        Config::from_file(config_path).with_context(|| format!("reading {}", config_path))
    } else {
        info!("Config file not found, using defaults");
        Ok(Config::default())
    }
}

fn resolve_checkpoint(config: &Config, requested: Option<String>) -> Result<PathBuf> {
    let root = checkpoint_root(&config.model.models_dir, config.data.block_size);
    match requested.as_deref() {
        None | Some("latest") => find_latest_checkpoint(&root)
            .with_context(|| format!("no checkpoints under {}", root.display())),
        Some(dir) => Ok(PathBuf::from(dir)),
    }
}

/// Train the ORNA model
fn train_model(
    config_path: &str,
    epochs: Option<usize>,
    data_dir: Option<String>,
    resume: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(epochs) = epochs {
        config.training.epochs = epochs;
    }
    if let Some(data_dir) = data_dir {
        config.data.data_dir = data_dir;
    }
    config.validate()?;

    let device = config.get_device();
    info!("Using device: {:?}", device);

    if let Some(seed) = config.training.seed {
        tch::manual_seed(seed as i64);
    }

    info!("Loading fonts from {}", config.data.data_dir);
    let dataset = FontDataset::load_dir(&config.data.data_dir, config.data.block_size)?;
    info!("Loaded {} fonts", dataset.len());

    let predictor = TorchScriptGlyphPredictor::load(config.glyph_network_path(), device)?;

    let (mut model, start_epoch) = match resume {
        Some(requested) => {
            let dir = resolve_checkpoint(&config, Some(requested))?;
            let (model, meta) = load_checkpoint(&dir, device)?;
            info!("Resumed from epoch {}", meta.epoch);
            (model, meta.epoch + 1)
        }
        None => (
            OrnaModel::new(
                config.model.generator.clone(),
                config.model.discriminator.clone(),
                device,
            )?,
            0,
        ),
    };

    let trainer = Trainer::new(
        config.training.clone(),
        &config.model.models_dir,
        config.data.block_size,
        device,
    )?;
    let history = match start_epoch {
        0 => LossHistory::new(),
        next => trainer.resume_history(next - 1)?,
    };
    let mut ctx = TrainingContext::new(dataset, config.training.seed)
        .resume_from(start_epoch)
        .with_history(history);

    trainer.train(&mut model, &predictor, &mut ctx)?;

    if let Some(latest) = ctx.history.latest() {
        info!(
            "Final losses: D local={:.4} global={:.4}, G local={:.4} global={:.4} L1={:.4}",
            latest.dloss_local, latest.dloss_global, latest.gloss_local, latest.gloss_global, latest.gloss_l1
        );
    }
    info!("Checkpoints in {}", trainer.checkpoint_root().display());

    Ok(())
}

/// Render samples from a trained checkpoint
fn render_samples(config_path: &str, checkpoint: Option<String>, fonts: usize, output: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let device = config.get_device();

    let dir = resolve_checkpoint(&config, checkpoint)?;
    let (model, meta) = load_checkpoint(&dir, device)?;
    info!("Loaded model from {} (epoch {})", dir.display(), meta.epoch);

    let dataset = FontDataset::load_dir(&config.data.data_dir, fonts.min(config.data.block_size))?;
    let predictor = TorchScriptGlyphPredictor::load(config.glyph_network_path(), device)?;
    let sampler = ConditionImageSampler::new(&config.training.sampler)?;
    let mut rng = match config.training.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for (idx, font) in dataset.iter().enumerate() {
        let conditioning = build_conditioning(&sampler, &predictor, &font.glyphs, &mut rng)?;
        let cond = array4_to_tensor(&conditioning.rgb, device);
        let fake = model.generate(&cond);
        let real = font.color_tensor(device);

        let written = imaging::save_sample_triples(output, idx, &fake, &real, &conditioning.composite)?;
        info!(
            "Rendered {} letters of {} from letters {:?}",
            written, font.name, conditioning.selected
        );
    }

    info!("Saved samples to {}", output);
    Ok(())
}

/// Initialize default configuration file
fn init_config(output_path: &str) -> Result<()> {
    let config = Config::default();
    config.save_file(output_path)?;
    info!("Created default configuration at {}", output_path);
    Ok(())
}
