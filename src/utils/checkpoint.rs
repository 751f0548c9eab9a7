//! Checkpoint save/load utilities
//!
//! A checkpoint directory holds, for each network, an architecture
//! description (`*.json`) and a weight file (`*.pt`), plus `meta.json`.
//! Directories are keyed by block size and epoch:
//! `{models_dir}/orna_net{block_size}/{epoch}`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tch::Device;

use crate::error::{OrnaError, Result};
use crate::model::{DiscriminatorConfig, GeneratorConfig, OrnaModel};
use crate::training::LossRecord;

const GENERATOR_NAME: &str = "generator_orna";
const DISCRIMINATOR_NAME: &str = "discriminator_orna";
const META_FILE: &str = "meta.json";

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Epoch the checkpoint was taken at
    pub epoch: usize,
    /// Losses of the last step before the checkpoint
    pub latest: Option<LossRecord>,
    /// Timestamp of checkpoint
    pub timestamp: String,
}

/// Root directory of all checkpoints for a block size
pub fn checkpoint_root(models_dir: impl AsRef<Path>, block_size: usize) -> PathBuf {
    models_dir.as_ref().join(format!("orna_net{}", block_size))
}

/// Directory of the checkpoint taken at `epoch`
pub fn checkpoint_dir(root: impl AsRef<Path>, epoch: usize) -> PathBuf {
    root.as_ref().join(epoch.to_string())
}

fn weights_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.pt", name))
}

fn arch_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", name))
}

/// Save a complete checkpoint (architectures, weights and metadata)
///
/// # Returns
///
/// Path to the checkpoint directory
pub fn save_checkpoint(
    model: &OrnaModel,
    latest: Option<&LossRecord>,
    epoch: usize,
    root: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dir = checkpoint_dir(root, epoch);
    std::fs::create_dir_all(&dir)?;

    std::fs::write(
        arch_path(&dir, GENERATOR_NAME),
        serde_json::to_string_pretty(model.generator.config())?,
    )?;
    std::fs::write(
        arch_path(&dir, DISCRIMINATOR_NAME),
        serde_json::to_string_pretty(model.discriminator.config())?,
    )?;
    model.save(
        weights_path(&dir, GENERATOR_NAME),
        weights_path(&dir, DISCRIMINATOR_NAME),
    )?;

    let meta = CheckpointMeta {
        epoch,
        latest: latest.copied(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    std::fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;

    tracing::info!("Saved checkpoint to {}", dir.display());
    Ok(dir)
}

/// Load checkpoint metadata
pub fn load_checkpoint_meta(dir: impl AsRef<Path>) -> Result<CheckpointMeta> {
    let content = std::fs::read_to_string(dir.as_ref().join(META_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(OrnaError::config(format!("missing checkpoint file {}", path.display())));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Rebuild both networks from a checkpoint directory
pub fn load_checkpoint(dir: impl AsRef<Path>, device: Device) -> Result<(OrnaModel, CheckpointMeta)> {
    let dir = dir.as_ref();
    let gen_config: GeneratorConfig = read_json(&arch_path(dir, GENERATOR_NAME))?;
    let disc_config: DiscriminatorConfig = read_json(&arch_path(dir, DISCRIMINATOR_NAME))?;

    let mut model = OrnaModel::new(gen_config, disc_config, device)?;
    model.load(
        weights_path(dir, GENERATOR_NAME),
        weights_path(dir, DISCRIMINATOR_NAME),
    )?;

    let meta = load_checkpoint_meta(dir)?;
    tracing::info!("Loaded checkpoint from {} (epoch {})", dir.display(), meta.epoch);
    Ok((model, meta))
}

/// Find the checkpoint with the highest epoch under `root`
pub fn find_latest_checkpoint(root: impl AsRef<Path>) -> Option<PathBuf> {
    let root = root.as_ref();
    std::fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let epoch: usize = e.file_name().to_str()?.parse().ok()?;
            Some((epoch, e.path()))
        })
        .max_by_key(|(epoch, _)| *epoch)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Kind, Tensor};

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
    fn test_checkpoint_reproduces_generator_outputs() {
        tch::manual_seed(11);
        let dir = tempfile::tempdir().unwrap();
        let root = checkpoint_root(dir.path(), 50);

        let model = small_model();
        let saved = save_checkpoint(&model, None, 500, &root).unwrap();
        assert_eq!(saved, root.join("500"));

        let (loaded, meta) = load_checkpoint(&saved, Device::Cpu).unwrap();
        assert_eq!(meta.epoch, 500);
        assert_eq!(loaded.generator.config(), model.generator.config());

        let cond = Tensor::rand([2, 3, 64, 64], (Kind::Float, Device::Cpu));
        let expected = model.generate(&cond);
        let actual = loaded.generate(&cond);
        assert!(expected.allclose(&actual, 1e-6, 1e-6, false));
    }

    #[test]
    fn test_missing_architecture_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_checkpoint(dir.path(), Device::Cpu);
        assert!(matches!(result, Err(OrnaError::Config(_))));
    }

    #[test]
    fn test_find_latest_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0", "500", "1000", "notes"] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
        }

        let latest = find_latest_checkpoint(dir.path()).unwrap();
        assert_eq!(latest, dir.path().join("1000"));
        assert!(find_latest_checkpoint(dir.path().join("missing")).is_none());
    }
}
