//! Configuration management
//!
//! Provides unified configuration for the entire ORNA pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conditioning::glyph_network_path;
use crate::error::{OrnaError, Result};
use crate::model::{DiscriminatorConfig, GeneratorConfig};
use crate::training::TrainingConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfig,
}

/// Data-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of font strip images
    pub data_dir: String,
    /// Maximum number of fonts to load; also keys model directories
    pub block_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: "datasets/Capitals_colorGrad64/train".to_string(),
            block_size: 50,
        }
    }
}

/// Model-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding the glyph network and ORNA checkpoints
    pub models_dir: String,
    /// Epoch of the glyph network checkpoint to load
    pub glyph_epoch: usize,
    /// Explicit glyph network file, overriding the derived path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph_network: Option<String>,
    /// Generator architecture
    pub generator: GeneratorConfig,
    /// Discriminator architecture
    pub discriminator: DiscriminatorConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            models_dir: "saved_models".to_string(),
            glyph_epoch: 6500,
            glyph_network: None,
            generator: GeneratorConfig::default(),
            discriminator: DiscriminatorConfig::default(),
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from a `.toml` or `.json` file, picked by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(path),
            _ => Self::from_json(path),
        }
    }

    /// Save to a `.toml` or `.json` file, picked by extension
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => self.save_toml(path),
            _ => self.save_json(path),
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Path of the TorchScript glyph network
    pub fn glyph_network_path(&self) -> PathBuf {
        match &self.model.glyph_network {
            Some(path) => PathBuf::from(path),
            None => glyph_network_path(&self.model.models_dir, self.data.block_size, self.model.glyph_epoch),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.data.block_size == 0 {
            return Err(OrnaError::config("block size must be > 0"));
        }
        self.training.validate()?;
        self.model.generator.validate()?;
        self.model.discriminator.validate()?;
        Ok(())
    }
}

/// Create default configuration file if it doesn't exist
pub fn ensure_config_exists(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if path.exists() {
        Config::from_file(path)
    } else {
        let config = Config::default();
        config.save_file(path)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.data.block_size, 50);
        assert_eq!(config.model.generator.base_filters, 64);
        assert_eq!(config.model.discriminator.base_filters, 52);
        assert_eq!(config.training.sample_interval, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orna.toml");

        let mut config = Config::default();
        config.training.epochs = 42;
        config.save_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"training": {"epochs": 3}}"#).unwrap();
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.sample_interval, 500);
        assert_eq!(config.data.block_size, 50);
    }

    #[test]
    fn test_glyph_network_path() {
        let mut config = Config::default();
        assert_eq!(
            config.glyph_network_path(),
            PathBuf::from("saved_models/glyph_net50/6500/generator.pt")
        );

        config.model.glyph_network = Some("glyph.pt".to_string());
        assert_eq!(config.glyph_network_path(), PathBuf::from("glyph.pt"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.training.sampler.max_letters = 30;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.block_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ensure_config_exists_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = ensure_config_exists(&path).unwrap();
        assert!(path.exists());
        assert_eq!(ensure_config_exists(&path).unwrap(), created);
    }
}
