//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load utilities
//! - Sample image output

mod checkpoint;
mod config;
pub mod imaging;

pub use checkpoint::{
    checkpoint_dir, checkpoint_root, find_latest_checkpoint, load_checkpoint, load_checkpoint_meta,
    save_checkpoint, CheckpointMeta,
};
pub use config::{ensure_config_exists, Config, DataConfig, ModelConfig};
