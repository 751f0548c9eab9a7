//! Model module containing the GAN architecture
//!
//! This module provides:
//! - U-Net generator conditioned on composited glyph predictions
//! - Dual-scale (local/global) patch discriminator
//! - ORNA wrapper pairing both networks with their variable stores

mod discriminator;
mod generator;
mod layers;
mod orna;

pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use generator::{Generator, GeneratorConfig};
pub use orna::{AdamSettings, OrnaModel};
