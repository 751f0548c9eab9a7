//! Data module for font glyph sets
//!
//! This module provides:
//! - Glyph tensor layout constants and host/device conversions
//! - Font strip decoding and the in-memory dataset

mod dataset;
pub mod glyph;

pub use dataset::{FontDataset, FontSample};
pub use glyph::{
    check_glyph_tensor, denormalize_pixel, letter_channel, normalize_pixel, GlyphTensor,
    ALPHABET_SIZE, BLANK_SENTINEL, GLYPH_SIZE, RGB_CHANNELS,
};
