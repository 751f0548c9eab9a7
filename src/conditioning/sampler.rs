//! Masked query batches for the glyph network
//!
//! For a font, a random subset of `k` letters is revealed. Entry `i < k` of the
//! batch reveals every selected letter except `selected[i]`, which is blanked,
//! asking the glyph network to reconstruct that letter from the others. The
//! last entry reveals the whole subset.

use std::ops::Range;

use ndarray::{s, Array4, Axis};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::glyph::{check_glyph_tensor, letter_channel, GlyphTensor, ALPHABET_SIZE, BLANK_SENTINEL};
use crate::error::{OrnaError, Result};

/// Masked variants of one glyph tensor plus the revealed letter indices
#[derive(Debug, Clone)]
pub struct ConditioningBatch {
    /// `(k + 1, 64, 64, 26)`; the last entry is the full reveal
    pub entries: Array4<f32>,
    /// Selected letters, in the order the masked entries use them
    pub selected: Vec<usize>,
}

impl ConditioningBatch {
    /// Number of masked entries (`k`)
    pub fn num_masked(&self) -> usize {
        self.selected.len()
    }

    /// Total number of entries (`k + 1`)
    pub fn len(&self) -> usize {
        self.entries.len_of(Axis(0))
    }

    /// Check if the batch has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Smallest number of revealed letters (inclusive)
    pub min_letters: usize,
    /// Largest number of revealed letters (exclusive)
    pub max_letters: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_letters: 4,
            max_letters: 8,
        }
    }
}

/// Builds [`ConditioningBatch`]es from glyph tensors
#[derive(Debug, Clone)]
pub struct ConditionImageSampler {
    letters: Range<usize>,
}

impl ConditionImageSampler {
    /// Create a sampler drawing `k` from `min_letters..max_letters`
    pub fn new(config: &SamplerConfig) -> Result<Self> {
        if config.min_letters >= config.max_letters {
            return Err(OrnaError::config(format!(
                "empty letter range {}..{}",
                config.min_letters, config.max_letters
            )));
        }
        // k must stay strictly below the alphabet size
        if config.max_letters > ALPHABET_SIZE {
            return Err(OrnaError::config(format!(
                "cannot reveal up to {} distinct letters from an alphabet of {}",
                config.max_letters - 1,
                ALPHABET_SIZE
            )));
        }
        Ok(Self {
            letters: config.min_letters..config.max_letters,
        })
    }

    /// Range `k` is drawn from
    pub fn letter_range(&self) -> Range<usize> {
        self.letters.clone()
    }

    /// Draw `k` and the revealed letters, then build the batch
    pub fn sample<R: Rng + ?Sized>(&self, glyphs: &GlyphTensor, rng: &mut R) -> Result<ConditioningBatch> {
        check_glyph_tensor(glyphs)?;

        let k = rng.gen_range(self.letters.clone());
        let selected = index::sample(rng, ALPHABET_SIZE, k).into_vec();
        build_batch(glyphs, selected)
    }
}

/// Build the masked batch for an explicit selection
pub fn build_batch(glyphs: &GlyphTensor, selected: Vec<usize>) -> Result<ConditioningBatch> {
    check_glyph_tensor(glyphs)?;
    let (height, width, channels) = glyphs.dim();

    let mut revealed = Vec::with_capacity(selected.len());
    for (pos, &letter) in selected.iter().enumerate() {
        if selected[..pos].contains(&letter) {
            return Err(OrnaError::config(format!("letter {} selected twice", letter)));
        }
        revealed.push(letter_channel(glyphs, letter)?);
    }

    let k = selected.len();
    let mut entries = Array4::from_elem((k + 1, height, width, channels), BLANK_SENTINEL);

    for (i, mut entry) in entries.outer_iter_mut().enumerate() {
        for (&letter, channel) in selected.iter().zip(&revealed) {
            entry.slice_mut(s![.., .., letter]).assign(channel);
        }
        if i < k {
            entry.slice_mut(s![.., .., selected[i]]).fill(BLANK_SENTINEL);
        }
    }

    Ok(ConditioningBatch { entries, selected })
}
