//! Font dataset loading
//!
//! Each font file is a single strip image, `GLYPH_SIZE` pixels high and
//! `ALPHABET_SIZE * GLYPH_SIZE` wide, holding the letters left to right.
//! The whole dataset is decoded into memory before training starts.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::{Array3, Array4};
use tch::{Device, Tensor};
use tracing::{debug, info};

use super::glyph::{
    check_glyph_tensor, nhwc_to_nchw, normalize_pixel, GlyphTensor, ALPHABET_SIZE, GLYPH_SIZE,
    RGB_CHANNELS,
};
use crate::error::{OrnaError, Result};

/// One font: its grayscale glyph tensor and its colored ground truth
#[derive(Debug, Clone)]
pub struct FontSample {
    /// File stem the font was loaded from
    pub name: String,
    /// Grayscale glyphs, `(64, 64, 26)`
    pub glyphs: GlyphTensor,
    /// Colored glyphs, `(26, 64, 64, 3)`
    pub color: Array4<f32>,
}

impl FontSample {
    /// Build a sample from already normalized arrays
    pub fn new(name: impl Into<String>, glyphs: GlyphTensor, color: Array4<f32>) -> Result<Self> {
        check_glyph_tensor(&glyphs)?;
        let expected = [ALPHABET_SIZE, GLYPH_SIZE, GLYPH_SIZE, RGB_CHANNELS];
        if color.shape() != expected {
            return Err(OrnaError::shape(&expected, color.shape()));
        }
        Ok(Self {
            name: name.into(),
            glyphs,
            color,
        })
    }

    /// Decode a font strip image
    pub fn from_image(name: impl Into<String>, img: &DynamicImage) -> Result<Self> {
        let name = name.into();
        let (width, height) = (img.width() as usize, img.height() as usize);
        if height != GLYPH_SIZE || width != ALPHABET_SIZE * GLYPH_SIZE {
            return Err(OrnaError::config(format!(
                "font '{}' is {}x{}, expected {}x{}",
                name,
                width,
                height,
                ALPHABET_SIZE * GLYPH_SIZE,
                GLYPH_SIZE
            )));
        }

        let luma = img.to_luma8();
        let rgb = img.to_rgb8();

        let glyphs = Array3::from_shape_fn((GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE), |(y, x, letter)| {
            let px = luma.get_pixel((letter * GLYPH_SIZE + x) as u32, y as u32);
            normalize_pixel(px.0[0])
        });

        let color = Array4::from_shape_fn(
            (ALPHABET_SIZE, GLYPH_SIZE, GLYPH_SIZE, RGB_CHANNELS),
            |(letter, y, x, c)| {
                let px = rgb.get_pixel((letter * GLYPH_SIZE + x) as u32, y as u32);
                normalize_pixel(px.0[c])
            },
        );

        Self::new(name, glyphs, color)
    }

    /// Load a font strip from disk
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let img = image::open(path)?;
        Self::from_image(name, &img)
    }

    /// Ground-truth color glyphs as an NCHW tensor `(26, 3, 64, 64)`
    pub fn color_tensor(&self, device: Device) -> Tensor {
        nhwc_to_nchw(&self.color, device)
    }
}

/// In-memory collection of fonts, read-only once loaded
#[derive(Debug, Clone, Default)]
pub struct FontDataset {
    fonts: Vec<FontSample>,
}

impl FontDataset {
    /// Create a dataset from already decoded fonts
    pub fn from_fonts(fonts: Vec<FontSample>) -> Self {
        Self { fonts }
    }

    /// Load up to `max_fonts` font strips from a directory, in file name order
    pub fn load_dir(dir: impl AsRef<Path>, max_fonts: usize) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(OrnaError::config(format!(
                "dataset directory {} does not exist",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut fonts = Vec::with_capacity(files.len().min(max_fonts));
        for path in files.into_iter().take(max_fonts) {
            let font = FontSample::load(&path)?;
            debug!("Loaded font {}", font.name);
            fonts.push(font);
        }

        if fonts.is_empty() {
            return Err(OrnaError::config(format!(
                "no fonts found in {}",
                dir.display()
            )));
        }

        info!("Loaded {} fonts from {}", fonts.len(), dir.display());
        Ok(Self { fonts })
    }

    /// Number of fonts
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Font by position
    pub fn get(&self, index: usize) -> Option<&FontSample> {
        self.fonts.get(index)
    }

    /// Iterate over fonts in load order
    pub fn iter(&self) -> impl Iterator<Item = &FontSample> {
        self.fonts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn strip_image() -> DynamicImage {
        let width = (ALPHABET_SIZE * GLYPH_SIZE) as u32;
        let img = RgbImage::from_fn(width, GLYPH_SIZE as u32, |x, _| {
            let letter = (x as usize / GLYPH_SIZE) as u8;
            Rgb([letter * 9, 255, 0])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_from_image_shapes_and_range() {
        let font = FontSample::from_image("strip", &strip_image()).unwrap();

        assert_eq!(font.glyphs.shape(), &[GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE]);
        assert_eq!(font.color.shape(), &[ALPHABET_SIZE, GLYPH_SIZE, GLYPH_SIZE, RGB_CHANNELS]);
        assert!(font.glyphs.iter().all(|v| (-1.0..=1.0).contains(v)));

        // red channel encodes the letter position
        assert_eq!(font.color[[0, 5, 5, 0]], -1.0);
        assert_eq!(font.color[[3, 5, 5, 0]], normalize_pixel(27));
        assert_eq!(font.color[[3, 5, 5, 1]], 1.0);
    }

    #[test]
    fn test_from_image_rejects_wrong_geometry() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        assert!(FontSample::from_image("square", &img).is_err());
    }

    #[test]
    fn test_load_dir_sorted_and_limited() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.png"] {
            strip_image().save(dir.path().join(name)).unwrap();
        }

        let dataset = FontDataset::load_dir(dir.path(), 2).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(0).unwrap().name, "a");
        assert_eq!(dataset.get(1).unwrap().name, "b");
    }

    #[test]
    fn test_load_dir_missing() {
        assert!(FontDataset::load_dir("/nonexistent/fonts", 10).is_err());
    }

    #[test]
    fn test_color_tensor_layout() {
        let font = FontSample::from_image("strip", &strip_image()).unwrap();
        let tensor = font.color_tensor(Device::Cpu);
        assert_eq!(tensor.size(), vec![26, 3, 64, 64]);
    }
}
