//! Glyph tensor layout and host/device conversions
//!
//! Glyph sets live on the host as `ndarray` arrays in channel-last layout:
//! a grayscale font is `(GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE)` and the
//! color stack is `(ALPHABET_SIZE, GLYPH_SIZE, GLYPH_SIZE, RGB_CHANNELS)`.
//! The networks consume NCHW `tch` tensors.

use ndarray::{Array3, Array4, ArrayView2, Axis};
use tch::{Device, Kind, Tensor};

use crate::error::{OrnaError, Result};

/// Number of letters in the alphabet (one channel per letter)
pub const ALPHABET_SIZE: usize = 26;

/// Height and width of a single glyph cell in pixels
pub const GLYPH_SIZE: usize = 64;

/// Channels of a color glyph image
pub const RGB_CHANNELS: usize = 3;

/// Value used to blank a channel before querying the glyph network
pub const BLANK_SENTINEL: f32 = 1.0;

/// Grayscale glyph set of one font, `(GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE)`
pub type GlyphTensor = Array3<f32>;

/// Shape every [`GlyphTensor`] must have
pub fn glyph_tensor_shape() -> [usize; 3] {
    [GLYPH_SIZE, GLYPH_SIZE, ALPHABET_SIZE]
}

/// Check that a glyph tensor has the `64 × 64 × 26` layout
pub fn check_glyph_tensor(glyphs: &GlyphTensor) -> Result<()> {
    let expected = glyph_tensor_shape();
    if glyphs.shape() != expected {
        return Err(OrnaError::shape(&expected, glyphs.shape()));
    }
    Ok(())
}

/// Bounds-checked view of one letter channel
pub fn letter_channel(glyphs: &GlyphTensor, letter: usize) -> Result<ArrayView2<'_, f32>> {
    let channels = glyphs.len_of(Axis(2));
    if letter >= channels {
        return Err(OrnaError::config(format!(
            "letter index {} out of range for {} channels",
            letter, channels
        )));
    }
    Ok(glyphs.index_axis(Axis(2), letter))
}

/// Map an 8-bit pixel to [-1, 1]
pub fn normalize_pixel(value: u8) -> f32 {
    (value as f32 - 127.5) / 127.5
}

/// Map a value in [-1, 1] back to an 8-bit pixel, clamping outliers
pub fn denormalize_pixel(value: f32) -> u8 {
    (value * 127.5 + 127.5).round().clamp(0.0, 255.0) as u8
}

/// Copy a host array into an `f32` tensor of the same shape
pub fn array4_to_tensor(array: &Array4<f32>, device: Device) -> Tensor {
    let shape: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::from_slice(&data).view(shape.as_slice()).to_device(device)
}

/// Copy a 4-D tensor back to the host
pub fn tensor_to_array4(tensor: &Tensor) -> Result<Array4<f32>> {
    let size = tensor.size();
    if size.len() != 4 {
        let actual: Vec<usize> = size.iter().map(|&d| d as usize).collect();
        return Err(OrnaError::Config(format!(
            "expected a 4-D tensor, got shape {:?}",
            actual
        )));
    }
    let flat = tensor
        .to_device(Device::Cpu)
        .to_kind(Kind::Float)
        .contiguous()
        .flatten(0, -1);
    let data = Vec::<f32>::try_from(&flat)?;
    let shape = (
        size[0] as usize,
        size[1] as usize,
        size[2] as usize,
        size[3] as usize,
    );
    Ok(Array4::from_shape_vec(shape, data)?)
}

/// Convert a channel-last color stack `(N, H, W, C)` into an NCHW tensor
pub fn nhwc_to_nchw(array: &Array4<f32>, device: Device) -> Tensor {
    let permuted = array.view().permuted_axes([0, 3, 1, 2]);
    array4_to_tensor(&permuted.as_standard_layout().to_owned(), device)
}
