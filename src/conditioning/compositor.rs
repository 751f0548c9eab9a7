//! Fusing glyph-network predictions into one conditioning image

use ndarray::{s, Array3, Array4, Axis};

use crate::data::glyph::RGB_CHANNELS;
use crate::error::{OrnaError, Result};

/// Build the composite from `k + 1` predictions `(k + 1, H, W, C)`.
///
/// Starts from the full-reveal prediction (the last one) and replaces channel
/// `selected[i]` with the same channel of masked prediction `i`.
pub fn composite(predictions: &Array4<f32>, selected: &[usize]) -> Result<Array3<f32>> {
    let (count, _, _, channels) = predictions.dim();
    let k = selected.len();
    if count != k + 1 {
        return Err(OrnaError::config(format!(
            "expected {} predictions for {} selected letters, got {}",
            k + 1,
            k,
            count
        )));
    }

    let mut result = predictions.index_axis(Axis(0), k).to_owned();
    for (i, &letter) in selected.iter().enumerate() {
        if letter >= channels {
            return Err(OrnaError::config(format!(
                "selected letter {} out of range for {} predicted channels",
                letter, channels
            )));
        }
        result
            .slice_mut(s![.., .., letter])
            .assign(&predictions.slice(s![i, .., .., letter]));
    }

    Ok(result)
}

/// Broadcast every channel of a composite into its own RGB image.
///
/// `(H, W, C)` becomes `(C, 3, H, W)`: one conditioning image per letter, with
/// the letter's channel replicated into R, G and B.
pub fn broadcast_rgb(composite: &Array3<f32>) -> Array4<f32> {
    let (height, width, channels) = composite.dim();
    Array4::from_shape_fn((channels, RGB_CHANNELS, height, width), |(c, _, y, x)| {
        composite[[y, x, c]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictions(count: usize) -> Array4<f32> {
        // entry i is filled with the constant i, so provenance is visible
        Array4::from_shape_fn((count, 8, 8, 26), |(i, _, _, _)| i as f32)
    }

    #[test]
    fn test_selected_channels_come_from_masked_predictions() {
        let selected = vec![4, 0, 19];
        let preds = predictions(4);
        let result = composite(&preds, &selected).unwrap();

        assert_eq!(result.dim(), (8, 8, 26));
        for c in 0..26 {
            let expected = match selected.iter().position(|&s| s == c) {
                Some(i) => i as f32,
                None => 3.0,
            };
            assert!(result.slice(s![.., .., c]).iter().all(|&v| v == expected), "channel {}", c);
        }
    }

    #[test]
    fn test_composite_is_pure() {
        let selected = vec![1, 2, 3, 4];
        let preds = Array4::from_shape_fn((5, 8, 8, 26), |(i, y, x, c)| (i * 7 + y + x * 3 + c) as f32);

        let first = composite(&preds, &selected).unwrap();
        let second = composite(&preds, &selected).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_selection_is_pass_through() {
        let preds = Array4::from_shape_fn((1, 8, 8, 26), |(_, y, x, c)| (y * x + c) as f32);
        let result = composite(&preds, &[]).unwrap();
        assert_eq!(result, preds.index_axis(Axis(0), 0));
    }

    #[test]
    fn test_prediction_count_mismatch() {
        assert!(composite(&predictions(3), &[1, 2, 3]).is_err());
        assert!(composite(&predictions(2), &[30]).is_err());
    }

    #[test]
    fn test_broadcast_rgb() {
        let composite = Array3::from_shape_fn((8, 8, 26), |(y, x, c)| (y * 100 + x * 10 + c) as f32);
        let rgb = broadcast_rgb(&composite);

        assert_eq!(rgb.dim(), (26, 3, 8, 8));
        for ch in 0..3 {
            assert_eq!(rgb[[5, ch, 2, 3]], composite[[2, 3, 5]]);
        }
    }
}
