//! Error types for the ORNA training pipeline

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, OrnaError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum OrnaError {
    /// Invalid configuration, index range or missing model file
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Array or tensor with an unexpected shape
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding/encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// libtorch error
    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl OrnaError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a shape error from two shapes
    pub fn shape(expected: &[usize], actual: &[usize]) -> Self {
        Self::Shape {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

impl From<ndarray::ShapeError> for OrnaError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Config(format!("invalid array shape: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrnaError::config("bad letter range");
        assert_eq!(err.to_string(), "Invalid configuration: bad letter range");

        let err = OrnaError::shape(&[64, 64, 26], &[64, 64, 3]);
        assert!(err.to_string().contains("[64, 64, 26]"));
    }
}
