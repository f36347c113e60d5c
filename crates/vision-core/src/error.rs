//! Error types for the image classification pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::TensorShape;

/// Main error type for the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or processing error
    #[error("Image processing error: {0}")]
    Image(String),

    /// Dataset error
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error, raised before any filesystem work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error surfaced by the training framework
    #[error("Training error: {0}")]
    Training(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A label index that does not fit the class catalog
    #[error("Label {label} is out of range for {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },

    /// Shape mismatch between a tensor and its declared dimensions
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Data whose per-sample shape differs from the one a model was built for
    #[error("Input shape mismatch: expected {expected}, got {actual}")]
    IncompatibleShape {
        expected: TensorShape,
        actual: TensorShape,
    },

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Not found error
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

/// Specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("ratios sum to 1.2".to_string());
        assert_eq!(err.to_string(), "Configuration error: ratios sum to 1.2");
    }

    #[test]
    fn test_label_out_of_range_display() {
        let err = Error::LabelOutOfRange {
            label: 5,
            num_classes: 3,
        };
        assert_eq!(err.to_string(), "Label 5 is out of range for 3 classes");
    }

    #[test]
    fn test_incompatible_shape_names_both_shapes() {
        let err = Error::IncompatibleShape {
            expected: TensorShape::new(12, 16, 3),
            actual: TensorShape::new(16, 12, 3),
        };
        assert_eq!(
            err.to_string(),
            "Input shape mismatch: expected 12x16x3, got 16x12x3"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::NotFound(PathBuf::from("/data/missing"));
        assert_eq!(err.to_string(), "Not found: /data/missing");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("seed = ");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
