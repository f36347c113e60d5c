//! Core type definitions for the image classification pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Ordered list of class names. The position of a name is its label index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassCatalog {
    names: Vec<String>,
}

impl ClassCatalog {
    /// Builds a catalog, rejecting duplicate names
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(Error::Dataset(format!("Duplicate class name: {name}")));
            }
        }
        Ok(Self { names })
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label index for a class name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Class name for a label index
    pub fn name(&self, label: usize) -> Option<&str> {
        self.names.get(label).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Iterates over `(label, name)` pairs in label order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}

/// Shape of a single feature tensor, stored row-major as height × width × channels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TensorShape {
    /// Image height in pixels
    pub height: usize,
    /// Image width in pixels
    pub width: usize,
    /// Number of channels (3 for RGB/BGR)
    pub channels: usize,
}

impl TensorShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Standard ImageNet input (224x224x3)
    pub fn imagenet() -> Self {
        Self::new(224, 224, 3)
    }

    /// Number of scalar values in one tensor
    pub fn num_elements(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Flat index of `(y, x, c)` in HWC layout
    pub fn index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels + c
    }
}

impl Default for TensorShape {
    fn default() -> Self {
        Self::imagenet()
    }
}

impl std::fmt::Display for TensorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// A decoded image with its label
#[derive(Debug, Clone)]
pub struct Sample {
    /// Normalized pixel values in HWC layout
    pub features: Vec<f32>,
    /// Class label index
    pub label: usize,
    /// File the sample was decoded from
    pub path: PathBuf,
}

impl Sample {
    pub fn new(features: Vec<f32>, label: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            features,
            label,
            path: path.into(),
        }
    }
}

/// Data split type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataSplit {
    /// Training data
    Train,
    /// Validation data
    Validation,
    /// Test data
    Test,
}

impl DataSplit {
    pub const ALL: [DataSplit; 3] = [DataSplit::Train, DataSplit::Validation, DataSplit::Test];
}

impl std::fmt::Display for DataSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSplit::Train => write!(f, "train"),
            DataSplit::Validation => write!(f, "validation"),
            DataSplit::Test => write!(f, "test"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_indices_follow_input_order() {
        let catalog = ClassCatalog::new(["Cat", "Dog"]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.index_of("Cat"), Some(0));
        assert_eq!(catalog.index_of("Dog"), Some(1));
        assert_eq!(catalog.name(1), Some("Dog"));
        assert_eq!(catalog.name(2), None);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let result = ClassCatalog::new(["Cat", "Dog", "Cat"]);
        assert!(matches!(result, Err(Error::Dataset(_))));
    }

    #[test]
    fn test_tensor_shape() {
        let shape = TensorShape::imagenet();
        assert_eq!(shape.num_elements(), 224 * 224 * 3);
        assert_eq!(shape.index(0, 1, 2), 5);
        assert_eq!(shape.index(1, 0, 0), 224 * 3);
        assert_eq!(shape.to_string(), "224x224x3");
    }

    #[test]
    fn test_data_split_display() {
        assert_eq!(DataSplit::Train.to_string(), "train");
        assert_eq!(DataSplit::Validation.to_string(), "validation");
        assert_eq!(DataSplit::Test.to_string(), "test");
    }
}
