//! Stacked, model-ready splits.

use serde::Serialize;
use vision_core::{ClassCatalog, DataSplit, Error, Result, Sample, TensorShape};

use crate::cleanup::CleanupReport;
use crate::encode::{encode_labels, OneHotMatrix};
use crate::loader::SkippedEntry;
use crate::preprocess::LoadFailure;

/// Features of one split stacked as `N x H x W x C` plus one-hot labels
#[derive(Debug, Clone)]
pub struct LabeledTensors {
    features: Vec<f32>,
    shape: TensorShape,
    labels: OneHotMatrix,
}

impl LabeledTensors {
    /// Stacks samples in order. Every feature vector must match `shape`.
    pub fn from_samples(samples: Vec<Sample>, shape: TensorShape, num_classes: usize) -> Result<Self> {
        let sample_len = shape.num_elements();
        let labels: Vec<usize> = samples.iter().map(|s| s.label).collect();

        let mut features = Vec::with_capacity(samples.len() * sample_len);
        for sample in samples {
            if sample.features.len() != sample_len {
                return Err(Error::ShapeMismatch {
                    expected: sample_len,
                    actual: sample.features.len(),
                });
            }
            features.extend(sample.features);
        }

        Self::new(features, shape, &labels, num_classes)
    }

    /// Wraps already stacked features
    pub fn new(features: Vec<f32>, shape: TensorShape, labels: &[usize], num_classes: usize) -> Result<Self> {
        let expected = labels.len() * shape.num_elements();
        if features.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: features.len(),
            });
        }

        Ok(Self {
            features,
            shape,
            labels: encode_labels(labels, num_classes)?,
        })
    }

    /// An empty split
    pub fn empty(shape: TensorShape, num_classes: usize) -> Result<Self> {
        Self::new(Vec::new(), shape, &[], num_classes)
    }

    pub fn len(&self) -> usize {
        self.labels.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> TensorShape {
        self.shape
    }

    pub fn num_classes(&self) -> usize {
        self.labels.num_classes()
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    pub fn labels(&self) -> &OneHotMatrix {
        &self.labels
    }

    /// Feature tensor of sample `index`
    pub fn sample(&self, index: usize) -> &[f32] {
        let n = self.shape.num_elements();
        &self.features[index * n..(index + 1) * n]
    }

    /// Label indices recovered from the one-hot rows
    pub fn label_indices(&self) -> Vec<usize> {
        self.labels.argmax()
    }
}

/// Everything the preparation pass skipped or changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreparationReport {
    /// Directory entries discovery could not read
    pub skipped: Vec<SkippedEntry>,
    /// `None` when cleanup is disabled
    pub cleanup: Option<CleanupReport>,
    /// Files that failed to decode
    pub load_failures: Vec<LoadFailure>,
    /// Files found per class, indexed by label
    pub discovered_per_class: Vec<usize>,
    /// Samples decoded per class, indexed by label
    pub loaded_per_class: Vec<usize>,
    /// `[train, validation, test]`
    pub split_sizes: [usize; 3],
    /// Seed the shuffle actually used
    pub seed: u64,
}

impl PreparationReport {
    pub fn total_loaded(&self) -> usize {
        self.loaded_per_class.iter().sum()
    }
}

/// Output of `DatasetPreparer::prepare`
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub catalog: ClassCatalog,
    pub train: LabeledTensors,
    pub validation: LabeledTensors,
    pub test: LabeledTensors,
    pub report: PreparationReport,
}

impl PreparedDataset {
    pub fn split(&self, split: DataSplit) -> &LabeledTensors {
        match split {
            DataSplit::Train => &self.train,
            DataSplit::Validation => &self.validation,
            DataSplit::Test => &self.test,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.catalog.len()
    }

    pub fn input_shape(&self) -> TensorShape {
        self.train.shape()
    }
}
