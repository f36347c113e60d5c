//! Training history and evaluation metrics.

use serde::{Deserialize, Serialize};

/// Loss and accuracy of a model on one split
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    /// Mean categorical cross-entropy
    pub loss: f64,
    /// Fraction of correctly classified samples, in [0, 1]
    pub accuracy: f64,
    /// Number of samples evaluated
    pub num_samples: usize,
}

/// Metrics for a single epoch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    /// `None` when the validation split is empty
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

/// Per-epoch history returned by `fit`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// One record per completed epoch
    pub epochs: Vec<EpochRecord>,
    /// Epoch whose weights were kept (lowest validation loss)
    pub best_epoch: Option<usize>,
    /// Epoch at which early stopping fired
    pub stopped_epoch: Option<usize>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an epoch record
    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    /// Number of completed epochs
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn train_loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.train_loss).collect()
    }

    pub fn val_loss(&self) -> Vec<f64> {
        self.epochs.iter().filter_map(|e| e.val_loss).collect()
    }

    pub fn val_accuracy(&self) -> Vec<f64> {
        self.epochs.iter().filter_map(|e| e.val_accuracy).collect()
    }

    /// Gets the best validation accuracy
    pub fn best_val_accuracy(&self) -> Option<f64> {
        self.epochs
            .iter()
            .filter_map(|e| e.val_accuracy)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Gets the lowest validation loss
    pub fn best_val_loss(&self) -> Option<f64> {
        self.epochs
            .iter()
            .filter_map(|e| e.val_loss)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Whether training ended before `max_epochs`
    pub fn stopped_early(&self) -> bool {
        self.stopped_epoch.is_some()
    }
}
