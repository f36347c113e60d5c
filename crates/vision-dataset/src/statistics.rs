//! Per-split, per-class sample counts.

use serde::Serialize;
use tracing::info;
use vision_core::DataSplit;

use crate::dataset::PreparedDataset;

/// Sample counts of one class
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassCounts {
    pub name: String,
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl ClassCounts {
    pub fn get(&self, split: DataSplit) -> usize {
        match split {
            DataSplit::Train => self.train,
            DataSplit::Validation => self.validation,
            DataSplit::Test => self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train + self.validation + self.test
    }
}

/// Dataset statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatistics {
    pub classes: Vec<ClassCounts>,
}

impl DatasetStatistics {
    /// Counts labels in every split of a prepared dataset
    pub fn from_prepared(dataset: &PreparedDataset) -> Self {
        let mut classes: Vec<ClassCounts> = dataset
            .catalog
            .iter()
            .map(|(_, name)| ClassCounts {
                name: name.to_string(),
                train: 0,
                validation: 0,
                test: 0,
            })
            .collect();

        for split in DataSplit::ALL {
            for label in dataset.split(split).label_indices() {
                let counts = &mut classes[label];
                match split {
                    DataSplit::Train => counts.train += 1,
                    DataSplit::Validation => counts.validation += 1,
                    DataSplit::Test => counts.test += 1,
                }
            }
        }

        Self { classes }
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn split_total(&self, split: DataSplit) -> usize {
        self.classes.iter().map(|c| c.get(split)).sum()
    }

    pub fn total(&self) -> usize {
        self.classes.iter().map(ClassCounts::total).sum()
    }

    /// Logs one line per class
    pub fn log_summary(&self) {
        info!(
            "Dataset: {} samples, {} classes (train {}, validation {}, test {})",
            self.total(),
            self.num_classes(),
            self.split_total(DataSplit::Train),
            self.split_total(DataSplit::Validation),
            self.split_total(DataSplit::Test)
        );
        for class in &self.classes {
            info!(
                "  {:<24} train {:>6}  validation {:>6}  test {:>6}",
                class.name, class.train, class.validation, class.test
            );
        }
    }
}
