//! Persistence of training results.
//!
//! Everything except the weights is written as pretty JSON next to each
//! other in one output directory:
//!
//! - `history.json`: per-epoch metrics
//! - `evaluation.json`: test-split loss and accuracy
//! - `classes.json`: the class catalog in label order
//! - `preparation.json`: what dataset preparation skipped or removed
//! - `run.json`: run metadata with a timestamp

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use vision_core::{ClassCatalog, Evaluation, Result, TensorShape, TrainingHistory};
use vision_dataset::PreparationReport;

pub const HISTORY_FILE: &str = "history.json";
pub const EVALUATION_FILE: &str = "evaluation.json";
pub const CLASSES_FILE: &str = "classes.json";
pub const PREPARATION_FILE: &str = "preparation.json";
pub const RUN_FILE: &str = "run.json";
/// Base name of the weights file; the recorder appends its extension
pub const MODEL_FILE: &str = "model";

/// Summary of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub timestamp: String,
    pub input_shape: TensorShape,
    pub num_classes: usize,
    pub seed: u64,
    pub epochs_trained: usize,
    pub best_epoch: Option<usize>,
    pub stopped_epoch: Option<usize>,
    pub test: Option<Evaluation>,
}

impl RunMetadata {
    pub fn new(
        input_shape: TensorShape,
        num_classes: usize,
        seed: u64,
        history: &TrainingHistory,
        test: Option<Evaluation>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            input_shape,
            num_classes,
            seed,
            epochs_trained: history.len(),
            best_epoch: history.best_epoch,
            stopped_epoch: history.stopped_epoch,
            test,
        }
    }
}

/// Writes run artifacts into one directory
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    /// Creates the output directory if needed
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Serializes `value` as pretty JSON to `file_name`
    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn save_history(&self, history: &TrainingHistory) -> Result<PathBuf> {
        self.write_json(HISTORY_FILE, history)
    }

    pub fn save_evaluation(&self, evaluation: &Evaluation) -> Result<PathBuf> {
        self.write_json(EVALUATION_FILE, evaluation)
    }

    pub fn save_catalog(&self, catalog: &ClassCatalog) -> Result<PathBuf> {
        self.write_json(CLASSES_FILE, catalog)
    }

    pub fn save_report(&self, report: &PreparationReport) -> Result<PathBuf> {
        self.write_json(PREPARATION_FILE, report)
    }

    pub fn save_run(&self, run: &RunMetadata) -> Result<PathBuf> {
        self.write_json(RUN_FILE, run)
    }
}

/// Reads a JSON artifact back
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
