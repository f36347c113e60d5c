//! Training infrastructure for the image classifier.
//!
//! This crate provides:
//! - The `TrainableModel` abstraction used by the pipeline
//! - A two-block CNN built with burn
//! - A mini-batch training loop with early stopping
//! - Persistence of weights, history and evaluation results

pub mod checkpoint;
pub mod classifier;
pub mod model;
pub mod trainer;

pub use checkpoint::{load_json, ArtifactWriter, RunMetadata};
pub use classifier::{BurnClassifier, Classifier, DefaultBackend};
pub use model::{ConvNet, ConvNetConfig, FitParams, TrainableModel};
pub use trainer::{Trainer, TrainingState};
