//! Dataset preparation for directory-per-class image collections.
//!
//! Discovers classes and image files, optionally deletes files with
//! unwanted extensions, decodes and normalizes every image, shuffles with a
//! seeded RNG and cuts the result into train/validation/test splits with
//! one-hot labels.

pub mod augmentation;
pub mod cleanup;
pub mod dataset;
pub mod encode;
pub mod loader;
pub mod preparer;
pub mod preprocess;
pub mod split;
pub mod statistics;

pub use augmentation::{AffineTransform, AugmentationPipeline, TransformParams};
pub use cleanup::{remove_non_matching_files, CleanupFailure, CleanupReport};
pub use dataset::{LabeledTensors, PreparationReport, PreparedDataset};
pub use encode::{encode_labels, OneHotMatrix};
pub use loader::{Discovery, ImageLoader, SkippedEntry};
pub use preparer::DatasetPreparer;
pub use preprocess::{ImagePreprocessor, LoadFailure};
pub use split::{partition, split_bounds, Partition, PartitionedSamples};
pub use statistics::{ClassCounts, DatasetStatistics};
