//! Configuration structures for the image classification pipeline.
//!
//! Every knob that used to be a hard-coded constant lives here. Defaults
//! reproduce the classic cats-vs-dogs setup: a 70/15/15 split of
//! 224x224 images, a two-block CNN, batch size 128 and early stopping
//! after three epochs without validation-loss improvement.

use crate::error::{Error, Result};
use crate::types::TensorShape;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration handed to the pipeline at construction time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset location and split policy
    pub data: DataConfig,
    /// Image decoding and normalization
    pub preprocess: PreprocessConfig,
    /// Network architecture
    pub model: ModelConfig,
    /// Training hyperparameters
    pub training: TrainingParams,
    /// Random augmentation applied to training batches
    pub augmentation: AugmentationConfig,
    /// Where artifacts are written
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Checks every section. Runs before any filesystem access.
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.preprocess.validate()?;
        self.model.validate()?;
        self.training.validate()?;
        self.augmentation.validate()?;
        Ok(())
    }
}

/// Data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root directory whose immediate subdirectories are the classes
    pub root_dir: PathBuf,
    /// Subdirectory names that are not classes
    pub excluded_classes: Vec<String>,
    /// Shuffle seed, ignored when `unseeded` is set
    pub seed: u64,
    /// Draw the shuffle seed from OS entropy instead of `seed`
    pub unseeded: bool,
    /// Extensions the loader picks up (case-insensitive, no leading dot)
    pub accepted_extensions: Vec<String>,
    /// Extensions that survive the cleanup pass; everything else is deleted
    pub surviving_extensions: Vec<String>,
    /// Run the destructive cleanup pass before discovery
    pub cleanup: bool,
    /// Train/validation ratios; the remainder is the test split
    pub split: SplitRatios,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("data/PetImages"),
            excluded_classes: ["BACKGROUND_Google", "Motorbikes", "airplanes", "Faces_easy", "Faces"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            seed: 42,
            unseeded: false,
            accepted_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            surviving_extensions: vec!["jpg".into()],
            cleanup: true,
            split: SplitRatios::default(),
        }
    }
}

impl DataConfig {
    /// Configured shuffle seed, `None` when it should come from entropy
    pub fn seed(&self) -> Option<u64> {
        (!self.unseeded).then_some(self.seed)
    }

    /// Pins the seed, e.g. to the one an unseeded run actually drew
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.unseeded = false;
    }

    pub fn validate(&self) -> Result<()> {
        self.split.validate()?;
        check_extensions("accepted_extensions", &self.accepted_extensions)?;
        if self.cleanup {
            check_extensions("surviving_extensions", &self.surviving_extensions)?;
        }
        Ok(())
    }
}

fn check_extensions(field: &str, extensions: &[String]) -> Result<()> {
    if extensions.is_empty() {
        return Err(Error::Config(format!("{field} must not be empty")));
    }
    if let Some(bad) = extensions
        .iter()
        .find(|e| normalize_extension(e).is_empty())
    {
        return Err(Error::Config(format!("{field} contains an empty extension: {bad:?}")));
    }
    Ok(())
}

/// Lower-cases an extension and strips a leading dot (".JPG" -> "jpg")
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Train/validation split ratios
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SplitRatios {
    /// Training data ratio
    pub train: f64,
    /// Validation data ratio
    pub validation: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.7,
            validation: 0.15,
        }
    }
}

impl SplitRatios {
    pub fn new(train: f64, validation: f64) -> Self {
        Self { train, validation }
    }

    /// Fraction left over for the test split
    pub fn test(&self) -> f64 {
        (1.0 - self.train - self.validation).max(0.0)
    }

    /// Validates that both ratios are in [0, 1] and sum to at most 1.0
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("train", self.train), ("validation", self.validation)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} ratio must be within [0, 1], got {value}"
                )));
            }
        }
        let sum = self.train + self.validation;
        if sum > 1.0 + 1e-9 {
            return Err(Error::Config(format!(
                "Split ratios must sum to <= 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Resampling filter used when resizing to the target shape
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

/// Per-channel normalization applied after resizing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// RGB to BGR, then subtract the ImageNet channel means in 0..255 space
    Caffe,
    /// Scale to [-1, 1]
    Tf,
    /// Scale to [0, 1], subtract the ImageNet mean and divide by its std
    Torch,
}

impl std::fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizationMode::Caffe => write!(f, "caffe"),
            NormalizationMode::Tf => write!(f, "tf"),
            NormalizationMode::Torch => write!(f, "torch"),
        }
    }
}

/// Configuration for image preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Resize filter
    pub filter: ResizeFilter,
    /// Normalization applied to the resized pixels
    pub normalization: NormalizationMode,
    /// Output tensor shape
    pub target_shape: TensorShape,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            filter: ResizeFilter::Nearest,
            normalization: NormalizationMode::Caffe,
            target_shape: TensorShape::imagenet(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        let shape = self.target_shape;
        if shape.height == 0 || shape.width == 0 {
            return Err(Error::Config(format!("target_shape must be non-empty, got {shape}")));
        }
        if shape.channels != 3 {
            return Err(Error::Config(format!(
                "only 3-channel images are supported, got {} channels",
                shape.channels
            )));
        }
        Ok(())
    }
}

/// CNN architecture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Filters of the first and second convolution
    pub conv_filters: [usize; 2],
    /// Square kernel size of both convolutions
    pub kernel_size: usize,
    /// Width of the hidden dense layer
    pub dense_units: usize,
    /// Dropout after the convolutional stack
    pub conv_dropout: f64,
    /// Dropout after the hidden dense layer
    pub dense_dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            conv_filters: [32, 64],
            kernel_size: 3,
            dense_units: 256,
            conv_dropout: 0.25,
            dense_dropout: 0.5,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.conv_filters.contains(&0) || self.kernel_size == 0 || self.dense_units == 0 {
            return Err(Error::Config("model layer sizes must be non-zero".to_string()));
        }
        for (name, p) in [("conv_dropout", self.conv_dropout), ("dense_dropout", self.dense_dropout)] {
            if !(0.0..1.0).contains(&p) {
                return Err(Error::Config(format!("{name} must be within [0, 1), got {p}")));
            }
        }
        Ok(())
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Mini-batch size
    pub batch_size: usize,
    /// Upper bound on training epochs
    pub max_epochs: usize,
    /// Stop when validation loss stalls
    pub early_stopping: bool,
    /// Epochs without validation-loss improvement before stopping
    pub patience: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Apply random augmentation to training batches
    pub augmentation: bool,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            batch_size: 128,
            max_epochs: 10,
            early_stopping: true,
            patience: 3,
            learning_rate: 1e-3,
            augmentation: false,
        }
    }
}

impl TrainingParams {
    /// Patience if early stopping is enabled
    pub fn early_stopping_patience(&self) -> Option<usize> {
        self.early_stopping.then_some(self.patience)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.max_epochs == 0 {
            return Err(Error::Config("max_epochs must be at least 1".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Data augmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Random rotation range in degrees
    pub rotation_range: f32,
    /// Horizontal shift as a fraction of the width
    pub width_shift_range: f32,
    /// Vertical shift as a fraction of the height
    pub height_shift_range: f32,
    /// Shear angle range in degrees
    pub shear_range: f32,
    /// Zoom factor is drawn from [1 - zoom_range, 1 + zoom_range]
    pub zoom_range: f32,
    /// Random horizontal flip
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 20.0,
            width_shift_range: 0.2,
            height_shift_range: 0.2,
            shear_range: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("rotation_range", self.rotation_range),
            ("width_shift_range", self.width_shift_range),
            ("height_shift_range", self.height_shift_range),
            ("shear_range", self.shear_range),
            ("zoom_range", self.zoom_range),
        ];
        for (name, value) in ranges {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!("{name} must be >= 0, got {value}")));
            }
        }
        if self.zoom_range >= 1.0 {
            return Err(Error::Config(format!(
                "zoom_range must be below 1.0, got {}",
                self.zoom_range
            )));
        }
        Ok(())
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for the model, history and evaluation files
    pub output_dir: PathBuf,
    /// Persist trained weights
    pub save_model: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            save_model: true,
        }
    }
}
