//! Image decoding and normalization.
//!
//! Turns an image file into a fixed-size HWC `f32` tensor: decode, force
//! three channels, resize to the target shape, then apply the configured
//! per-channel normalization.

use std::fmt;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};
use serde::Serialize;
use vision_core::{NormalizationMode, PreprocessConfig, ResizeFilter, TensorShape};

/// ImageNet channel means in 0..255 space, BGR order
pub const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

/// ImageNet channel means in 0..1 space, RGB order
pub const TORCH_MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations in 0..1 space, RGB order
pub const TORCH_STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

/// A file that could not be turned into a sample
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

fn filter_type(filter: ResizeFilter) -> FilterType {
    match filter {
        ResizeFilter::Nearest => FilterType::Nearest,
        ResizeFilter::Triangle => FilterType::Triangle,
        ResizeFilter::CatmullRom => FilterType::CatmullRom,
        ResizeFilter::Lanczos3 => FilterType::Lanczos3,
    }
}

/// Image preprocessor producing model input tensors
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Creates a new image preprocessor with the given configuration
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Shape of every tensor this preprocessor produces
    pub fn output_shape(&self) -> TensorShape {
        self.config.target_shape
    }

    /// Decodes and preprocesses the image at `path`.
    ///
    /// The format is sniffed from the file contents, so a PNG saved with a
    /// `.jpg` extension still loads.
    pub fn load(&self, path: &Path) -> std::result::Result<Vec<f32>, LoadFailure> {
        let fail = |reason: String| LoadFailure {
            path: path.to_path_buf(),
            reason,
        };

        let image = ImageReader::open(path)
            .map_err(|e| fail(format!("open failed: {e}")))?
            .with_guessed_format()
            .map_err(|e| fail(format!("format detection failed: {e}")))?
            .decode()
            .map_err(|e| fail(format!("decode failed: {e}")))?;

        Ok(self.preprocess(&image))
    }

    /// Preprocesses an already decoded image
    pub fn preprocess(&self, image: &DynamicImage) -> Vec<f32> {
        let rgb = image.to_rgb8();
        let resized = self.resize_image(rgb);
        self.normalize_image(&resized)
    }

    fn resize_image(&self, image: RgbImage) -> RgbImage {
        let target_w = self.config.target_shape.width as u32;
        let target_h = self.config.target_shape.height as u32;

        if image.dimensions() == (target_w, target_h) {
            return image;
        }

        image::imageops::resize(&image, target_w, target_h, filter_type(self.config.filter))
    }

    /// Flattens to HWC and normalizes each pixel
    fn normalize_image(&self, image: &RgbImage) -> Vec<f32> {
        let mut normalized = Vec::with_capacity(self.config.target_shape.num_elements());

        for pixel in image.pixels() {
            let [r, g, b] = pixel.0.map(f32::from);
            match self.config.normalization {
                NormalizationMode::Caffe => {
                    normalized.push(b - CAFFE_MEAN_BGR[0]);
                    normalized.push(g - CAFFE_MEAN_BGR[1]);
                    normalized.push(r - CAFFE_MEAN_BGR[2]);
                }
                NormalizationMode::Tf => {
                    normalized.extend([r, g, b].map(|v| v / 127.5 - 1.0));
                }
                NormalizationMode::Torch => {
                    for (c, v) in [r, g, b].into_iter().enumerate() {
                        normalized.push((v / 255.0 - TORCH_MEAN_RGB[c]) / TORCH_STD_RGB[c]);
                    }
                }
            }
        }

        normalized
    }
}
