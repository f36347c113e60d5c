//! Model abstraction and the CNN architecture.
//!
//! `TrainableModel` is the seam between dataset preparation and the ML
//! library. `ConvNet` is the burn implementation of the two-block
//! convolutional classifier:
//!
//! ```text
//! Conv(3x3) -> ReLU -> MaxPool(2) -> Conv(3x3) -> ReLU -> MaxPool(2)
//!   -> Dropout -> Flatten -> Linear -> ReLU -> Dropout -> Linear
//! ```
//!
//! Softmax is left to the loss function, so `forward` returns logits.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};
use vision_core::{
    AugmentationConfig, Error, Evaluation, ModelConfig, TensorShape, TrainingHistory,
    TrainingParams,
};
use vision_dataset::LabeledTensors;

/// Hyperparameters handed to `TrainableModel::fit`
#[derive(Debug, Clone)]
pub struct FitParams {
    pub batch_size: usize,
    pub max_epochs: usize,
    /// `None` disables early stopping
    pub early_stopping_patience: Option<usize>,
    pub learning_rate: f64,
    /// Seeds the per-epoch shuffle and the augmentation draws
    pub seed: u64,
    /// Random augmentation of training batches, if enabled
    pub augmentation: Option<AugmentationConfig>,
}

impl FitParams {
    pub fn from_config(training: &TrainingParams, augmentation: &AugmentationConfig, seed: u64) -> Self {
        Self {
            batch_size: training.batch_size,
            max_epochs: training.max_epochs,
            early_stopping_patience: training.early_stopping_patience(),
            learning_rate: training.learning_rate,
            seed,
            augmentation: training.augmentation.then(|| augmentation.clone()),
        }
    }
}

/// A classifier that can be built, trained and scored on prepared splits
pub trait TrainableModel: Sized {
    /// Builds an untrained model for inputs of `input_shape`
    fn create(input_shape: TensorShape, num_classes: usize, config: &ModelConfig) -> vision_core::Result<Self>;

    /// Trains on `train`, monitoring `validation` when it is non-empty
    fn fit(
        &mut self,
        train: &LabeledTensors,
        validation: &LabeledTensors,
        params: &FitParams,
    ) -> vision_core::Result<TrainingHistory>;

    /// Mean loss and accuracy on `data`
    fn evaluate(&self, data: &LabeledTensors) -> vision_core::Result<Evaluation>;
}

/// Output side length after one valid 3x3-style convolution and a 2x2 pool
fn conv_pool_output(size: usize, kernel: usize) -> Option<usize> {
    let conv = size.checked_sub(kernel.checked_sub(1)?).filter(|&s| s > 0)?;
    Some(conv / 2).filter(|&s| s > 0)
}

/// Configuration of the CNN
#[derive(Config, Debug)]
pub struct ConvNetConfig {
    pub num_classes: usize,
    pub input_height: usize,
    pub input_width: usize,
    #[config(default = 3)]
    pub input_channels: usize,
    #[config(default = 32)]
    pub conv1_filters: usize,
    #[config(default = 64)]
    pub conv2_filters: usize,
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 256)]
    pub dense_units: usize,
    #[config(default = 0.25)]
    pub conv_dropout: f64,
    #[config(default = 0.5)]
    pub dense_dropout: f64,
}

impl ConvNetConfig {
    pub fn from_model_config(input_shape: TensorShape, num_classes: usize, model: &ModelConfig) -> Self {
        Self::new(num_classes, input_shape.height, input_shape.width)
            .with_input_channels(input_shape.channels)
            .with_conv1_filters(model.conv_filters[0])
            .with_conv2_filters(model.conv_filters[1])
            .with_kernel_size(model.kernel_size)
            .with_dense_units(model.dense_units)
            .with_conv_dropout(model.conv_dropout)
            .with_dense_dropout(model.dense_dropout)
    }

    pub fn input_shape(&self) -> TensorShape {
        TensorShape::new(self.input_height, self.input_width, self.input_channels)
    }

    /// Spatial size `[height, width]` of the last feature map
    pub fn feature_map_size(&self) -> vision_core::Result<[usize; 2]> {
        let k = self.kernel_size;
        let side = |size: usize| conv_pool_output(size, k).and_then(|s| conv_pool_output(s, k));

        match (side(self.input_height), side(self.input_width)) {
            (Some(h), Some(w)) => Ok([h, w]),
            _ => Err(Error::Config(format!(
                "Input {}x{} is too small for two {k}x{k} convolution and pooling stages",
                self.input_height, self.input_width
            ))),
        }
    }

    /// Length of the flattened feature vector fed to the dense layers
    pub fn flattened_size(&self) -> vision_core::Result<usize> {
        let [h, w] = self.feature_map_size()?;
        Ok(self.conv2_filters * h * w)
    }

    /// Initializes the model on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> vision_core::Result<ConvNet<B>> {
        if self.num_classes == 0 {
            return Err(Error::Config("num_classes must be at least 1".to_string()));
        }
        let flattened = self.flattened_size()?;
        let k = self.kernel_size;

        Ok(ConvNet {
            conv1: Conv2dConfig::new([self.input_channels, self.conv1_filters], [k, k]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv2: Conv2dConfig::new([self.conv1_filters, self.conv2_filters], [k, k]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv_dropout: DropoutConfig::new(self.conv_dropout).init(),
            fc1: LinearConfig::new(flattened, self.dense_units).init(device),
            dense_dropout: DropoutConfig::new(self.dense_dropout).init(),
            fc2: LinearConfig::new(self.dense_units, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// Two-block convolutional classifier
#[derive(Module, Debug)]
pub struct ConvNet<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    conv_dropout: Dropout,
    fc1: Linear<B>,
    dense_dropout: Dropout,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> ConvNet<B> {
    /// Forward pass
    ///
    /// # Arguments
    /// * `images` - Batch in HWC layout `[batch, height, width, channels]`
    ///
    /// # Returns
    /// Class logits `[batch, num_classes]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = images.permute([0, 3, 1, 2]);

        let x = self.conv1.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);
        let x = self.conv_dropout.forward(x);

        let [batch_size, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.dense_dropout.forward(x);

        self.fc2.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    #[test]
    fn test_feature_map_for_imagenet_input() {
        let config = ConvNetConfig::from_model_config(TensorShape::imagenet(), 2, &ModelConfig::default());
        assert_eq!(config.feature_map_size().unwrap(), [54, 54]);
        assert_eq!(config.flattened_size().unwrap(), 64 * 54 * 54);
    }

    #[test]
    fn test_too_small_input_rejected() {
        let config = ConvNetConfig::from_model_config(TensorShape::new(8, 8, 3), 2, &ModelConfig::default());
        assert!(matches!(config.feature_map_size(), Err(Error::Config(_))));

        let device = Default::default();
        assert!(config.init::<TestBackend>(&device).is_err());
    }

    #[test]
    fn test_smallest_valid_input() {
        let config = ConvNetConfig::new(2, 10, 10);
        assert_eq!(config.feature_map_size().unwrap(), [1, 1]);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model_config = ModelConfig {
            conv_filters: [4, 8],
            dense_units: 16,
            ..ModelConfig::default()
        };
        let config = ConvNetConfig::from_model_config(TensorShape::new(16, 12, 3), 5, &model_config);
        let model = config.init::<TestBackend>(&device).unwrap();

        let images = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![0.5f32; 2 * 16 * 12 * 3], [2, 16, 12, 3]),
            &device,
        );
        let logits = model.forward(images);
        assert_eq!(logits.dims(), [2, 5]);
    }

    #[test]
    fn test_fit_params_from_config() {
        let mut training = TrainingParams::default();
        let params = FitParams::from_config(&training, &AugmentationConfig::default(), 9);
        assert!(params.augmentation.is_none());
        assert_eq!(params.batch_size, 128);
        assert_eq!(params.seed, 9);

        training.augmentation = true;
        let params = FitParams::from_config(&training, &AugmentationConfig::default(), 9);
        assert!(params.augmentation.is_some());
        assert_eq!(params.early_stopping_patience, Some(3));

        training.early_stopping = false;
        let params = FitParams::from_config(&training, &AugmentationConfig::default(), 9);
        assert_eq!(params.early_stopping_patience, None);
    }

    #[test]
    fn test_zero_kernel_rejected() {
        let config = ConvNetConfig::new(2, 32, 32).with_kernel_size(0);
        assert!(matches!(config.feature_map_size(), Err(Error::Config(_))));

        let device = Default::default();
        assert!(config.init::<TestBackend>(&device).is_err());
    }
}
