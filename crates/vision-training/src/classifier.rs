//! `TrainableModel` implementation on burn.
//!
//! Training runs a plain mini-batch loop on an autodiff backend: shuffle
//! the training indices each epoch, optionally augment every sample, step
//! Adam on the cross-entropy loss, then score the validation split with the
//! inner (non-autodiff) model. When validation is available the weights of
//! the epoch with the lowest validation loss are restored at the end.

use std::path::Path;

use burn::{
    backend::{Autodiff, NdArray},
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor, TensorData,
    },
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use vision_core::{
    EpochRecord, Error, Evaluation, ModelConfig, Result, TensorShape, TrainingHistory,
};
use vision_dataset::{AugmentationPipeline, LabeledTensors};

use crate::model::{ConvNet, ConvNetConfig, FitParams, TrainableModel};
use crate::trainer::Trainer;

/// CPU backend with automatic differentiation
pub type DefaultBackend = Autodiff<NdArray>;

/// The CNN classifier on the default backend
pub type Classifier = BurnClassifier<DefaultBackend>;

/// Batch size used when scoring a split
const EVAL_BATCH_SIZE: usize = 64;

/// CNN classifier trained with a custom burn loop
pub struct BurnClassifier<B: AutodiffBackend> {
    model: ConvNet<B>,
    config: ConvNetConfig,
    device: B::Device,
}

/// Stacks the selected samples into an HWC batch and its targets
fn make_batch<B: Backend>(
    data: &LabeledTensors,
    labels: &[usize],
    indices: &[usize],
    augmentation: Option<&mut AugmentationPipeline>,
    device: &B::Device,
) -> (Tensor<B, 4>, Tensor<B, 1, Int>) {
    let shape = data.shape();
    let mut features = Vec::with_capacity(indices.len() * shape.num_elements());

    match augmentation {
        Some(pipeline) => {
            for &i in indices {
                features.extend(pipeline.augment(data.sample(i), shape));
            }
        }
        None => {
            for &i in indices {
                features.extend_from_slice(data.sample(i));
            }
        }
    }

    let targets: Vec<i64> = indices.iter().map(|&i| labels[i] as i64).collect();
    let n = indices.len();

    let images = Tensor::<B, 4>::from_data(
        TensorData::new(features, [n, shape.height, shape.width, shape.channels]),
        device,
    );
    let targets = Tensor::<B, 1, Int>::from_data(TensorData::new(targets, [n]), device);
    (images, targets)
}

/// Number of rows where the arg-max of `logits` equals `targets`
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [n, _] = logits.dims();
    let predictions = logits.argmax(1).reshape([n]);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

/// Sample-weighted loss and accuracy of `model` on `data`
fn evaluate_model<B: Backend>(
    model: &ConvNet<B>,
    data: &LabeledTensors,
    batch_size: usize,
    device: &B::Device,
) -> Evaluation {
    let labels = data.label_indices();
    let indices: Vec<usize> = (0..data.len()).collect();
    let loss_fn = CrossEntropyLossConfig::new().init(device);

    let mut loss_sum = 0.0;
    let mut correct = 0;

    for chunk in indices.chunks(batch_size) {
        let (images, targets) = make_batch::<B>(data, &labels, chunk, None, device);
        let logits = model.forward(images);

        let loss: f64 = loss_fn
            .forward(logits.clone(), targets.clone())
            .into_scalar()
            .elem();
        loss_sum += loss * chunk.len() as f64;
        correct += count_correct(logits, targets);
    }

    Evaluation {
        loss: loss_sum / data.len() as f64,
        accuracy: correct as f64 / data.len() as f64,
        num_samples: data.len(),
    }
}

impl<B: AutodiffBackend> BurnClassifier<B> {
    /// Builds an untrained classifier on `device`
    pub fn with_device(
        input_shape: TensorShape,
        num_classes: usize,
        model_config: &ModelConfig,
        device: B::Device,
    ) -> Result<Self> {
        let config = ConvNetConfig::from_model_config(input_shape, num_classes, model_config);
        let model = config.init::<B>(&device)?;
        info!(
            "Created CNN for {} input, {} classes ({} parameters)",
            input_shape,
            num_classes,
            model.num_params()
        );

        Ok(Self {
            model,
            config,
            device,
        })
    }

    pub fn config(&self) -> &ConvNetConfig {
        &self.config
    }

    pub fn model(&self) -> &ConvNet<B> {
        &self.model
    }

    pub fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn check_compatible(&self, data: &LabeledTensors) -> Result<()> {
        let expected = self.config.input_shape();
        if data.shape() != expected {
            return Err(Error::IncompatibleShape {
                expected,
                actual: data.shape(),
            });
        }
        if data.num_classes() != self.config.num_classes {
            return Err(Error::InvalidArgument(format!(
                "Data has {} classes but the model was built for {}",
                data.num_classes(),
                self.config.num_classes
            )));
        }
        Ok(())
    }

    /// Saves the weights with burn's compact recorder. The recorder adds
    /// its own file extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.model
            .clone()
            .save_file(path.to_path_buf(), &CompactRecorder::new())
            .map_err(|e| Error::Training(format!("Failed to save model: {e:?}")))?;
        info!("Model saved to {}", path.display());
        Ok(())
    }

    /// Restores weights written by `save` into a freshly built classifier
    pub fn load(
        path: &Path,
        input_shape: TensorShape,
        num_classes: usize,
        model_config: &ModelConfig,
    ) -> Result<Self> {
        let mut classifier = Self::with_device(input_shape, num_classes, model_config, Default::default())?;
        classifier.model = classifier
            .model
            .load_file(path.to_path_buf(), &CompactRecorder::new(), &classifier.device)
            .map_err(|e| Error::Training(format!("Failed to load model: {e:?}")))?;
        Ok(classifier)
    }
}

impl<B: AutodiffBackend> TrainableModel for BurnClassifier<B> {
    fn create(input_shape: TensorShape, num_classes: usize, config: &ModelConfig) -> Result<Self> {
        Self::with_device(input_shape, num_classes, config, Default::default())
    }

    fn fit(
        &mut self,
        train: &LabeledTensors,
        validation: &LabeledTensors,
        params: &FitParams,
    ) -> Result<TrainingHistory> {
        if train.is_empty() {
            return Err(Error::Dataset("Training split is empty".to_string()));
        }
        if params.batch_size == 0 || params.max_epochs == 0 {
            return Err(Error::Config("batch_size and max_epochs must be at least 1".to_string()));
        }
        self.check_compatible(train)?;
        let has_validation = !validation.is_empty();
        if has_validation {
            self.check_compatible(validation)?;
        } else {
            info!("Validation split is empty; early stopping is disabled");
        }

        let labels = train.label_indices();
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut augmentation = params
            .augmentation
            .clone()
            .map(|config| AugmentationPipeline::new(config, params.seed.wrapping_add(1)));

        let loss_fn = CrossEntropyLossConfig::new().init(&self.device);
        let mut optimizer = AdamConfig::new().init();
        let mut model = self.model.clone();
        let mut best_model: Option<ConvNet<B>> = None;

        let patience = if has_validation { params.early_stopping_patience } else { None };
        let mut trainer = Trainer::new(params.max_epochs, patience);
        let mut stopped = false;

        info!(
            "Training on {} samples ({} validation), batch size {}, up to {} epochs",
            train.len(),
            validation.len(),
            params.batch_size,
            params.max_epochs
        );

        for epoch in 1..=params.max_epochs {
            let mut indices: Vec<usize> = (0..train.len()).collect();
            indices.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            let mut correct = 0;

            for (batch_idx, chunk) in indices.chunks(params.batch_size).enumerate() {
                let (images, targets) =
                    make_batch::<B>(train, &labels, chunk, augmentation.as_mut(), &self.device);

                let logits = model.forward(images);
                let loss = loss_fn.forward(logits.clone(), targets.clone());

                let loss_value: f64 = loss.clone().into_scalar().elem();
                loss_sum += loss_value * chunk.len() as f64;
                correct += count_correct(logits, targets);

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optimizer.step(params.learning_rate, model, grads);

                debug!("Epoch {} batch {}: loss={:.4}", epoch, batch_idx + 1, loss_value);
            }

            let (val_loss, val_accuracy) = if has_validation {
                let inner = model.valid();
                let device = <B::InnerBackend as Backend>::Device::default();
                let eval = evaluate_model(&inner, validation, EVAL_BATCH_SIZE, &device);
                (Some(eval.loss), Some(eval.accuracy))
            } else {
                (None, None)
            };

            let improved = trainer.update_epoch(EpochRecord {
                epoch,
                train_loss: loss_sum / train.len() as f64,
                train_accuracy: correct as f64 / train.len() as f64,
                val_loss,
                val_accuracy,
            });
            if improved {
                best_model = Some(model.clone());
            }

            if trainer.should_stop() {
                stopped = true;
                break;
            }
        }

        let history = trainer.finish(stopped);
        self.model = match (best_model, history.best_epoch) {
            (Some(best), Some(best_epoch)) if best_epoch != history.len() => {
                info!("Restoring weights from epoch {}", best_epoch);
                best
            }
            _ => model,
        };

        Ok(history)
    }

    fn evaluate(&self, data: &LabeledTensors) -> Result<Evaluation> {
        if data.is_empty() {
            return Err(Error::Dataset("Cannot evaluate on an empty split".to_string()));
        }
        self.check_compatible(data)?;

        let inner = self.model.valid();
        let device = <B::InnerBackend as Backend>::Device::default();
        Ok(evaluate_model(&inner, data, EVAL_BATCH_SIZE, &device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn shape() -> TensorShape {
        TensorShape::new(16, 16, 3)
    }

    fn small_model() -> ModelConfig {
        ModelConfig {
            conv_filters: [4, 8],
            dense_units: 16,
            ..ModelConfig::default()
        }
    }

    /// Class 0 images are dark, class 1 images are bright
    fn toy_split(n: usize) -> LabeledTensors {
        let per_sample = shape().num_elements();
        let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
        let features = labels
            .iter()
            .flat_map(|&l| std::iter::repeat(if l == 0 { -1.0 } else { 1.0 }).take(per_sample))
            .collect();
        LabeledTensors::new(features, shape(), &labels, 2).unwrap()
    }

    fn params(max_epochs: usize, patience: Option<usize>) -> FitParams {
        FitParams {
            batch_size: 8,
            max_epochs,
            early_stopping_patience: patience,
            learning_rate: 5e-3,
            seed: 42,
            augmentation: None,
        }
    }

    #[test]
    fn test_create_rejects_tiny_input() {
        let result = Classifier::create(TensorShape::new(8, 8, 3), 2, &ModelConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_fit_reduces_loss() {
        let train = toy_split(24);
        let validation = toy_split(8);
        let mut classifier = Classifier::create(shape(), 2, &small_model()).unwrap();

        let before = classifier.evaluate(&train).unwrap();
        let history = classifier.fit(&train, &validation, &params(8, None)).unwrap();
        let after = classifier.evaluate(&train).unwrap();

        assert_eq!(history.len(), 8);
        assert!(history.stopped_epoch.is_none());
        assert!(after.loss < before.loss, "loss {} -> {}", before.loss, after.loss);
        assert!((0.0..=1.0).contains(&after.accuracy));
        assert_eq!(after.num_samples, 24);
    }

    #[test]
    fn test_best_epoch_has_lowest_val_loss() {
        let train = toy_split(16);
        let validation = toy_split(6);
        let mut classifier = Classifier::create(shape(), 2, &small_model()).unwrap();

        let history = classifier.fit(&train, &validation, &params(6, Some(1))).unwrap();

        let best_epoch = history.best_epoch.unwrap();
        let best = history.epochs[best_epoch - 1].val_loss.unwrap();
        assert_eq!(history.best_val_loss(), Some(best));
        if let Some(stopped) = history.stopped_epoch {
            assert_eq!(stopped, history.len());
            assert!(stopped > best_epoch);
        }
    }

    #[test]
    fn test_restored_weights_score_best_val_loss() {
        let train = toy_split(16);
        let validation = toy_split(6);
        let mut classifier = Classifier::create(shape(), 2, &small_model()).unwrap();

        let history = classifier.fit(&train, &validation, &params(5, Some(5))).unwrap();
        let eval = classifier.evaluate(&validation).unwrap();

        let best = history.best_val_loss().unwrap();
        assert!((eval.loss - best).abs() < 1e-4, "{} vs {}", eval.loss, best);
    }

    #[test]
    fn test_empty_validation_runs_all_epochs() {
        let train = toy_split(8);
        let validation = LabeledTensors::empty(shape(), 2).unwrap();
        let mut classifier = Classifier::create(shape(), 2, &small_model()).unwrap();

        let history = classifier.fit(&train, &validation, &params(3, Some(1))).unwrap();

        assert_eq!(history.len(), 3);
        assert!(history.epochs.iter().all(|e| e.val_loss.is_none()));
        assert_eq!(history.best_epoch, None);
        assert_eq!(history.stopped_epoch, None);
    }

    #[test]
    fn test_fit_with_augmentation() {
        let train = toy_split(8);
        let validation = toy_split(4);
        let mut classifier = Classifier::create(shape(), 2, &small_model()).unwrap();

        let mut fit_params = params(2, None);
        fit_params.augmentation = Some(vision_core::AugmentationConfig::default());
        let history = classifier.fit(&train, &validation, &fit_params).unwrap();

        assert_eq!(history.len(), 2);
        assert!(history.epochs.iter().all(|e| e.train_loss.is_finite()));
    }

    #[test]
    fn test_evaluate_empty_split_fails() {
        let classifier = Classifier::create(shape(), 2, &small_model()).unwrap();
        let empty = LabeledTensors::empty(shape(), 2).unwrap();
        assert!(matches!(classifier.evaluate(&empty), Err(Error::Dataset(_))));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let classifier = Classifier::create(TensorShape::new(20, 20, 3), 2, &small_model()).unwrap();
        assert!(matches!(
            classifier.evaluate(&toy_split(4)),
            Err(Error::IncompatibleShape { .. })
        ));
    }

    #[test]
    fn test_transposed_input_reports_both_shapes() {
        let classifier = Classifier::create(TensorShape::new(12, 16, 3), 2, &small_model()).unwrap();
        let transposed = LabeledTensors::new(
            vec![0.0; 2 * 16 * 12 * 3],
            TensorShape::new(16, 12, 3),
            &[0, 1],
            2,
        )
        .unwrap();

        let err = classifier.evaluate(&transposed).unwrap_err();
        assert!(matches!(err, Error::IncompatibleShape { .. }));
        assert!(err.to_string().contains("expected 12x16x3, got 16x12x3"));
    }

    #[test]
    fn test_fit_rejects_empty_train() {
        let mut classifier = Classifier::create(shape(), 2, &small_model()).unwrap();
        let empty = LabeledTensors::empty(shape(), 2).unwrap();
        assert!(classifier.fit(&empty, &empty, &params(1, None)).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model");
        let data = toy_split(6);

        let classifier = Classifier::create(shape(), 2, &small_model()).unwrap();
        let original = classifier.evaluate(&data).unwrap();
        classifier.save(&path).unwrap();

        let loaded = Classifier::load(&path, shape(), 2, &small_model()).unwrap();
        let restored = loaded.evaluate(&data).unwrap();

        // Compact records store half precision weights
        assert!((original.loss - restored.loss).abs() < 0.05);
        assert_eq!(original.num_samples, restored.num_samples);
    }
}
