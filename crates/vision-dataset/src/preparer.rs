//! End-to-end dataset preparation.

use tracing::{debug, info, warn};
use vision_core::{ClassCatalog, DataConfig, Error, PipelineConfig, PreprocessConfig, Result, Sample};

use crate::cleanup::{remove_non_matching_files, CleanupReport};
use crate::dataset::{LabeledTensors, PreparationReport, PreparedDataset};
use crate::loader::{Discovery, ImageLoader, SkippedEntry};
use crate::preprocess::ImagePreprocessor;
use crate::split::{entropy_seed, partition};

/// Runs discovery, cleanup, decoding and partitioning for one dataset root
pub struct DatasetPreparer {
    data: DataConfig,
    loader: ImageLoader,
    preprocessor: ImagePreprocessor,
}

impl DatasetPreparer {
    /// Validates both sections before touching the filesystem
    pub fn new(data: DataConfig, preprocess: PreprocessConfig) -> Result<Self> {
        data.validate()?;
        preprocess.validate()?;

        Ok(Self {
            loader: ImageLoader::new(&data.root_dir, &data.accepted_extensions),
            preprocessor: ImagePreprocessor::new(preprocess),
            data,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.data.clone(), config.preprocess.clone())
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// Lists the classes and fails when none are left after exclusions
    fn list_classes(&self) -> Result<(ClassCatalog, Vec<SkippedEntry>)> {
        let (catalog, skipped) = self.loader.list_classes(&self.data.excluded_classes)?;
        if catalog.is_empty() {
            return Err(Error::Dataset(format!(
                "No class directories found under {}",
                self.loader.root_dir().display()
            )));
        }
        Ok((catalog, skipped))
    }

    /// Deletes files with non-surviving extensions from every class directory
    pub fn clean(&self, catalog: &ClassCatalog) -> CleanupReport {
        let mut report = CleanupReport::default();

        for (_, name) in catalog.iter() {
            let dir = self.loader.class_dir(name);
            match remove_non_matching_files(&dir, &self.data.surviving_extensions) {
                Ok(class_report) => {
                    debug!(
                        "Cleaned '{}': removed {}, kept {}",
                        name,
                        class_report.removed.len(),
                        class_report.kept
                    );
                    report.merge(class_report);
                }
                Err(e) => {
                    warn!("Could not clean {}: {}", dir.display(), e);
                    report.record_failure(dir, e);
                }
            }
        }

        info!(
            "Cleanup removed {} files ({} failures)",
            report.removed.len(),
            report.failures.len()
        );
        report
    }

    /// Lists classes, runs cleanup when enabled, then scans for images
    pub fn discover(&self) -> Result<(Discovery, Option<CleanupReport>)> {
        let (catalog, mut skipped) = self.list_classes()?;

        let cleanup = self.data.cleanup.then(|| self.clean(&catalog));

        let files = catalog
            .iter()
            .map(|(_, name)| {
                self.loader
                    .scan_directory_recursive(&self.loader.class_dir(name), &mut skipped)
            })
            .collect();

        Ok((
            Discovery {
                catalog,
                files,
                skipped,
            },
            cleanup,
        ))
    }

    /// Runs the whole pipeline
    pub fn prepare(&self) -> Result<PreparedDataset> {
        self.prepare_with_progress(|_, _| {})
    }

    /// Runs the whole pipeline, calling `on_file(done, total)` after each decode attempt
    pub fn prepare_with_progress<F>(&self, mut on_file: F) -> Result<PreparedDataset>
    where
        F: FnMut(usize, usize),
    {
        let (discovery, cleanup) = self.discover()?;
        let total = discovery.total_files();
        info!(
            "Loading {} images from {} classes",
            total,
            discovery.catalog.len()
        );

        let mut report = PreparationReport {
            skipped: discovery.skipped,
            cleanup,
            discovered_per_class: discovery.files.iter().map(Vec::len).collect(),
            loaded_per_class: vec![0; discovery.catalog.len()],
            ..PreparationReport::default()
        };

        let mut samples = Vec::with_capacity(total);
        let mut done = 0;
        for (label, paths) in discovery.files.into_iter().enumerate() {
            for path in paths {
                match self.preprocessor.load(&path) {
                    Ok(features) => {
                        samples.push(Sample::new(features, label, path));
                        report.loaded_per_class[label] += 1;
                    }
                    Err(failure) => {
                        warn!("Skipping {}", failure);
                        report.load_failures.push(failure);
                    }
                }
                done += 1;
                on_file(done, total);
            }
        }

        if samples.is_empty() {
            return Err(Error::Dataset(format!(
                "No images could be loaded from {}",
                self.loader.root_dir().display()
            )));
        }

        let seed = self.data.seed().unwrap_or_else(entropy_seed);
        let parts = partition(samples, self.data.split, seed);
        report.seed = seed;
        report.split_sizes = parts.sizes();

        info!(
            "Split {} samples into train {}, validation {}, test {} (seed {})",
            report.total_loaded(),
            report.split_sizes[0],
            report.split_sizes[1],
            report.split_sizes[2],
            seed
        );
        if !report.load_failures.is_empty() {
            warn!("{} files could not be decoded", report.load_failures.len());
        }

        let shape = self.preprocessor.output_shape();
        let num_classes = discovery.catalog.len();

        Ok(PreparedDataset {
            train: LabeledTensors::from_samples(parts.train, shape, num_classes)?,
            validation: LabeledTensors::from_samples(parts.validation, shape, num_classes)?,
            test: LabeledTensors::from_samples(parts.test, shape, num_classes)?,
            catalog: discovery.catalog,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use vision_core::{SplitRatios, TensorShape};

    fn write_image(path: &Path, shade: u8) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        ImageBuffer::from_fn(10, 10, |x, _| Rgb([shade, x as u8 * 20, 255 - shade]))
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    fn small_preprocess() -> PreprocessConfig {
        PreprocessConfig {
            target_shape: TensorShape::new(8, 8, 3),
            ..PreprocessConfig::default()
        }
    }

    fn data_config(root: &Path) -> DataConfig {
        DataConfig {
            root_dir: root.to_path_buf(),
            excluded_classes: vec!["Faces".to_string()],
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_two_classes_of_100() {
        let temp_dir = TempDir::new().unwrap();
        for class in ["Cat", "Dog"] {
            for i in 0..100 {
                write_image(&temp_dir.path().join(class).join(format!("{i}.jpg")), i as u8);
            }
        }

        let preparer = DatasetPreparer::new(data_config(temp_dir.path()), small_preprocess()).unwrap();
        let dataset = preparer.prepare().unwrap();

        assert_eq!(dataset.catalog.names(), &["Cat", "Dog"]);
        assert_eq!(dataset.train.len(), 140);
        assert_eq!(dataset.validation.len(), 30);
        assert_eq!(dataset.test.len(), 30);
        assert_eq!(dataset.train.labels().num_classes(), 2);
        assert_eq!(dataset.report.loaded_per_class, vec![100, 100]);
        assert_eq!(dataset.report.seed, 42);
        assert_eq!(dataset.input_shape(), TensorShape::new(8, 8, 3));
    }

    #[test]
    fn test_corrupt_file_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let class_dir = temp_dir.path().join("Cat");
        for i in 0..9 {
            write_image(&class_dir.join(format!("{i}.jpg")), 10);
        }
        fs::write(class_dir.join("broken.jpg"), b"not an image").unwrap();

        let preparer = DatasetPreparer::new(data_config(temp_dir.path()), small_preprocess()).unwrap();
        let dataset = preparer.prepare().unwrap();

        assert_eq!(dataset.report.discovered_per_class, vec![10]);
        assert_eq!(dataset.report.loaded_per_class, vec![9]);
        assert_eq!(dataset.report.load_failures.len(), 1);
        assert!(dataset.report.load_failures[0].path.ends_with("broken.jpg"));
        assert_eq!(
            dataset.train.len() + dataset.validation.len() + dataset.test.len(),
            9
        );
    }

    #[test]
    fn test_cleanup_runs_before_discovery() {
        let temp_dir = TempDir::new().unwrap();
        let class_dir = temp_dir.path().join("Cat");
        write_image(&class_dir.join("a.jpg"), 1);
        write_image(&class_dir.join("b.png"), 2);
        fs::write(class_dir.join("c.txt"), b"notes").unwrap();

        let preparer = DatasetPreparer::new(data_config(temp_dir.path()), small_preprocess()).unwrap();
        let dataset = preparer.prepare().unwrap();

        assert!(class_dir.join("a.jpg").exists());
        assert!(!class_dir.join("b.png").exists());
        assert!(!class_dir.join("c.txt").exists());
        assert_eq!(dataset.report.cleanup.as_ref().unwrap().removed.len(), 2);
        assert_eq!(dataset.report.total_loaded(), 1);
    }

    #[test]
    fn test_cleanup_disabled_keeps_files() {
        let temp_dir = TempDir::new().unwrap();
        let class_dir = temp_dir.path().join("Cat");
        write_image(&class_dir.join("a.jpg"), 1);
        write_image(&class_dir.join("b.png"), 2);

        let mut data = data_config(temp_dir.path());
        data.cleanup = false;
        let dataset = DatasetPreparer::new(data, small_preprocess())
            .unwrap()
            .prepare()
            .unwrap();

        assert!(class_dir.join("b.png").exists());
        assert!(dataset.report.cleanup.is_none());
        assert_eq!(dataset.report.total_loaded(), 2);
    }

    #[test]
    fn test_same_seed_same_splits() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..20 {
            write_image(&temp_dir.path().join("A").join(format!("{i}.jpg")), i as u8 * 10);
        }

        let prepare = || {
            DatasetPreparer::new(data_config(temp_dir.path()), small_preprocess())
                .unwrap()
                .prepare()
                .unwrap()
        };
        let first = prepare();
        let second = prepare();

        assert_eq!(first.train.features(), second.train.features());
        assert_eq!(first.test.features(), second.test.features());
    }

    #[test]
    fn test_unseeded_run_can_be_replayed_from_report() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..20 {
            write_image(&temp_dir.path().join("A").join(format!("{i}.jpg")), i as u8 * 10);
        }

        let mut data = data_config(temp_dir.path());
        data.unseeded = true;
        let first = DatasetPreparer::new(data.clone(), small_preprocess())
            .unwrap()
            .prepare()
            .unwrap();

        data.set_seed(first.report.seed);
        let replay = DatasetPreparer::new(data, small_preprocess())
            .unwrap()
            .prepare()
            .unwrap();

        assert_eq!(replay.report.seed, first.report.seed);
        assert_eq!(first.train.features(), replay.train.features());
    }

    #[test]
    fn test_invalid_ratios_fail_before_io() {
        let mut data = data_config(Path::new("/nonexistent/dataset"));
        data.split = SplitRatios::new(0.9, 0.2);

        let result = DatasetPreparer::new(data, small_preprocess());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_only_excluded_classes() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir.path().join("Faces/1.jpg"), 0);

        let preparer = DatasetPreparer::new(data_config(temp_dir.path()), small_preprocess()).unwrap();
        assert!(matches!(preparer.prepare(), Err(Error::Dataset(_))));
    }

    #[test]
    fn test_progress_callback() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..3 {
            write_image(&temp_dir.path().join("A").join(format!("{i}.jpg")), 0);
        }

        let preparer = DatasetPreparer::new(data_config(temp_dir.path()), small_preprocess()).unwrap();
        let mut calls = Vec::new();
        preparer
            .prepare_with_progress(|done, total| calls.push((done, total)))
            .unwrap();

        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
