//! Training CLI Tool
//!
//! Prepares an image dataset (cleanup, decoding, seeded split), trains the
//! CNN classifier with early stopping and reports test loss and accuracy.
//! Results are written to the configured output directory.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use vision_core::{
    load_toml_config, save_toml_config, setup_cli_logging, DataSplit, PipelineConfig, SplitRatios,
};
use vision_dataset::{DatasetPreparer, DatasetStatistics, PreparedDataset};
use vision_training::{
    checkpoint::MODEL_FILE, ArtifactWriter, Classifier, FitParams, RunMetadata, TrainableModel,
};

#[derive(Parser, Debug)]
#[command(name = "train")]
#[command(about = "Prepare an image dataset and train a CNN classifier on it", long_about = None)]
struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset root whose subdirectories are the classes
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Class directories to ignore (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Output directory for the model and reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of epochs
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Batch size
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Adam learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Epochs without validation improvement before stopping
    #[arg(long)]
    patience: Option<usize>,

    /// Train for the full number of epochs
    #[arg(long, conflicts_with = "patience")]
    no_early_stopping: bool,

    /// Fraction of samples used for training
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Fraction of samples used for validation
    #[arg(long)]
    val_ratio: Option<f64>,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Seed the shuffle from OS entropy
    #[arg(long, conflicts_with = "seed")]
    unseeded: bool,

    /// Square input size in pixels
    #[arg(long)]
    image_size: Option<usize>,

    /// Apply random augmentation to training batches
    #[arg(long)]
    augment: bool,

    /// Keep files whose extension would normally be deleted
    #[arg(long)]
    no_cleanup: bool,

    /// Do not write the trained weights
    #[arg(long)]
    no_save: bool,

    /// Prepare the dataset and print statistics without training; never deletes files
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Builds the effective configuration: file (or defaults), then flags
    fn to_config(&self) -> Result<PipelineConfig> {
        let mut config: PipelineConfig = match &self.config {
            Some(path) => load_toml_config(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data.root_dir = dir.clone();
        }
        if let Some(exclude) = &self.exclude {
            config.data.excluded_classes = exclude.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.output_dir = dir.clone();
        }
        if let Some(epochs) = self.epochs {
            config.training.max_epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(lr) = self.learning_rate {
            config.training.learning_rate = lr;
        }
        if let Some(patience) = self.patience {
            config.training.early_stopping = true;
            config.training.patience = patience;
        }
        if self.no_early_stopping {
            config.training.early_stopping = false;
        }
        if self.train_ratio.is_some() || self.val_ratio.is_some() {
            config.data.split = SplitRatios::new(
                self.train_ratio.unwrap_or(config.data.split.train),
                self.val_ratio.unwrap_or(config.data.split.validation),
            );
        }
        if let Some(seed) = self.seed {
            config.data.set_seed(seed);
        }
        if self.unseeded {
            config.data.unseeded = true;
        }
        if let Some(size) = self.image_size {
            config.preprocess.target_shape.height = size;
            config.preprocess.target_shape.width = size;
        }
        if self.augment {
            config.training.augmentation = true;
        }
        if self.no_cleanup || self.dry_run {
            config.data.cleanup = false;
        }
        if self.no_save {
            config.output.save_model = false;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_cli_logging(args.verbose)?;

    let mut config = args.to_config()?;

    println!("{}", "Image Classifier Training".green().bold());
    println!("  Data:       {}", config.data.root_dir.display());
    println!("  Input:      {}", config.preprocess.target_shape);
    println!(
        "  Split:      {:.2} / {:.2} / {:.2}",
        config.data.split.train,
        config.data.split.validation,
        config.data.split.test()
    );
    match config.data.seed() {
        Some(seed) => println!("  Seed:       {}", seed),
        None => println!("  Seed:       {}", "from entropy".yellow()),
    }
    if config.data.cleanup {
        println!(
            "  Cleanup:    {} (keeps only .{})",
            "enabled".yellow(),
            config.data.surviving_extensions.join(", .")
        );
    }
    println!();

    let dataset = prepare_dataset(&config)?;

    let stats = DatasetStatistics::from_prepared(&dataset);
    stats.log_summary();
    print_statistics(&stats);

    if args.dry_run {
        println!("{}", "Dry run: skipping training".yellow());
        return Ok(());
    }

    if dataset.train.is_empty() {
        bail!("The training split is empty; adjust the split ratios or add images");
    }

    // Record the seed actually drawn so config.toml replays this run
    config.data.set_seed(dataset.report.seed);

    let writer = ArtifactWriter::new(&config.output.output_dir)
        .context("Failed to create output directory")?;
    save_toml_config(&config, &writer.path("config.toml")).context("Failed to save config")?;
    writer.save_catalog(&dataset.catalog)?;
    writer.save_report(&dataset.report)?;

    println!("{}", "Training...".cyan());
    let mut model = Classifier::create(dataset.input_shape(), dataset.num_classes(), &config.model)
        .context("Failed to create model")?;
    let params = FitParams::from_config(&config.training, &config.augmentation, dataset.report.seed);
    let history = model
        .fit(&dataset.train, &dataset.validation, &params)
        .context("Training failed")?;
    writer.save_history(&history)?;

    if let Some(stopped) = history.stopped_epoch {
        println!(
            "  Stopped early at epoch {} (best epoch {})",
            stopped,
            history.best_epoch.map_or_else(|| "-".to_string(), |e| e.to_string())
        );
    }

    let test = if dataset.test.is_empty() {
        warn!("Test split is empty; skipping evaluation");
        None
    } else {
        let evaluation = model.evaluate(&dataset.test).context("Evaluation failed")?;
        writer.save_evaluation(&evaluation)?;
        println!();
        println!("Test loss: {:.4}", evaluation.loss);
        println!("Test accuracy: {:.4}", evaluation.accuracy);
        Some(evaluation)
    };

    writer.save_run(&RunMetadata::new(
        dataset.input_shape(),
        dataset.num_classes(),
        dataset.report.seed,
        &history,
        test,
    ))?;

    if config.output.save_model {
        model.save(&writer.path(MODEL_FILE))?;
    }

    println!();
    println!(
        "{} Results written to {}",
        "Done.".green().bold(),
        writer.output_dir().display()
    );
    Ok(())
}

fn prepare_dataset(config: &PipelineConfig) -> Result<PreparedDataset> {
    let preparer = DatasetPreparer::from_config(config)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    pb.set_message("decoding images");

    let dataset = preparer
        .prepare_with_progress(|done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })
        .with_context(|| {
            format!(
                "Failed to prepare dataset at {}",
                config.data.root_dir.display()
            )
        })?;
    pb.finish_with_message("done");

    let report = &dataset.report;
    if let Some(cleanup) = &report.cleanup {
        info!("Removed {} files during cleanup", cleanup.removed.len());
    }
    if !report.load_failures.is_empty() {
        println!(
            "{} {} files could not be decoded and were skipped",
            "Warning:".yellow(),
            report.load_failures.len()
        );
    }
    if !report.skipped.is_empty() {
        println!(
            "{} {} unreadable paths were skipped",
            "Warning:".yellow(),
            report.skipped.len()
        );
    }

    Ok(dataset)
}

fn print_statistics(stats: &DatasetStatistics) {
    println!();
    println!("{}", "Dataset Statistics:".cyan().bold());
    println!(
        "{:<30} {:>8} {:>11} {:>8}",
        "Class", "Train", "Validation", "Test"
    );
    println!("{}", "=".repeat(60));
    for class in &stats.classes {
        println!(
            "{:<30} {:>8} {:>11} {:>8}",
            class.name, class.train, class.validation, class.test
        );
    }
    println!("{}", "-".repeat(60));
    println!(
        "{:<30} {:>8} {:>11} {:>8}",
        "Total",
        stats.split_total(DataSplit::Train),
        stats.split_total(DataSplit::Validation),
        stats.split_total(DataSplit::Test)
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::path::Path;
    use tempfile::TempDir;

    fn parse(flags: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("train").chain(flags.iter().copied())).unwrap()
    }

    fn write_png(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        ImageBuffer::from_pixel(12, 12, Rgb([90u8, 120, 30]))
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        let config = parse(&[]).to_config().unwrap();
        let defaults = PipelineConfig::default();

        assert_eq!(config.data.root_dir, defaults.data.root_dir);
        assert_eq!(config.data.split, defaults.data.split);
        assert_eq!(config.data.seed(), Some(42));
        assert_eq!(config.training.early_stopping_patience(), Some(3));
        assert!(config.data.cleanup);
    }

    #[test]
    fn test_single_ratio_override_keeps_the_other() {
        let config = parse(&["--val-ratio", "0.1"]).to_config().unwrap();
        assert_eq!(config.data.split, SplitRatios::new(0.7, 0.1));

        let config = parse(&["--train-ratio", "0.5"]).to_config().unwrap();
        assert_eq!(config.data.split, SplitRatios::new(0.5, 0.15));
    }

    #[test]
    fn test_early_stopping_flags() {
        let config = parse(&["--no-early-stopping"]).to_config().unwrap();
        assert_eq!(config.training.early_stopping_patience(), None);

        let config = parse(&["--patience", "5"]).to_config().unwrap();
        assert_eq!(config.training.early_stopping_patience(), Some(5));

        assert!(Args::try_parse_from(["train", "--patience", "2", "--no-early-stopping"]).is_err());
    }

    #[test]
    fn test_seed_flags() {
        let config = parse(&["--unseeded"]).to_config().unwrap();
        assert_eq!(config.data.seed(), None);

        let config = parse(&["--seed", "7"]).to_config().unwrap();
        assert_eq!(config.data.seed(), Some(7));

        assert!(Args::try_parse_from(["train", "--seed", "1", "--unseeded"]).is_err());
    }

    #[test]
    fn test_invalid_flags_fail_before_io() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("never-created");
        let output_flag = output.to_string_lossy().to_string();

        let args = parse(&["--train-ratio", "0.9", "--val-ratio", "0.3", "--output-dir", &output_flag]);
        let err = args.to_config().unwrap_err();

        assert!(format!("{err:#}").contains("Configuration error"));
        assert!(!output.exists());

        assert!(parse(&["--batch-size", "0"]).to_config().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[training]\nmax_epochs = 4\nearly_stopping = false\n\n[data]\nseed = 11\n",
        )
        .unwrap();
        let path_flag = path.to_string_lossy().to_string();

        let config = parse(&["--config", &path_flag]).to_config().unwrap();
        assert_eq!(config.training.max_epochs, 4);
        assert_eq!(config.training.early_stopping_patience(), None);
        assert_eq!(config.data.seed(), Some(11));

        let config = parse(&["--config", &path_flag, "--epochs", "2", "--patience", "1"])
            .to_config()
            .unwrap();
        assert_eq!(config.training.max_epochs, 2);
        assert_eq!(config.training.early_stopping_patience(), Some(1));
    }

    #[test]
    fn test_dry_run_never_deletes_files() {
        let temp_dir = TempDir::new().unwrap();
        let class_dir = temp_dir.path().join("Cat");
        for name in ["a.jpg", "b.jpg", "c.png"] {
            write_png(&class_dir.join(name));
        }
        let data_flag = temp_dir.path().to_string_lossy().to_string();

        let config = parse(&["--data-dir", &data_flag, "--dry-run", "--image-size", "10"])
            .to_config()
            .unwrap();
        assert!(!config.data.cleanup);

        let dataset = prepare_dataset(&config).unwrap();
        assert!(class_dir.join("c.png").exists());
        assert!(dataset.report.cleanup.is_none());
        assert_eq!(dataset.report.total_loaded(), 3);
    }
}
