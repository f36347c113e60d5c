//! Dataset maintenance tool.
//!
//! - `clean`: delete files whose extension is not in the surviving set
//! - `analyze`: count images per class and project the split sizes
//! - `split`: run the full preparation and report per-split class counts

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::info;
use vision_core::{load_toml_config, setup_cli_logging, PipelineConfig, SplitRatios};
use vision_dataset::{split_bounds, DatasetPreparer, DatasetStatistics, ImageLoader};

#[derive(Parser)]
#[command(name = "prepare")]
#[command(about = "Dataset maintenance for directory-per-class image collections", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand
#[derive(Args)]
struct DatasetArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset root whose subdirectories are the classes
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Class directories to ignore (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,
}

impl DatasetArgs {
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
        Ok(config)
    }
}

/// Options of the `clean` subcommand
#[derive(Args)]
struct CleanArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Extensions to keep (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    keep: Option<Vec<String>>,
}

impl CleanArgs {
    fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = self.dataset.to_config()?;
        if let Some(keep) = &self.keep {
            config.data.surviving_extensions = keep.clone();
        }
        config.data.cleanup = true;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Options of the `split` subcommand
#[derive(Args)]
struct SplitArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Training set ratio
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Validation set ratio
    #[arg(long)]
    val_ratio: Option<f64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Also run the destructive cleanup pass first
    #[arg(long)]
    cleanup: bool,

    /// Output file for statistics (JSON)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl SplitArgs {
    /// Report-only unless `--cleanup` is given, whatever the config file says
    fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = self.dataset.to_config()?;
        if self.train_ratio.is_some() || self.val_ratio.is_some() {
            config.data.split = SplitRatios::new(
                self.train_ratio.unwrap_or(config.data.split.train),
                self.val_ratio.unwrap_or(config.data.split.validation),
            );
        }
        if let Some(seed) = self.seed {
            config.data.set_seed(seed);
        }
        config.data.cleanup = self.cleanup;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Delete every file whose extension is not kept (destructive)
    Clean(CleanArgs),

    /// Count images per class without decoding or deleting anything
    Analyze {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Output file for statistics (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode and split the dataset, then report the split composition
    Split(SplitArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_cli_logging(cli.verbose)?;

    match cli.command {
        Commands::Clean(args) => clean_dataset(&args.to_config()?)?,
        Commands::Analyze { dataset, output } => {
            let report = analyze_dataset(&dataset.to_config()?)?;
            print_analysis(&report);
            if let Some(path) = output {
                write_json(&path, &report)?;
            }
        }
        Commands::Split(args) => split_dataset(&args.to_config()?, args.output.as_deref())?,
    }

    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Statistics saved to {}", path.display());
    Ok(())
}

/// Runs only the cleanup pass
fn clean_dataset(config: &PipelineConfig) -> Result<()> {
    let preparer = DatasetPreparer::from_config(config).context("Invalid configuration")?;

    println!(
        "{} deleting every file not ending in .{} under {}",
        "Warning:".red().bold(),
        config.data.surviving_extensions.join(", ."),
        config.data.root_dir.display()
    );
    info!("Cleaning {}", config.data.root_dir.display());
    let (catalog, _) = preparer
        .loader()
        .list_classes(&config.data.excluded_classes)
        .context("Failed to list class directories")?;
    let report = preparer.clean(&catalog);

    println!("\n{}\n", "Cleanup Report".cyan().bold());
    println!("  Classes:  {}", catalog.len());
    println!("  Kept:     {}", report.kept);
    println!("  Removed:  {}", report.removed.len().to_string().yellow());
    if !report.failures.is_empty() {
        println!("  Failures: {}", report.failures.len().to_string().red());
        for failure in &report.failures {
            println!("    {}: {}", failure.path.display(), failure.reason);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ClassImageCount {
    name: String,
    images: usize,
}

#[derive(Serialize)]
struct AnalysisReport {
    root_dir: PathBuf,
    classes: Vec<ClassImageCount>,
    total_images: usize,
    /// `[train, validation, test]` if every image decodes
    projected_split: [usize; 3],
    skipped_paths: usize,
}

/// Counts discoverable images without deleting or decoding anything
fn analyze_dataset(config: &PipelineConfig) -> Result<AnalysisReport> {
    config.validate().context("Invalid configuration")?;
    let loader = ImageLoader::new(&config.data.root_dir, &config.data.accepted_extensions);
    let discovery = loader
        .discover(&config.data.excluded_classes)
        .with_context(|| format!("Failed to scan {}", config.data.root_dir.display()))?;

    let total = discovery.total_files();
    let (idx_val, idx_test) = split_bounds(total, config.data.split);
    Ok(AnalysisReport {
        root_dir: config.data.root_dir.clone(),
        classes: discovery
            .catalog
            .iter()
            .map(|(label, name)| ClassImageCount {
                name: name.to_string(),
                images: discovery.files[label].len(),
            })
            .collect(),
        total_images: total,
        projected_split: [idx_val, idx_test - idx_val, total - idx_test],
        skipped_paths: discovery.skipped.len(),
    })
}

fn print_analysis(report: &AnalysisReport) {
    println!("\n{}\n", "Dataset Statistics".cyan().bold());
    println!("{:<40} {:>10}", "Class", "Images");
    println!("{}", "=".repeat(52));
    for class in &report.classes {
        println!("{:<40} {:>10}", class.name, class.images);
    }
    println!("{}", "-".repeat(52));
    println!("{:<40} {:>10}", "Total", report.total_images);
    println!(
        "\nProjected split: train {}, validation {}, test {}",
        report.projected_split[0], report.projected_split[1], report.projected_split[2]
    );
    if report.skipped_paths > 0 {
        println!(
            "{} {} unreadable paths skipped",
            "Warning:".yellow(),
            report.skipped_paths
        );
    }
}

/// Runs the full preparation and prints the class composition of each split
fn split_dataset(config: &PipelineConfig, output: Option<&Path>) -> Result<()> {
    let preparer = DatasetPreparer::from_config(config).context("Invalid configuration")?;
    let dataset = preparer.prepare().context("Failed to prepare dataset")?;
    let stats = DatasetStatistics::from_prepared(&dataset);

    println!("\n{}\n", "Split Composition".cyan().bold());
    println!("  Seed: {}", dataset.report.seed);
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
    if !dataset.report.load_failures.is_empty() {
        println!(
            "\n{} {} files failed to decode:",
            "Warning:".yellow(),
            dataset.report.load_failures.len()
        );
        for failure in &dataset.report.load_failures {
            println!("  {}", failure);
        }
    }

    if let Some(path) = output {
        write_json(path, &stats)?;
    }
    Ok(())
}
