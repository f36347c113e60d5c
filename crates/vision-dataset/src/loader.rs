//! Class and image discovery.
//!
//! Every immediate subdirectory of the dataset root is a class; image files
//! are collected recursively below it. Unreadable entries are skipped and
//! reported, never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use vision_core::{normalize_extension, ClassCatalog, Error, Result};
use walkdir::WalkDir;

/// A directory entry that discovery had to skip
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedEntry {
    fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result of scanning the dataset root
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Classes in label order
    pub catalog: ClassCatalog,
    /// Image paths per class, indexed by label
    pub files: Vec<Vec<PathBuf>>,
    /// Entries that could not be read
    pub skipped: Vec<SkippedEntry>,
}

impl Discovery {
    /// Total number of discovered image files
    pub fn total_files(&self) -> usize {
        self.files.iter().map(Vec::len).sum()
    }
}

/// Image loader for a class-per-directory dataset
pub struct ImageLoader {
    /// Root directory containing class directories
    root_dir: PathBuf,
    /// Lower-case extensions without a leading dot
    accepted_extensions: Vec<String>,
}

impl ImageLoader {
    /// Creates a new image loader
    pub fn new(root_dir: impl Into<PathBuf>, accepted_extensions: &[String]) -> Self {
        Self {
            root_dir: root_dir.into(),
            accepted_extensions: accepted_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory holding the images of `class_name`
    pub fn class_dir(&self, class_name: &str) -> PathBuf {
        self.root_dir.join(class_name)
    }

    /// Case-insensitive extension check
    pub fn is_accepted(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.accepted_extensions.iter().any(|a| *a == ext))
    }

    /// Lists class directories under the root, minus `excluded`, sorted by name
    pub fn list_classes(&self, excluded: &[String]) -> Result<(ClassCatalog, Vec<SkippedEntry>)> {
        if !self.root_dir.exists() {
            return Err(Error::NotFound(self.root_dir.clone()));
        }
        if !self.root_dir.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "Dataset root is not a directory: {}",
                self.root_dir.display()
            )));
        }

        let mut skipped = Vec::new();
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.root_dir.display(), e);
                    skipped.push(SkippedEntry::new(&self.root_dir, e));
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping class directory with a non UTF-8 name: {}", path.display());
                skipped.push(SkippedEntry::new(path, "non UTF-8 directory name"));
                continue;
            };

            if excluded.iter().any(|e| *e == name) {
                debug!("Excluding directory '{}'", name);
                continue;
            }

            names.push(name);
        }

        names.sort();
        info!("Found {} classes in {}", names.len(), self.root_dir.display());

        Ok((ClassCatalog::new(names)?, skipped))
    }

    /// Recursively collects accepted image files under `dir`, sorted by path
    pub fn scan_directory_recursive(&self, dir: &Path, skipped: &mut Vec<SkippedEntry>) -> Vec<PathBuf> {
        let mut images = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).follow_links(true) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_accepted(entry.path()) {
                        images.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                    warn!("Skipping unreadable path {}: {}", path.display(), e);
                    skipped.push(SkippedEntry::new(path, e));
                }
            }
        }

        images.sort();
        images
    }

    /// Lists the classes and scans each of them for images
    pub fn discover(&self, excluded: &[String]) -> Result<Discovery> {
        let (catalog, mut skipped) = self.list_classes(excluded)?;

        let files = catalog
            .iter()
            .map(|(label, name)| {
                let images = self.scan_directory_recursive(&self.class_dir(name), &mut skipped);
                debug!("Class '{}' (label {}): {} images", name, label, images.len());
                images
            })
            .collect();

        Ok(Discovery {
            catalog,
            files,
            skipped,
        })
    }
}
