//! Destructive removal of unwanted files from class directories.
//!
//! Only the immediate files of a directory are inspected. Subdirectories
//! are left alone and so is everything below them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use vision_core::{normalize_extension, Result};

/// A file or directory the cleanup pass could not handle
#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// What a cleanup pass did
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Files that were deleted
    pub removed: Vec<PathBuf>,
    /// Number of files left in place
    pub kept: usize,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    /// Folds another report into this one
    pub fn merge(&mut self, other: CleanupReport) {
        self.removed.extend(other.removed);
        self.kept += other.kept;
        self.failures.extend(other.failures);
    }

    pub fn record_failure(&mut self, path: impl Into<PathBuf>, reason: impl ToString) {
        self.failures.push(CleanupFailure {
            path: path.into(),
            reason: reason.to_string(),
        });
    }
}

fn has_surviving_extension(path: &Path, surviving: &[String]) -> bool {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .is_some_and(|ext| surviving.iter().any(|s| normalize_extension(s) == ext))
}

/// Deletes every regular file directly inside `dir` whose extension is not
/// in `surviving`. Files without an extension are deleted too.
///
/// Failing to list `dir` is an error. Failing to delete a single file is
/// logged and recorded in the report.
pub fn remove_non_matching_files(dir: &Path, surviving: &[String]) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Unreadable entry in {}: {}", dir.display(), e);
                report.record_failure(dir, e);
                continue;
            }
        };

        if !path.is_file() {
            continue;
        }

        if has_surviving_extension(&path, surviving) {
            report.kept += 1;
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed: {}", path.display());
                report.removed.push(path);
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                report.record_failure(path, e);
            }
        }
    }

    report.removed.sort();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn jpg_only() -> Vec<String> {
        vec!["jpg".to_string()]
    }

    #[test]
    fn test_only_surviving_extension_remains() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in ["a.jpg", "b.png", "c.txt"] {
            fs::write(dir.join(name), b"x").unwrap();
        }

        let report = remove_non_matching_files(dir, &jpg_only()).unwrap();

        assert!(dir.join("a.jpg").exists());
        assert!(!dir.join("b.png").exists());
        assert!(!dir.join("c.txt").exists());
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.kept, 1);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_extension_match_ignores_case() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("UPPER.JPG"), b"x").unwrap();
        fs::write(dir.join("README"), b"x").unwrap();

        let report = remove_non_matching_files(dir, &[".Jpg".to_string()]).unwrap();

        assert!(dir.join("UPPER.JPG").exists());
        assert!(!dir.join("README").exists());
        assert_eq!(report.removed, vec![dir.join("README")]);
    }

    #[test]
    fn test_subdirectories_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/keep.png"), b"x").unwrap();

        let report = remove_non_matching_files(dir, &jpg_only()).unwrap();

        assert!(dir.join("nested/keep.png").exists());
        assert!(report.removed.is_empty());
        assert_eq!(report.kept, 0);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(remove_non_matching_files(Path::new("/nonexistent/class/dir"), &jpg_only()).is_err());
    }

    #[test]
    fn test_merge_reports() {
        let mut total = CleanupReport::default();
        total.merge(CleanupReport {
            removed: vec![PathBuf::from("x.png")],
            kept: 3,
            failures: Vec::new(),
        });
        total.record_failure("y.gif", "permission denied");

        assert_eq!(total.removed.len(), 1);
        assert_eq!(total.kept, 3);
        assert_eq!(total.failures.len(), 1);
    }
}
