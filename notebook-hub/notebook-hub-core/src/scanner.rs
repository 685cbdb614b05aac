//! One-shot load of every notebook in a directory.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::loader::{is_hidden, LoadOutcome, NotebookLoader};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Identifiers stored with converted contents
    pub loaded: Vec<String>,
    /// Identifiers stored with fallback error contents
    pub failed: Vec<String>,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.loaded.len() + self.failed.len()
    }
}

/// Regular files directly inside `dir`, sorted by name. Subdirectories are
/// not descended into. Symlinks to regular files are included under the
/// link's name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && !is_hidden(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Load every file in `dir` into the store, at most `concurrency`
/// conversions at a time. An unreadable directory counts as empty.
pub async fn scan_all(dir: &Path, loader: &NotebookLoader, concurrency: usize) -> ScanReport {
    let files = match list_files(dir) {
        Ok(files) => files,
        Err(e) => {
            error!("cannot read notebook directory {}: {}", dir.display(), e);
            return ScanReport::default();
        }
    };
    info!("scanning {} files in {}", files.len(), dir.display());

    let outcomes: Vec<Option<LoadOutcome>> = stream::iter(files)
        .map(|path| async move { loader.load(&path).await })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = ScanReport::default();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            LoadOutcome::Converted(id) => report.loaded.push(id),
            LoadOutcome::Fallback(id) => report.failed.push(id),
        }
    }
    report.loaded.sort();
    report.failed.sort();
    report
}
