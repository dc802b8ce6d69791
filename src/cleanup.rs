//! Startup cleanup of artifacts left by an interrupted run

use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What [`clean_stale_artifacts`] removed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// `*_TEMP` and `*.zip` files removed
    pub files: usize,
    /// `*_zip` directories removed
    pub folders: usize,
    /// Removals that failed (logged, not fatal)
    pub failures: usize,
}

impl CleanupReport {
    /// Total entries removed
    pub fn removed(&self) -> usize {
        self.files + self.folders
    }
}

/// Kind of stale entry, decided from its name
enum Stale {
    File,
    Folder,
}

fn classify(name: &str, is_dir: bool) -> Option<Stale> {
    if is_dir {
        name.ends_with("_zip").then_some(Stale::Folder)
    } else if name.ends_with("_TEMP") || name.to_ascii_lowercase().ends_with(".zip") {
        Some(Stale::File)
    } else {
        None
    }
}

/// Remove transient per-record artifacts from the top level of `output_dir`
///
/// Deletes `*_zip/` directories, `*_TEMP` files and `*.zip` files. Individual
/// removal failures are logged as warnings and counted, not returned. A
/// missing directory is not an error.
pub async fn clean_stale_artifacts(output_dir: &Path) -> Result<CleanupReport> {
    use tokio::fs;

    let mut report = CleanupReport::default();
    let mut entries = match fs::read_dir(output_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?output_dir, "output directory does not exist, nothing to clean");
            return Ok(report);
        }
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<PathBuf> = Vec::new();
    let mut folders: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match classify(name, file_type.is_dir()) {
            Some(Stale::File) => files.push(entry.path()),
            Some(Stale::Folder) => folders.push(entry.path()),
            None => {}
        }
    }

    for file in &files {
        match fs::remove_file(file).await {
            Ok(()) => {
                debug!(?file, "deleted stale file");
                report.files += 1;
            }
            Err(e) => {
                warn!(?file, error = %e, "failed to delete stale file");
                report.failures += 1;
            }
        }
    }
    for folder in &folders {
        match fs::remove_dir_all(folder).await {
            Ok(()) => {
                debug!(?folder, "deleted stale folder");
                report.folders += 1;
            }
            Err(e) => {
                warn!(?folder, error = %e, "failed to delete stale folder");
                report.failures += 1;
            }
        }
    }

    if report.removed() > 0 {
        info!(
            files = report.files,
            folders = report.folders,
            "removed leftovers of an interrupted run"
        );
    }
    Ok(report)
}
