//! Names of every file a record may own in the output directory

use crate::types::ProcessingMode;
use crate::utils::{remove_dir_if_exists, remove_file_if_exists};
use std::path::PathBuf;

/// Extensions probed, in order, when looking for existing output
const CANDIDATE_EXTENSIONS: &[&str] = &["mp4", "mov", "jpg", "png", "webp"];

/// Permanent and transient paths of one record
///
/// For key `K` under directory `D`:
/// - `D/K_MAIN.{ext}` and `D/K_MERGED.{ext}` are the permanent outputs
/// - `D/K_TEMP`, `D/K.zip` and `D/K_zip/` exist only during an attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    dir: PathBuf,
    key: String,
}

impl ArtifactPaths {
    /// Paths for `key` under `dir`
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// The record key these paths belong to
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw output with the given extension
    pub fn main(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}_MAIN.{}", self.key, ext))
    }

    /// Merged output with the given extension
    pub fn merged(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}_MERGED.{}", self.key, ext))
    }

    /// Where the downloaded payload is first written
    pub fn temp(&self) -> PathBuf {
        self.dir.join(format!("{}_TEMP", self.key))
    }

    /// Where a container payload is moved before unpacking
    pub fn archive(&self) -> PathBuf {
        self.dir.join(format!("{}.zip", self.key))
    }

    /// Directory a container is unpacked into
    pub fn extract_dir(&self) -> PathBuf {
        self.dir.join(format!("{}_zip", self.key))
    }

    /// Existing-output candidates for `mode`, in lookup order
    ///
    /// Raw-only runs never look at merged files; the other modes prefer a
    /// merged output over the raw one.
    pub fn candidates(&self, mode: ProcessingMode) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(CANDIDATE_EXTENSIONS.len() * 2);
        if mode.builds_merged() {
            candidates.extend(CANDIDATE_EXTENSIONS.iter().map(|ext| self.merged(ext)));
        }
        candidates.extend(CANDIDATE_EXTENSIONS.iter().map(|ext| self.main(ext)));
        candidates
    }

    /// Remove the transient paths, ignoring ones that do not exist
    pub async fn cleanup_transient(&self) -> std::io::Result<()> {
        remove_file_if_exists(&self.temp()).await?;
        remove_file_if_exists(&self.archive()).await?;
        remove_dir_if_exists(&self.extract_dir()).await
    }

    /// Whether any candidate for `mode` exists with a non-zero size
    pub async fn has_output(&self, mode: ProcessingMode) -> bool {
        for candidate in self.candidates(mode) {
            if crate::utils::file_size(&candidate).await.unwrap_or(0) > 0 {
                return true;
            }
        }
        false
    }
}

/// Extension an archive entry's output is saved under
///
/// The extension is lowercased and `jpeg` is folded into `jpg` so the output
/// is found by [`ArtifactPaths::candidates`].
pub fn output_extension(entry_ext: Option<&str>, fallback: &'static str) -> String {
    match entry_ext.map(str::to_ascii_lowercase) {
        Some(ext) if ext == "jpeg" => "jpg".to_string(),
        Some(ext) if !ext.is_empty() => ext,
        _ => fallback.to_string(),
    }
}

/// Whether an output saved under `ext` is found by the existing-output check
pub fn is_candidate_extension(ext: &str) -> bool {
    CANDIDATE_EXTENSIONS.contains(&ext)
}
