use crate::error::{Error, MediaError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Entry-name marker of the main asset
pub const MAIN_MARKER: &str = "-main.";

/// Entry-name marker of the overlay asset
pub const OVERLAY_MARKER: &str = "-overlay.";

/// Entry prefix of macOS resource-fork metadata, never media
const PLATFORM_METADATA_PREFIX: &str = "__MACOSX/";

/// Main and overlay assets extracted from a split-media container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    /// The unmodified captured media
    pub main: PathBuf,
    /// Image or clip to composite on top of `main`, if the container had one
    pub overlay: Option<PathBuf>,
}

/// Role of a container entry, decided from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryRole {
    Main,
    Overlay,
    Ignored,
}

fn classify_entry(name: &str) -> EntryRole {
    if name.starts_with(PLATFORM_METADATA_PREFIX) {
        EntryRole::Ignored
    } else if name.contains(MAIN_MARKER) {
        EntryRole::Main
    } else if name.contains(OVERLAY_MARKER) {
        EntryRole::Overlay
    } else {
        EntryRole::Ignored
    }
}

/// Archive unpacker for ZIP containers
pub struct ZipExtractor;

impl ZipExtractor {
    /// Check whether a payload is a readable ZIP container
    ///
    /// Content is inspected, not the file name: downloaded payloads land in an
    /// extension-less `*_TEMP` file.
    pub fn is_zip(path: &Path) -> bool {
        match std::fs::File::open(path) {
            Ok(file) => zip::ZipArchive::new(file).is_ok(),
            Err(e) => {
                debug!(?path, error = %e, "cannot open payload for zip detection");
                false
            }
        }
    }

    /// Extract the main and overlay entries of `archive_path` into `dest_path`
    ///
    /// Directory entries, platform metadata and entries that are neither main
    /// nor overlay are skipped. A container without a main entry is
    /// [`MediaError::EmptyArchive`].
    pub fn extract_pair(archive_path: &Path, dest_path: &Path) -> Result<Unpacked> {
        debug!(?archive_path, ?dest_path, "extracting split media container");

        std::fs::create_dir_all(dest_path)?;

        let file = std::fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;

        let mut main = None;
        let mut overlay = None;

        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            let role = classify_entry(entry.name());
            let slot = match role {
                EntryRole::Main => &mut main,
                EntryRole::Overlay => &mut overlay,
                EntryRole::Ignored => {
                    debug!(entry = entry.name(), "ignoring container entry");
                    continue;
                }
            };
            if slot.is_some() {
                warn!(entry = entry.name(), ?role, "duplicate entry role, keeping the first");
                continue;
            }

            if let Some(path) = Self::extract_entry(entry, dest_path)? {
                *slot = Some(path);
            }
        }

        let main = main.ok_or_else(|| {
            Error::Media(MediaError::EmptyArchive {
                archive: archive_path.to_path_buf(),
            })
        })?;

        info!(
            ?archive_path,
            ?main,
            has_overlay = overlay.is_some(),
            "container unpacked"
        );

        Ok(Unpacked { main, overlay })
    }

    /// Write one entry as a flat file under `dest_path`
    fn extract_entry(mut entry: zip::read::ZipFile, dest_path: &Path) -> Result<Option<PathBuf>> {
        let file_name = match entry.enclosed_name().and_then(|p| p.file_name()) {
            Some(name) => name.to_owned(),
            None => {
                warn!(entry = entry.name(), "skipping entry with unsafe path");
                return Ok(None);
            }
        };

        let out_path = dest_path.join(file_name);
        let mut out = std::fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
        Ok(Some(out_path))
    }
}
