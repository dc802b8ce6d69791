//! Core types for memories-dl

use serde::{Deserialize, Serialize};

/// Media kind of a record, as declared by the export
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video clip
    Video,
    /// Missing or unrecognised media type
    #[default]
    Unknown,
}

impl MediaKind {
    /// Map the export's free-form "Media Type" value to a kind
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(l) if l.eq_ignore_ascii_case("image") => MediaKind::Image,
            Some(l) if l.eq_ignore_ascii_case("video") => MediaKind::Video,
            _ => MediaKind::Unknown,
        }
    }

    /// The label written back into the failure ledger
    pub fn label(&self) -> Option<&'static str> {
        match self {
            MediaKind::Image => Some("Image"),
            MediaKind::Video => Some("Video"),
            MediaKind::Unknown => None,
        }
    }

    /// Extension used for a direct (non-archive) payload of this kind
    pub fn direct_extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Image | MediaKind::Unknown => "jpg",
        }
    }

    /// Which worker queue handles this kind. Anything that is not an image is
    /// treated as video work.
    pub fn queue(&self) -> QueueKind {
        match self {
            MediaKind::Image => QueueKind::Image,
            MediaKind::Video | MediaKind::Unknown => QueueKind::Video,
        }
    }
}

/// The two per-kind work queues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Image queue (cheap, high volume)
    Image,
    /// Video queue (bounded by the transcode tool)
    Video,
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueKind::Image => write!(f, "image"),
            QueueKind::Video => write!(f, "video"),
        }
    }
}

/// Run-wide processing mode, chosen once before the run starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Keep the raw asset and the merged asset (default)
    #[default]
    KeepBoth,
    /// Keep the merged asset when one was built, otherwise the raw asset
    Optimized,
    /// Keep only the raw asset; overlays are discarded
    RawOnly,
}

impl ProcessingMode {
    /// Map the interactive menu choice (1, 2 or 3) to a mode
    pub fn from_choice(choice: u8) -> Option<Self> {
        match choice {
            1 => Some(ProcessingMode::KeepBoth),
            2 => Some(ProcessingMode::Optimized),
            3 => Some(ProcessingMode::RawOnly),
            _ => None,
        }
    }

    /// Whether overlays are merged at all under this mode
    pub fn builds_merged(&self) -> bool {
        !matches!(self, ProcessingMode::RawOnly)
    }

    /// Human-readable name for the configuration banner
    pub fn describe(&self) -> &'static str {
        match self {
            ProcessingMode::KeepBoth => "Keep Both",
            ProcessingMode::Optimized => "Optimized",
            ProcessingMode::RawOnly => "Raw Only",
        }
    }
}

impl std::str::FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "1" | "keep-both" | "both" => Ok(ProcessingMode::KeepBoth),
            "2" | "optimized" => Ok(ProcessingMode::Optimized),
            "3" | "raw-only" | "raw" => Ok(ProcessingMode::RawOnly),
            other => Err(format!(
                "unknown processing mode '{other}' (expected keep-both, optimized or raw-only)"
            )),
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Priority order of a record's two links
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOrder {
    /// `[primary, backup]`, used by the main pass
    #[default]
    PrimaryFirst,
    /// `[backup, primary]`, used by the repair pass
    BackupFirst,
}

/// Final outcome of processing one record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Valid output already existed; nothing was downloaded
    AlreadyPresent,
    /// Output produced on the given attempt
    Downloaded {
        /// Attempt number that succeeded (1-based)
        attempt: u32,
    },
    /// All attempts failed; a ledger entry was written
    Failed,
    /// The record has no links and was skipped
    Inert,
}
