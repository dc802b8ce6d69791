//! Persistent, deduplicated ledger of permanently failed records

use crate::error::Result;
use crate::record::{RawRecord, Record};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A record that exhausted its attempts, with the last error
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// The record in export form
    #[serde(flatten)]
    pub record: RawRecord,
    /// Description of the final failure
    #[serde(rename = "_error")]
    pub error: String,
}

impl FailureEntry {
    /// Snapshot `record` with the error that ended its last attempt
    pub fn new(record: &Record, error: impl Into<String>) -> Self {
        Self {
            record: record.to_raw(),
            error: error.into(),
        }
    }

    /// Identity used for deduplication: the primary link, or the backup link
    /// when there is no primary
    pub fn dedup_key(&self) -> Option<&str> {
        self.record
            .media_download_url
            .as_deref()
            .or(self.record.download_link.as_deref())
    }
}

/// JSON-array ledger file shared by all workers of a run
///
/// Each [`FailureLedger::record`] call reloads the file, so entries from earlier
/// runs participate in deduplication. Writers inside one process are
/// serialized; concurrent processes are not coordinated.
#[derive(Debug)]
pub struct FailureLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailureLedger {
    /// Ledger stored at `path` (created on first append)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entry` unless an entry with the same dedup key is present
    ///
    /// Returns whether the entry was appended.
    pub async fn record(&self, entry: FailureEntry) -> Result<bool> {
        let _guard = self.lock.lock().await;

        let mut entries = self.read_entries().await;
        if let Some(key) = entry.dedup_key()
            && entries.iter().any(|e| e.dedup_key() == Some(key))
        {
            debug!(key, "failure already in ledger");
            return Ok(false);
        }

        info!(date = %entry.record.date, error = %entry.error, "recording permanent failure");
        entries.push(entry);

        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(true)
    }

    /// Current ledger contents (empty when missing or unreadable)
    pub async fn entries(&self) -> Vec<FailureEntry> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    async fn read_entries(&self) -> Vec<FailureEntry> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "cannot read failure ledger, starting empty");
                return Vec::new();
            }
        };
        serde_json::from_slice(&content).unwrap_or_else(|e| {
            warn!(path = ?self.path, error = %e, "corrupt failure ledger, starting empty");
            Vec::new()
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(primary: &str) -> Record {
        Record::new(
            Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap(),
            MediaKind::Image,
        )
        .with_primary_link(primary)
        .with_backup_link("https://backup.example/x")
    }

    #[tokio::test]
    async fn appends_and_dedups_by_primary_link() {
        let dir = tempdir().unwrap();
        let ledger = FailureLedger::new(dir.path().join("failed.json"));

        assert!(ledger.record(FailureEntry::new(&record("https://a"), "boom")).await.unwrap());
        assert!(!ledger.record(FailureEntry::new(&record("https://a"), "again")).await.unwrap());
        assert!(ledger.record(FailureEntry::new(&record("https://b"), "boom")).await.unwrap());

        let entries = ledger.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].error, "boom");
    }

    #[tokio::test]
    async fn file_format_keeps_export_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed.json");
        let ledger = FailureLedger::new(&path);
        ledger
            .record(FailureEntry::new(&record("https://a"), "all download links failed (2 tried)"))
            .await
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let first = &value.as_array().unwrap()[0];
        assert_eq!(first["Date"], "2023-05-01 10:00:00 UTC");
        assert_eq!(first["Media Download Url"], "https://a");
        assert_eq!(first["Media Type"], "Image");
        assert_eq!(first["Location"], "");
        assert!(first["latitude"].is_null());
        assert!(first["_error"].as_str().unwrap().starts_with("all download links failed"));
    }

    #[tokio::test]
    async fn corrupt_ledger_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let ledger = FailureLedger::new(&path);
        assert!(ledger.entries().await.is_empty());
        assert!(ledger.record(FailureEntry::new(&record("https://a"), "e")).await.unwrap());
        assert_eq!(ledger.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn dedup_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failed.json");
        FailureLedger::new(&path)
            .record(FailureEntry::new(&record("https://a"), "first run"))
            .await
            .unwrap();

        let reopened = FailureLedger::new(&path);
        assert!(!reopened.record(FailureEntry::new(&record("https://a"), "second run")).await.unwrap());
    }

    #[tokio::test]
    async fn backup_link_is_the_key_without_primary() {
        let entry = FailureEntry::new(
            &Record::new(Utc::now(), MediaKind::Video).with_backup_link("https://only-backup"),
            "e",
        );
        assert_eq!(entry.dedup_key(), Some("https://only-backup"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_duplicate() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(FailureLedger::new(dir.path().join("failed.json")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let link = format!("https://link/{}", i % 5);
                ledger.record(FailureEntry::new(&record(&link), "e")).await.unwrap()
            }));
        }
        let appended = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();

        assert_eq!(appended, 5);
        assert_eq!(ledger.entries().await.len(), 5);
    }
}
