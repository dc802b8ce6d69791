//! Input records: parsing, output keys and the export document loader.

use crate::error::{RecordError, Result};
use crate::types::{LinkOrder, MediaKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// `strftime` pattern of a record's output key (second resolution)
const KEY_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `strftime` pattern used when a record is written back to the ledger
const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Accepted capture timestamp formats, tried in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateFormat {
    /// RFC 3339 / ISO-8601 with an offset, e.g. `2023-05-01T10:00:00+02:00`
    Rfc3339,
    /// ISO-8601 without offset, e.g. `2023-05-01T10:00:00.250`; read as UTC
    IsoNaive,
    /// `2023-05-01 10:00:00 UTC` (also `GMT` or `Z`)
    NamedUtc,
    /// `2023-05-01 10:00:00 +0200` or `+02:00`
    NumericOffset,
    /// `2023-05-01 10:00:00`; read as UTC
    Plain,
}

/// The fixed, ordered list of formats [`parse_timestamp`] tries
pub const ACCEPTED_DATE_FORMATS: [DateFormat; 5] = [
    DateFormat::Rfc3339,
    DateFormat::IsoNaive,
    DateFormat::NamedUtc,
    DateFormat::NumericOffset,
    DateFormat::Plain,
];

impl DateFormat {
    fn parse(&self, input: &str) -> Option<DateTime<Utc>> {
        match self {
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::IsoNaive => NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.and_utc()),
            DateFormat::NamedUtc => {
                let (wall, zone) = input.rsplit_once(' ')?;
                if !["UTC", "GMT", "Z"].contains(&zone) {
                    return None;
                }
                NaiveDateTime::parse_from_str(wall.trim_end(), "%Y-%m-%d %H:%M:%S%.f")
                    .ok()
                    .map(|dt| dt.and_utc())
            }
            DateFormat::NumericOffset => ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S %:z"]
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(input, fmt).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::Plain => NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|dt| dt.and_utc()),
        }
    }
}

/// Parse a capture timestamp, failing closed when no accepted format matches
///
/// ```
/// use memories_dl::record::parse_timestamp;
///
/// let ts = parse_timestamp("2023-05-01 10:00:00 UTC").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2023-05-01T10:00:00+00:00");
/// assert!(parse_timestamp("May 1st").is_err());
/// ```
pub fn parse_timestamp(input: &str) -> std::result::Result<DateTime<Utc>, RecordError> {
    let trimmed = input.trim();
    ACCEPTED_DATE_FORMATS
        .iter()
        .find_map(|format| format.parse(trimmed))
        .ok_or_else(|| RecordError::UnknownDateFormat(trimmed.to_string()))
}

/// One record as it appears in the export (and in the failure ledger)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Capture timestamp text
    #[serde(rename = "Date")]
    pub date: String,

    /// Primary download URL
    #[serde(rename = "Media Download Url", default)]
    pub media_download_url: Option<String>,

    /// Backup download URL
    #[serde(rename = "Download Link", default)]
    pub download_link: Option<String>,

    /// "Image", "Video" or absent
    #[serde(rename = "Media Type", default)]
    pub media_type: Option<String>,

    /// Free-text location
    #[serde(rename = "Location", default)]
    pub location: Option<String>,

    /// Latitude in decimal degrees
    #[serde(rename = "latitude", alias = "Latitude", default)]
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees
    #[serde(rename = "longitude", alias = "Longitude", default)]
    pub longitude: Option<f64>,
}

/// A parsed, immutable input record
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Capture instant
    pub timestamp: DateTime<Utc>,
    /// Primary download URL
    pub primary_link: Option<String>,
    /// Backup download URL
    pub backup_link: Option<String>,
    /// Declared media kind
    pub kind: MediaKind,
    /// Free-text location
    pub location: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    key: String,
}

impl Record {
    /// Create a record with no links or location
    pub fn new(timestamp: DateTime<Utc>, kind: MediaKind) -> Self {
        Self {
            key: timestamp.format(KEY_FORMAT).to_string(),
            timestamp,
            primary_link: None,
            backup_link: None,
            kind,
            location: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Set the primary link
    pub fn with_primary_link(mut self, link: impl Into<String>) -> Self {
        self.primary_link = non_empty(Some(link.into()));
        self
    }

    /// Set the backup link
    pub fn with_backup_link(mut self, link: impl Into<String>) -> Self {
        self.backup_link = non_empty(Some(link.into()));
        self
    }

    /// Parse one export entry
    pub fn from_raw(raw: &RawRecord) -> std::result::Result<Self, RecordError> {
        let timestamp = parse_timestamp(&raw.date)?;
        let mut record = Record::new(timestamp, MediaKind::from_label(raw.media_type.as_deref()));
        record.primary_link = non_empty(raw.media_download_url.clone());
        record.backup_link = non_empty(raw.download_link.clone());
        record.location = non_empty(raw.location.clone());
        record.latitude = raw.latitude;
        record.longitude = raw.longitude;
        Ok(record)
    }

    /// Render the record back into export form
    ///
    /// A missing location is written as an empty string.
    pub fn to_raw(&self) -> RawRecord {
        RawRecord {
            date: self.timestamp.format(LEDGER_DATE_FORMAT).to_string(),
            media_download_url: self.primary_link.clone(),
            download_link: self.backup_link.clone(),
            media_type: self.kind.label().map(str::to_string),
            location: Some(self.location.clone().unwrap_or_default()),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Filename stem that identifies this record's output files
    pub fn key(&self) -> &str {
        &self.key
    }

    /// A record with neither link produces nothing and is skipped
    pub fn is_inert(&self) -> bool {
        self.primary_link.is_none() && self.backup_link.is_none()
    }

    /// Candidate links in the requested priority order, absent links dropped
    pub fn links(&self, order: LinkOrder) -> Vec<&str> {
        let (first, second) = match order {
            LinkOrder::PrimaryFirst => (&self.primary_link, &self.backup_link),
            LinkOrder::BackupFirst => (&self.backup_link, &self.primary_link),
        };
        [first, second]
            .into_iter()
            .filter_map(|link| link.as_deref())
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Append `_2`, `_3`, ... to keys shared by several records, in input order
///
/// The first record keeps the bare key, so the assignment is stable across
/// runs over the same input. Returns the number of records that were renamed.
pub fn disambiguate_keys(records: &mut [Record]) -> usize {
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut renamed = 0;
    for record in records.iter_mut() {
        let count = seen.entry(record.key.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            let new_key = format!("{}_{}", record.key, count);
            warn!(
                key = %record.key,
                new_key = %new_key,
                "records share a capture second, disambiguating output key"
            );
            record.key = new_key;
            renamed += 1;
        }
    }
    renamed
}

/// Records loaded from an export document
#[derive(Debug, Default)]
pub struct LoadedRecords {
    /// Successfully parsed records, keys already disambiguated
    pub records: Vec<Record>,
    /// Entries that failed to parse: (index in the document, reason)
    pub rejected: Vec<(usize, RecordError)>,
}

#[derive(Deserialize)]
struct ExportDocument {
    #[serde(rename = "Saved Media")]
    saved_media: Vec<RawRecord>,
}

/// Parse an export document held in memory
pub fn parse_document(content: &[u8]) -> Result<LoadedRecords> {
    let document: ExportDocument = serde_json::from_slice(content)?;
    let mut loaded = LoadedRecords::default();
    for (index, raw) in document.saved_media.iter().enumerate() {
        match Record::from_raw(raw) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                warn!(index, error = %e, "skipping unparseable record");
                loaded.rejected.push((index, e));
            }
        }
    }
    disambiguate_keys(&mut loaded.records);
    Ok(loaded)
}

/// Load and parse an export document from disk
pub async fn load_records(path: &Path) -> Result<LoadedRecords> {
    let content = tokio::fs::read(path).await?;
    let loaded = parse_document(&content)?;
    info!(
        ?path,
        records = loaded.records.len(),
        rejected = loaded.rejected.len(),
        "loaded export document"
    );
    Ok(loaded)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_every_accepted_format() {
        let expected = utc(2023, 5, 1, 10, 0, 0);
        for input in [
            "2023-05-01T10:00:00Z",
            "2023-05-01T12:00:00+02:00",
            "2023-05-01T10:00:00",
            "2023-05-01T10:00:00.000",
            "2023-05-01 10:00:00 UTC",
            "2023-05-01 10:00:00 GMT",
            "2023-05-01 12:00:00 +0200",
            "2023-05-01 12:00:00 +02:00",
            "2023-05-01 10:00:00",
            "  2023-05-01 10:00:00 UTC  ",
        ] {
            assert_eq!(parse_timestamp(input).unwrap(), expected, "input {input:?}");
        }
    }

    #[test]
    fn unknown_format_fails_closed() {
        for input in ["", "yesterday", "2023/05/01 10:00:00", "2023-05-01 10:00:00 PST"] {
            assert_eq!(
                parse_timestamp(input),
                Err(RecordError::UnknownDateFormat(input.trim().to_string()))
            );
        }
    }

    #[test]
    fn key_is_second_resolution_stem() {
        let record = Record::new(parse_timestamp("2023-05-01 10:00:00.900").unwrap(), MediaKind::Image);
        assert_eq!(record.key(), "2023-05-01_10-00-00");
    }

    #[test]
    fn from_raw_maps_fields_and_drops_empty_links() {
        let raw = RawRecord {
            date: "2023-05-01 10:00:00 UTC".into(),
            media_download_url: Some("https://example.com/a".into()),
            download_link: Some("  ".into()),
            media_type: Some("Video".into()),
            location: Some("".into()),
            latitude: Some(52.5),
            longitude: Some(13.4),
        };
        let record = Record::from_raw(&raw).unwrap();
        assert_eq!(record.kind, MediaKind::Video);
        assert_eq!(record.primary_link.as_deref(), Some("https://example.com/a"));
        assert_eq!(record.backup_link, None);
        assert_eq!(record.location, None);
        assert_eq!(record.latitude, Some(52.5));
        assert!(!record.is_inert());
    }

    #[test]
    fn record_without_links_is_inert() {
        let record = Record::new(utc(2023, 1, 1, 0, 0, 0), MediaKind::Image);
        assert!(record.is_inert());
        assert!(record.links(LinkOrder::PrimaryFirst).is_empty());
    }

    #[test]
    fn link_order_can_be_reversed() {
        let record = Record::new(utc(2023, 1, 1, 0, 0, 0), MediaKind::Image)
            .with_primary_link("https://p")
            .with_backup_link("https://b");
        assert_eq!(record.links(LinkOrder::PrimaryFirst), vec!["https://p", "https://b"]);
        assert_eq!(record.links(LinkOrder::BackupFirst), vec!["https://b", "https://p"]);

        let only_primary = Record::new(utc(2023, 1, 1, 0, 0, 0), MediaKind::Image)
            .with_primary_link("https://p");
        assert_eq!(only_primary.links(LinkOrder::BackupFirst), vec!["https://p"]);
    }

    #[test]
    fn to_raw_renders_ledger_date() {
        let record = Record::new(utc(2023, 5, 1, 10, 0, 0), MediaKind::Image)
            .with_primary_link("https://p");
        let raw = record.to_raw();
        assert_eq!(raw.date, "2023-05-01 10:00:00 UTC");
        assert_eq!(raw.media_type.as_deref(), Some("Image"));
        assert_eq!(Record::from_raw(&raw).unwrap(), record);
    }

    #[test]
    fn ledger_shape_uses_empty_location_and_lowercase_coordinates() {
        let mut record = Record::new(utc(2023, 5, 1, 10, 0, 0), MediaKind::Image)
            .with_primary_link("https://p");
        record.latitude = Some(1.5);

        let value = serde_json::to_value(record.to_raw()).unwrap();
        assert_eq!(value["Location"], "");
        assert_eq!(value["latitude"], 1.5);
        assert!(value["longitude"].is_null());
        assert!(value.get("Latitude").is_none());

        let back: RawRecord = serde_json::from_value(value).unwrap();
        assert_eq!(Record::from_raw(&back).unwrap(), record);
    }

    #[test]
    fn capitalized_coordinates_still_parse() {
        let raw: RawRecord = serde_json::from_str(
            r#"{"Date": "2023-05-01 10:00:00 UTC", "Latitude": 3.0, "Longitude": 4.0}"#,
        )
        .unwrap();
        assert_eq!(raw.latitude, Some(3.0));
        assert_eq!(raw.longitude, Some(4.0));
    }

    #[test]
    fn colliding_keys_get_stable_suffixes() {
        let ts = utc(2023, 5, 1, 10, 0, 0);
        let mut records = vec![
            Record::new(ts, MediaKind::Image),
            Record::new(utc(2023, 5, 1, 10, 0, 1), MediaKind::Image),
            Record::new(ts, MediaKind::Video),
            Record::new(ts, MediaKind::Image),
        ];
        assert_eq!(disambiguate_keys(&mut records), 2);
        let keys: Vec<&str> = records.iter().map(Record::key).collect();
        assert_eq!(
            keys,
            vec![
                "2023-05-01_10-00-00",
                "2023-05-01_10-00-01",
                "2023-05-01_10-00-00_2",
                "2023-05-01_10-00-00_3",
            ]
        );
    }

    #[test]
    fn parse_document_reports_rejected_entries() {
        let doc = br#"{
            "Saved Media": [
                {"Date": "2023-05-01 10:00:00 UTC", "Media Type": "Image",
                 "Media Download Url": "https://example.com/1"},
                {"Date": "not a date", "Media Type": "Video"},
                {"Date": "2023-05-02T08:30:00Z", "Download Link": "https://example.com/2",
                 "latitude": 1.5, "longitude": -2.25}
            ]
        }"#;
        let loaded = parse_document(doc).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.rejected.len(), 1);
        assert_eq!(loaded.rejected[0].0, 1);
        assert_eq!(loaded.records[1].kind, MediaKind::Unknown);
        assert_eq!(loaded.records[1].latitude, Some(1.5));
        assert_eq!(loaded.records[1].backup_link.as_deref(), Some("https://example.com/2"));
    }

    #[test]
    fn malformed_document_is_fatal() {
        assert!(matches!(
            parse_document(b"{\"Saved Media\": 3}"),
            Err(crate::Error::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn load_records_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories_history.json");
        std::fs::write(
            &path,
            r#"{"Saved Media": [{"Date": "2023-05-01 10:00:00 UTC"}]}"#,
        )
        .unwrap();
        let loaded = load_records(&path).await.unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert!(loaded.records[0].is_inert());
    }
}
