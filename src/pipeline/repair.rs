//! Gap scan used by the repair pass

use super::artifacts::ArtifactPaths;
use crate::record::Record;
use crate::types::ProcessingMode;
use std::path::Path;

/// Records (with at least one link) that have no non-empty output candidate
pub async fn scan_for_gaps(
    records: &[Record],
    output_dir: &Path,
    mode: ProcessingMode,
) -> Vec<Record> {
    let mut gaps = Vec::new();
    for record in records.iter().filter(|r| !r.is_inert()) {
        let paths = ArtifactPaths::new(output_dir, record.key());
        if !paths.has_output(mode).await {
            gaps.push(record.clone());
        }
    }
    gaps
}
