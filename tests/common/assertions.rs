//! Custom assertions over the output directory

use std::path::Path;

/// Sorted file names directly inside `dir` (empty when it does not exist)
pub fn list_outputs(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert `dir` holds exactly `expected` and nothing transient
pub fn assert_outputs(dir: &Path, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(list_outputs(dir), expected, "unexpected contents of {:?}", dir);
}

/// Name of `key`'s output with the given role (`MAIN` / `MERGED`) and extension
pub fn output_name(key: &str, role: &str, ext: &str) -> String {
    format!("{key}_{role}.{ext}")
}
