//! Flat JSON file stores.

pub mod admin;
pub mod notifications;
pub mod preferences;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use admin::AdminStore;
pub use notifications::NotificationStore;
pub use preferences::PreferenceStore;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON in '{}': {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("{0}")]
    Invalid(String),
}

/// Read a JSON document. `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Io { path: path.to_path_buf(), source: e }),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Json { path: path.to_path_buf(), source: e })
}

/// Write a JSON document via a temp file and rename.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Json { path: path.to_path_buf(), source: e })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| StoreError::Io { path: tmp.clone(), source: e })?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::Io { path: path.to_path_buf(), source: e })
}

pub(crate) fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    std::fs::create_dir_all(path).map_err(|e| StoreError::Io { path: path.to_path_buf(), source: e })
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// Guard for read-modify-write sequences; a poisoned lock is still usable.
pub(crate) fn lock(m: &std::sync::Mutex<()>) -> std::sync::MutexGuard<'_, ()> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let value: Option<BTreeMap<String, u32>> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        let value = BTreeMap::from([("a".to_string(), 1u32)]);
        write_json(&path, &value).unwrap();
        let back: BTreeMap<String, u32> = read_json(&path).unwrap().unwrap();
        assert_eq!(back, value);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        let result: Result<Option<BTreeMap<String, u32>>, _> = read_json(&path);
        assert!(matches!(result, Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_timestamp_format() {
        let t = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(t), "2024-05-06 07:08:09");
        assert_eq!(parse_timestamp("2024-05-06 07:08:09"), Some(t));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
