//! Snapshot persistence
//!
//! Snapshots must survive process restarts, including restarts that happen
//! mid-window. The tracker talks to a narrow `SnapshotStore` contract: one
//! `load` at startup, one `save` whenever a snapshot changes. Any durable
//! key-value technology satisfies it; this module ships a JSON-file store and
//! an in-memory store for tests and stateless runs.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::window::Phase;

/// Version tag written into every persisted record
pub const STORAGE_VERSION: u32 = 1;

/// File-name prefix for per-instance snapshot files
pub const STORAGE_KEY: &str = "offpeak_snapshots";

/// Errors raised by a snapshot store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable record of a tracker's boundary snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshots {
    #[serde(default = "default_version")]
    pub schema_version: u32,
    /// Calendar date the snapshots belong to
    pub day_anchor: Option<NaiveDate>,
    /// Source reading captured when the peak window began
    pub snapshot_at_start: Option<f64>,
    /// Source reading captured when the peak window ended
    pub snapshot_at_end: Option<f64>,
    /// Phase at the time of the save, kept for diagnostics
    pub current_phase: Option<Phase>,
}

fn default_version() -> u32 {
    STORAGE_VERSION
}

impl PersistedSnapshots {
    pub fn new(
        day_anchor: NaiveDate,
        snapshot_at_start: Option<f64>,
        snapshot_at_end: Option<f64>,
        current_phase: Phase,
    ) -> Self {
        Self {
            schema_version: STORAGE_VERSION,
            day_anchor: Some(day_anchor),
            snapshot_at_start,
            snapshot_at_end,
            current_phase: Some(current_phase),
        }
    }
}

/// Narrow persistence contract consumed by the tracker.
///
/// `load` is called once at startup; `save` is called synchronously whenever
/// a snapshot changes, before control returns to the scheduler.
pub trait SnapshotStore {
    fn load(&self) -> Result<Option<PersistedSnapshots>, StoreError>;
    fn save(&self, record: &PersistedSnapshots) -> Result<(), StoreError>;
}

/// Snapshot store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build the conventional per-instance path `<dir>/<key>_<instance>.json`.
    pub fn for_instance(dir: impl AsRef<Path>, instance_id: impl std::fmt::Display) -> Self {
        Self::new(
            dir.as_ref()
                .join(format!("{}_{}.json", STORAGE_KEY, instance_id)),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedSnapshots>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, record: &PersistedSnapshots) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-process snapshot store, for tests and stateless runs.
///
/// Each tracker instance is owned by a single scheduler loop, so interior
/// mutability via `RefCell` is sufficient.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: RefCell<Option<PersistedSnapshots>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the store, as if a previous process had saved `record`.
    pub fn with_record(record: PersistedSnapshots) -> Self {
        Self {
            record: RefCell::new(Some(record)),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedSnapshots>, StoreError> {
        Ok(self.record.borrow().clone())
    }

    fn save(&self, record: &PersistedSnapshots) -> Result<(), StoreError> {
        *self.record.borrow_mut() = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> PersistedSnapshots {
        PersistedSnapshots::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            Some(12.0),
            None,
            Phase::DuringPeak,
        )
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&record()).unwrap();
        assert_eq!(store.load().unwrap(), Some(record()));
    }

    #[test]
    fn test_json_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("offpeak-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let store = JsonFileStore::for_instance(&dir, "abc");
        assert!(store.load().unwrap().is_none());

        store.save(&record()).unwrap();
        assert_eq!(store.load().unwrap(), Some(record()));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_instance_path_naming() {
        let store = JsonFileStore::for_instance("/var/lib/offpeak", "entry-1");
        assert_eq!(
            store.path(),
            Path::new("/var/lib/offpeak/offpeak_snapshots_entry-1.json")
        );
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("offpeak-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Json(_))));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_record_defaults_schema_version() {
        let parsed: PersistedSnapshots = serde_json::from_str(
            r#"{"day_anchor":"2024-01-15","snapshot_at_start":10.0,"snapshot_at_end":null,"current_phase":"during_peak"}"#,
        )
        .unwrap();
        assert_eq!(parsed.schema_version, STORAGE_VERSION);
        assert_eq!(parsed.snapshot_at_start, Some(10.0));
    }
}
