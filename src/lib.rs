//! Off-Peak Tracker - derives an off-peak energy total from a cumulative
//! import meter by subtracting consumption inside a configured daily peak
//! window.
//!
//! The crate is driven entirely by an external scheduler: it feeds source
//! readings and clock ticks into an [`OffPeakTracker`], which classifies the
//! moment against the [`PeakWindow`], captures boundary snapshots, derives
//! the off-peak value, and persists its snapshots through a
//! [`SnapshotStore`] so restarts mid-window neither lose nor double-count
//! energy.
//!
//! ## Modules
//!
//! - **window**: peak window value type and phase classification
//! - **tracker**: the stateful tracking engine and its read surface
//! - **store**: snapshot persistence contract and implementations
//! - **event**: typed scheduler events
//! - **config**: per-instance configuration and validation

pub mod config;
pub mod error;
pub mod event;
pub mod store;
pub mod tracker;
pub mod window;

pub use config::{parse_time_of_day, TrackerConfig, DEFAULT_PEAK_END, DEFAULT_PEAK_START};
pub use error::TrackerError;
pub use event::TrackerEvent;
pub use store::{
    JsonFileStore, MemoryStore, PersistedSnapshots, SnapshotStore, StoreError, STORAGE_KEY,
    STORAGE_VERSION,
};
pub use tracker::{OffPeakTracker, TrackerAttributes};
pub use window::{PeakWindow, Phase};

/// Crate version embedded in CLI output
pub const TRACKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for CLI output
pub const PRODUCER_NAME: &str = "offpeak-tracker";
