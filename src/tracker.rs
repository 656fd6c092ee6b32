//! Off-peak tracking state machine
//!
//! `OffPeakTracker` consumes source-value changes and clock ticks from an
//! external scheduler, captures the source reading at the two peak-window
//! boundaries, and derives the off-peak energy total:
//!
//! - before the window, the full cumulative import counts as off-peak;
//! - inside the window, the value is frozen at the start snapshot;
//! - after the window, the peak usage (end minus start snapshot) is
//!   subtracted from the running total.
//!
//! The source meter resets to zero at midnight, so snapshots are scoped to a
//! single calendar day and cleared on rollover. Snapshots are written to a
//! `SnapshotStore` whenever they change so a restart mid-window resumes
//! without double-counting.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::event::TrackerEvent;
use crate::store::{PersistedSnapshots, SnapshotStore};
use crate::window::Phase;

/// Round a kWh value to 3 decimals (Wh resolution).
fn round_kwh(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Read surface exposed alongside the derived value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerAttributes {
    pub source_entity: String,
    pub peak_start: String,
    pub peak_end: String,
    pub snapshot_at_peak_start: Option<f64>,
    pub snapshot_at_peak_end: Option<f64>,
    pub peak_window_usage_kwh: Option<f64>,
    pub status: &'static str,
}

/// Stateful engine tracking off-peak energy for one source sensor.
pub struct OffPeakTracker {
    config: TrackerConfig,
    store: Box<dyn SnapshotStore>,
    snapshot_start: Option<f64>,
    snapshot_end: Option<f64>,
    last_source_value: Option<f64>,
    current_phase: Phase,
    day_anchor: NaiveDate,
    last_event_at: Option<NaiveDateTime>,
}

impl OffPeakTracker {
    /// Construct a tracker, restoring persisted snapshots if any.
    ///
    /// The phase is computed from `now` without running transition actions,
    /// so a restart mid-window does not re-capture a restored snapshot. A
    /// failed load degrades to a fresh day rather than failing construction.
    pub fn new(config: TrackerConfig, store: Box<dyn SnapshotStore>, now: NaiveDateTime) -> Self {
        let restored = match store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "snapshot load failed; starting with a fresh day");
                None
            }
        };

        let (snapshot_start, snapshot_end, day_anchor) = match restored {
            Some(record) => {
                debug!(
                    start = ?record.snapshot_at_start,
                    end = ?record.snapshot_at_end,
                    day = ?record.day_anchor,
                    "restored snapshots"
                );
                (
                    record.snapshot_at_start,
                    record.snapshot_at_end,
                    record.day_anchor.unwrap_or_else(|| now.date()),
                )
            }
            None => (None, None, now.date()),
        };

        let current_phase = config.window.classify(now.time());

        Self {
            config,
            store,
            snapshot_start,
            snapshot_end,
            last_source_value: None,
            current_phase,
            day_anchor,
            last_event_at: None,
        }
    }

    /// Dispatch a typed input event.
    pub fn handle_event(&mut self, event: &TrackerEvent) -> Result<(), TrackerError> {
        match *event {
            TrackerEvent::SourceUpdate { value, at } => self.on_source_update(value, at),
            TrackerEvent::Tick { at } => self.on_tick(at),
        }
    }

    /// Record a new source reading and re-evaluate the window phase.
    ///
    /// A reading lower than the last one on the same day is a sensor glitch
    /// (midnight resets are recognised via the date, not the value): the
    /// update is rejected with `SourceAnomaly` and prior state is kept.
    pub fn on_source_update(&mut self, value: f64, now: NaiveDateTime) -> Result<(), TrackerError> {
        if !value.is_finite() || value < 0.0 {
            return Err(TrackerError::InvalidSourceValue(value));
        }
        if self.is_stale(now) {
            return Ok(());
        }
        self.last_event_at = Some(now);

        let rolled = self.roll_day_if_needed(now);
        if !rolled {
            if let Some(last_value) = self.last_source_value {
                if value < last_value {
                    warn!(last_value, value, "non-monotonic source reading rejected");
                    return Err(TrackerError::SourceAnomaly { last_value, value });
                }
            }
        }
        self.last_source_value = Some(value);

        if rolled || self.evaluate_transitions(now.time()) {
            return self.persist();
        }
        Ok(())
    }

    /// Process a periodic clock tick.
    pub fn on_tick(&mut self, now: NaiveDateTime) -> Result<(), TrackerError> {
        if self.is_stale(now) {
            return Ok(());
        }
        self.last_event_at = Some(now);

        if self.roll_day_if_needed(now) || self.evaluate_transitions(now.time()) {
            return self.persist();
        }
        Ok(())
    }

    /// Off-peak energy in kWh, `None` until a source value has been observed
    /// for the current day.
    pub fn derived_value(&self) -> Option<f64> {
        let value = match self.current_phase {
            Phase::BeforePeak => self.last_source_value?,
            Phase::DuringPeak => match self.snapshot_start {
                Some(start) => start,
                None => self.last_source_value?,
            },
            Phase::AfterPeak => match (self.snapshot_start, self.snapshot_end) {
                (Some(start), Some(end)) => {
                    let usage = (end - start).max(0.0);
                    (self.last_source_value? - usage).max(0.0)
                }
                // End snapshot not captured yet: stay frozen at the start
                // snapshot until it becomes available.
                (Some(start), None) => start,
                (None, _) => self.last_source_value?,
            },
        };
        Some(round_kwh(value))
    }

    /// Energy imported during the peak window, once both snapshots are set.
    pub fn peak_window_usage(&self) -> Option<f64> {
        match (self.snapshot_start, self.snapshot_end) {
            (Some(start), Some(end)) => Some(round_kwh((end - start).max(0.0))),
            _ => None,
        }
    }

    pub fn attributes(&self) -> TrackerAttributes {
        TrackerAttributes {
            source_entity: self.config.source_entity.clone(),
            peak_start: self.config.window.start().format("%H:%M").to_string(),
            peak_end: self.config.window.end().format("%H:%M").to_string(),
            snapshot_at_peak_start: self.snapshot_start,
            snapshot_at_peak_end: self.snapshot_end,
            peak_window_usage_kwh: self.peak_window_usage(),
            status: self.current_phase.as_str(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.current_phase
    }

    pub fn day_anchor(&self) -> NaiveDate {
        self.day_anchor
    }

    pub fn last_source_value(&self) -> Option<f64> {
        self.last_source_value
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Clock corrections that move `now` backwards would re-trigger boundary
    /// actions; such events are dropped until the clock catches up.
    fn is_stale(&self, now: NaiveDateTime) -> bool {
        self.last_event_at.is_some_and(|last| now < last)
    }

    /// Reset for a new calendar day. The meter restarts from zero at
    /// midnight, so the previous day's snapshots and baseline are invalid.
    /// The rollover event itself does not evaluate the transition table; the
    /// next event re-enters it from `BeforePeak`.
    fn roll_day_if_needed(&mut self, now: NaiveDateTime) -> bool {
        if now.date() == self.day_anchor {
            return false;
        }
        debug!(day = %now.date(), "day rollover; clearing snapshots");
        self.snapshot_start = None;
        self.snapshot_end = None;
        self.last_source_value = None;
        self.day_anchor = now.date();
        self.current_phase = Phase::BeforePeak;
        true
    }

    /// Re-classify and run boundary capture actions. Returns whether a
    /// snapshot changed and needs persisting.
    fn evaluate_transitions(&mut self, now: NaiveTime) -> bool {
        let phase = self.config.window.classify(now);
        let mut snapshots_changed = false;

        if phase != self.current_phase {
            // A coarse tick can jump straight from before to after the
            // window; the start capture still has to run on the way through.
            if self.current_phase == Phase::BeforePeak
                && phase >= Phase::DuringPeak
                && self.snapshot_start.is_none()
            {
                if let Some(value) = self.last_source_value {
                    debug!(value, "captured peak-start snapshot");
                    self.snapshot_start = Some(value);
                    snapshots_changed = true;
                }
            }
            self.current_phase = phase;
        }

        // The end capture runs outside the transition check so a restart
        // past the window end still records it on the next usable event.
        if self.current_phase == Phase::AfterPeak
            && self.snapshot_end.is_none()
            && self.snapshot_start.is_some()
        {
            if let Some(value) = self.last_source_value {
                debug!(value, "captured peak-end snapshot");
                self.snapshot_end = Some(value);
                snapshots_changed = true;
            }
        }

        snapshots_changed
    }

    /// Write the current snapshots through the store. A failed save keeps
    /// the in-memory state; durability is best-effort.
    fn persist(&self) -> Result<(), TrackerError> {
        let record = PersistedSnapshots::new(
            self.day_anchor,
            self.snapshot_start,
            self.snapshot_end,
            self.current_phase,
        );
        self.store.save(&record).map_err(|e| {
            warn!(error = %e, "snapshot save failed; continuing with in-memory state");
            TrackerError::Persistence(e)
        })
    }
}

impl std::fmt::Debug for OffPeakTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffPeakTracker")
            .field("source_entity", &self.config.source_entity)
            .field("snapshot_start", &self.snapshot_start)
            .field("snapshot_end", &self.snapshot_end)
            .field("last_source_value", &self.last_source_value)
            .field("current_phase", &self.current_phase)
            .field("day_anchor", &self.day_anchor)
            .finish()
    }
}
