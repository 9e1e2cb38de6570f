//! Performance history store
//!
//! Append-only, size-bounded log of past training outcomes, persisted as a
//! JSON list so history survives restarts. The in-memory state is
//! authoritative for a running process; a failed flush is a warning, never
//! an error the caller has to handle.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Most recent records retained
pub const HISTORY_CAPACITY: usize = 50;

/// Baseline accuracy assumed when no history exists
pub const BASELINE_ACCURACY: f64 = 0.5;

/// Baseline error metric assumed when no history exists
pub const BASELINE_ERROR_METRIC: f64 = 1000.0;

/// Outcome of one deployed retraining cycle. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub accuracy: f64,
    pub error_metric: f64,
    pub timestamp: DateTime<Utc>,
    pub samples_used: usize,
}

impl PerformanceRecord {
    /// Default baseline used when the history is empty
    pub fn baseline() -> Self {
        Self {
            accuracy: BASELINE_ACCURACY,
            error_metric: BASELINE_ERROR_METRIC,
            timestamp: Utc::now(),
            samples_used: 0,
        }
    }
}

/// Bounded FIFO of performance records with JSON file persistence
#[derive(Debug)]
pub struct PerformanceHistory {
    path: PathBuf,
    records: VecDeque<PerformanceRecord>,
    capacity: usize,
}

impl PerformanceHistory {
    /// Open a history backed by `path`, loading any persisted records.
    ///
    /// A missing file starts empty; an unreadable or corrupt file is logged
    /// and also starts empty rather than failing the service.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<PerformanceRecord>>(&content) {
                Ok(list) => {
                    debug!(records = list.len(), path = %path.display(), "loaded performance history");
                    VecDeque::from(list)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt performance history, starting empty");
                    VecDeque::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VecDeque::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable performance history, starting empty");
                VecDeque::new()
            }
        };

        let mut history = Self { path, records, capacity: HISTORY_CAPACITY };
        history.truncate_to_capacity();
        history
    }

    /// Append a record, evicting the oldest beyond capacity, then persist.
    ///
    /// Persistence failures are logged as warnings; the record is kept in
    /// memory regardless.
    pub fn append(&mut self, record: PerformanceRecord) {
        self.records.push_back(record);
        self.truncate_to_capacity();

        if let Err(e) = self.persist() {
            warn!(path = %self.path.display(), error = %e, "failed to persist performance history");
        }
    }

    /// Most recent record, or the default baseline when history is empty
    pub fn latest(&self) -> PerformanceRecord {
        self.records.back().cloned().unwrap_or_else(PerformanceRecord::baseline)
    }

    /// Mean accuracy over the last `k` records (or all, if fewer exist).
    ///
    /// `None` when the history is empty.
    pub fn recent_mean_accuracy(&self, k: usize) -> Option<f64> {
        if self.records.is_empty() || k == 0 {
            return None;
        }
        let take = k.min(self.records.len());
        let sum: f64 = self.records.iter().rev().take(take).map(|r| r.accuracy).sum();
        Some(sum / take as f64)
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any records are retained
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn truncate_to_capacity(&mut self) {
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Write the full bounded list via a temp file and atomic rename, so a
    /// partial write never clobbers the previously-good file.
    fn persist(&self) -> Result<()> {
        let list: Vec<&PerformanceRecord> = self.records.iter().collect();
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
