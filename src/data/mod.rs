//! Behavioral data access boundary
//!
//! The retraining service never talks to an event store directly; everything
//! it needs from the outside world comes through [`DataProvider`]. The
//! in-memory implementation backs the CLI demo mode and the test suite.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One user-behavior event together with the per-user aggregates the
/// feature preparer consumes. Missing numeric fields are `None` at this
/// layer and zero-filled during feature preparation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub user_id: u64,
    pub action: String,
    pub product_id: Option<u64>,
    pub session_duration: Option<f64>,
    pub purchase_count: Option<f64>,
    pub cart_adds: Option<f64>,
    pub page_views: Option<f64>,
    pub avg_session_duration: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Source of behavioral samples for training and drift scoring.
///
/// Implementations must be shareable across the background worker and any
/// caller thread that asks for status.
pub trait DataProvider: Send + Sync {
    /// Number of behavior samples recorded strictly after `since`.
    fn count_samples_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Bulk extract of behavior history for training, newest first,
    /// at most `limit` rows.
    fn training_extract(&self, limit: usize) -> Result<Vec<BehaviorRecord>>;

    /// Recent labeled window used for drift scoring, newest first. Kept
    /// separate from [`training_extract`](DataProvider::training_extract)
    /// so drift is measured on data the candidate was not fitted on.
    fn recent_window(&self, limit: usize) -> Result<Vec<BehaviorRecord>>;
}

/// Thread-safe in-memory data provider
#[derive(Debug, Default)]
pub struct MemoryProvider {
    records: RwLock<Vec<BehaviorRecord>>,
}

impl MemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider pre-loaded with `records`
    pub fn with_records(records: Vec<BehaviorRecord>) -> Self {
        Self { records: RwLock::new(records) }
    }

    /// Generate a deterministic synthetic behavior population.
    ///
    /// Roughly a third of users never purchase (the churn class) and show
    /// shorter sessions, so the prepared features carry a learnable signal.
    pub fn synthetic(n_users: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let now = Utc::now();
        let mut records = Vec::with_capacity(n_users);

        for user_id in 1..=n_users as u64 {
            let churner = rng.gen::<f64>() < 0.3;
            let purchase_count = if churner { 0.0 } else { rng.gen_range(1..=9) as f64 };
            let session_duration = if churner {
                rng.gen_range(1.0..12.0)
            } else {
                rng.gen_range(8.0..45.0)
            };
            let cart_adds = purchase_count + rng.gen_range(0..4) as f64;
            let page_views = cart_adds * 2.0 + rng.gen_range(0..20) as f64;

            records.push(BehaviorRecord {
                user_id,
                action: if churner { "view".into() } else { "purchase".into() },
                product_id: Some(rng.gen_range(1..=10)),
                session_duration: Some(session_duration),
                purchase_count: Some(purchase_count),
                cart_adds: Some(cart_adds),
                page_views: Some(page_views),
                avg_session_duration: Some(session_duration),
                recorded_at: now - Duration::minutes(rng.gen_range(0..60 * 24 * 7)),
            });
        }

        Self::with_records(records)
    }

    /// Append a record
    pub fn push(&self, record: BehaviorRecord) {
        self.records.write().unwrap_or_else(PoisonError::into_inner).push(record);
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the provider holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn newest_first(&self, limit: usize) -> Vec<BehaviorRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<BehaviorRecord> = records.clone();
        out.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        out.truncate(limit);
        out
    }
}

impl DataProvider for MemoryProvider {
    fn count_samples_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.iter().filter(|r| r.recorded_at > since).count() as u64)
    }

    fn training_extract(&self, limit: usize) -> Result<Vec<BehaviorRecord>> {
        Ok(self.newest_first(limit))
    }

    fn recent_window(&self, limit: usize) -> Result<Vec<BehaviorRecord>> {
        let cutoff = Utc::now() - Duration::days(7);
        let mut window = self.newest_first(limit);
        window.retain(|r| r.recorded_at > cutoff);
        Ok(window)
    }
}
