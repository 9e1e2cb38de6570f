//! Feature preparation for the behavior models
//!
//! Converts raw [`BehaviorRecord`]s into a fixed-width numeric table plus the
//! two derived label columns the models are trained on. Preparation is a pure
//! function: the same records always produce the same table.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::BehaviorRecord;

/// Feature columns, in matrix order
pub const FEATURE_COLUMNS: [&str; 5] = [
    "session_duration",
    "purchase_count",
    "cart_adds",
    "page_views",
    "avg_session_duration",
];

/// Upper bound of the derived spending score
pub const SPENDING_SCORE_MAX: f64 = 1000.0;

/// Fixed-width feature matrix with derived labels
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// `n_samples x FEATURE_COLUMNS.len()` matrix
    pub features: Array2<f64>,
    /// Churn label per row, 1.0 for users with zero purchase activity
    pub churn_labels: Array1<f64>,
    /// Spending score per row, clamped to `[0, SPENDING_SCORE_MAX]`
    pub spending_scores: Array1<f64>,
}

impl FeatureTable {
    /// Number of rows in the table
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    /// Select a subset of rows by index
    fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            churn_labels: self.churn_labels.select(Axis(0), indices),
            spending_scores: self.spending_scores.select(Axis(0), indices),
        }
    }

    /// Split into (train, validation) tables with a seeded shuffle.
    ///
    /// Deterministic for a given table and seed. The validation side gets
    /// `ceil(n * test_fraction)` rows but never the whole table when at
    /// least two rows exist.
    pub fn split(&self, test_fraction: f64, seed: u64) -> (Self, Self) {
        let n = self.n_samples();
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let mut n_test = ((n as f64) * test_fraction).ceil() as usize;
        if n_test >= n && n > 1 {
            n_test = n - 1;
        }
        let (test_idx, train_idx) = indices.split_at(n_test);
        (self.select_rows(train_idx), self.select_rows(test_idx))
    }
}

/// Build the feature table from raw behavior records.
///
/// Missing numeric fields become zero. Labels are derived from purchase
/// activity: `will_churn` when no purchases were recorded, and a spending
/// score of 100 points per purchase clamped to [`SPENDING_SCORE_MAX`].
pub fn prepare_features(records: &[BehaviorRecord]) -> FeatureTable {
    let n = records.len();
    let mut features = Array2::zeros((n, FEATURE_COLUMNS.len()));
    let mut churn_labels = Array1::zeros(n);
    let mut spending_scores = Array1::zeros(n);

    for (i, record) in records.iter().enumerate() {
        let purchase_count = record.purchase_count.unwrap_or(0.0);

        features[[i, 0]] = record.session_duration.unwrap_or(0.0);
        features[[i, 1]] = purchase_count;
        features[[i, 2]] = record.cart_adds.unwrap_or(0.0);
        features[[i, 3]] = record.page_views.unwrap_or(0.0);
        features[[i, 4]] = record.avg_session_duration.unwrap_or(0.0);

        churn_labels[i] = if purchase_count == 0.0 { 1.0 } else { 0.0 };
        spending_scores[i] = (purchase_count * 100.0).clamp(0.0, SPENDING_SCORE_MAX);
    }

    FeatureTable { features, churn_labels, spending_scores }
}
