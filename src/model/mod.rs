//! Model training and evaluation
//!
//! The trainer fits the churn classifier and spending regressor on a
//! prepared feature table and scores artifact sets on held-out data. The
//! retraining orchestrator only depends on the two operations here: `train`
//! to produce a candidate and `evaluate` to judge one.

pub mod classifier;
pub mod metrics;
pub mod regressor;
pub mod scaler;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::FeatureTable;

pub use classifier::ChurnClassifier;
pub use metrics::{binary_accuracy, mean_squared_error};
pub use regressor::SpendingRegressor;
pub use scaler::FeatureScaler;

/// Fewest rows the trainer will fit on
pub const MIN_FIT_SAMPLES: usize = 10;

/// Classification threshold for churn decisions
pub const CHURN_THRESHOLD: f64 = 0.5;

/// A complete, deployable bundle: both models plus the scaler they expect.
///
/// A candidate set lives only inside a retraining cycle until the artifact
/// store promotes it; the production set is owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub classifier: ChurnClassifier,
    pub regressor: SpendingRegressor,
    pub scaler: FeatureScaler,
}

/// Metrics from scoring an artifact set on a feature table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Churn classification accuracy, in [0, 1]
    pub accuracy: f64,
    /// Spending-score mean squared error, non-negative
    pub error_metric: f64,
    /// Number of rows scored
    pub samples_used: usize,
}

/// Trains and evaluates the behavior model pair
#[derive(Debug, Clone)]
pub struct BehaviorModelTrainer {
    /// Gradient-descent epochs per model
    pub epochs: usize,
    /// Learning rate for the churn classifier
    pub classifier_lr: f64,
    /// Learning rate for the spending regressor
    pub regressor_lr: f64,
}

impl Default for BehaviorModelTrainer {
    fn default() -> Self {
        Self { epochs: 300, classifier_lr: 0.5, regressor_lr: 0.1 }
    }
}

impl BehaviorModelTrainer {
    /// Create a trainer with default hyperparameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit a candidate artifact set on `table`.
    ///
    /// Returns the candidate together with its self-evaluation on the
    /// training rows. The caller is expected to judge the candidate on a
    /// split the trainer never saw.
    pub fn train(&self, table: &FeatureTable) -> Result<(ArtifactSet, Evaluation)> {
        if table.n_samples() < MIN_FIT_SAMPLES {
            return Err(Error::Training(format!(
                "need at least {MIN_FIT_SAMPLES} rows to fit, got {}",
                table.n_samples()
            )));
        }

        let scaler = FeatureScaler::fit(&table.features);
        let scaled = scaler.transform(&table.features);

        let classifier =
            ChurnClassifier::fit(&scaled, &table.churn_labels, self.epochs, self.classifier_lr);
        let regressor =
            SpendingRegressor::fit(&scaled, &table.spending_scores, self.epochs, self.regressor_lr);

        let candidate = ArtifactSet { classifier, regressor, scaler };
        let train_metrics = self.evaluate(&candidate, table)?;
        Ok((candidate, train_metrics))
    }

    /// Score an artifact set on a feature table.
    ///
    /// Guarantees accuracy in [0, 1] and a finite, non-negative error
    /// metric; anything else is reported as invalid metrics.
    pub fn evaluate(&self, set: &ArtifactSet, table: &FeatureTable) -> Result<Evaluation> {
        if table.is_empty() {
            return Err(Error::Training("cannot evaluate on an empty table".into()));
        }

        let scaled = set.scaler.transform(&table.features);
        let churn_probs = set.classifier.predict_proba(&scaled);
        let accuracy = binary_accuracy(&churn_probs, &table.churn_labels, CHURN_THRESHOLD);

        let spending_preds = set.regressor.predict(&scaled);
        let error_metric = mean_squared_error(&spending_preds, &table.spending_scores);

        if !accuracy.is_finite()
            || !(0.0..=1.0).contains(&accuracy)
            || !error_metric.is_finite()
            || error_metric < 0.0
        {
            return Err(Error::InvalidMetrics { accuracy, error_metric });
        }

        Ok(Evaluation { accuracy, error_metric, samples_used: table.n_samples() })
    }
}
