//! Per-column feature standardization

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standardizes features to zero mean and unit variance.
///
/// Fitted statistics are persisted alongside the models so serving and
/// validation always scale with the distribution the models were trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    means: Array1<f64>,
    scales: Array1<f64>,
}

impl FeatureScaler {
    /// Fit column means and scales on a feature matrix.
    ///
    /// Constant columns get unit scale so transforming them is a no-op
    /// rather than a division by zero.
    pub fn fit(features: &Array2<f64>) -> Self {
        let means = features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(features.ncols()));
        let mut scales = features.std_axis(Axis(0), 0.0);
        scales.mapv_inplace(|s| if s > 0.0 { s } else { 1.0 });
        Self { means, scales }
    }

    /// Standardize a feature matrix with the fitted statistics
    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        (features - &self.means) / &self.scales
    }

    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}
