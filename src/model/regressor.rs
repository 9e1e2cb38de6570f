//! Spending regressor: linear regression fit by batch gradient descent

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Spending-score regressor over standardized features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingRegressor {
    weights: Array1<f64>,
    bias: f64,
}

impl SpendingRegressor {
    /// Fit on standardized features and raw spending-score targets.
    pub fn fit(features: &Array2<f64>, targets: &Array1<f64>, epochs: usize, lr: f64) -> Self {
        let n = features.nrows() as f64;
        let mut weights = Array1::zeros(features.ncols());
        let mut bias = 0.0;

        for _ in 0..epochs {
            let predictions = features.dot(&weights) + bias;
            let errors = &predictions - targets;

            let grad_w = features.t().dot(&errors) / n;
            let grad_b = errors.sum() / n;

            weights = weights - &grad_w * lr;
            bias -= lr * grad_b;
        }

        Self { weights, bias }
    }

    /// Predicted spending score per row
    pub fn predict(&self, features: &Array2<f64>) -> Array1<f64> {
        features.dot(&self.weights) + self.bias
    }
}
