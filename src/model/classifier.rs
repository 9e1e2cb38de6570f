//! Churn classifier: logistic regression fit by batch gradient descent

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Binary churn classifier over standardized features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnClassifier {
    weights: Array1<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ChurnClassifier {
    /// Fit on standardized features and 0/1 churn labels.
    pub fn fit(features: &Array2<f64>, labels: &Array1<f64>, epochs: usize, lr: f64) -> Self {
        let n = features.nrows() as f64;
        let mut weights = Array1::zeros(features.ncols());
        let mut bias = 0.0;

        for _ in 0..epochs {
            let logits = features.dot(&weights) + bias;
            let probs = logits.mapv(sigmoid);
            let errors = &probs - labels;

            let grad_w = features.t().dot(&errors) / n;
            let grad_b = errors.sum() / n;

            weights = weights - &grad_w * lr;
            bias -= lr * grad_b;
        }

        Self { weights, bias }
    }

    /// Churn probability per row, in [0, 1]
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        (features.dot(&self.weights) + self.bias).mapv(sigmoid)
    }

    /// Hard 0/1 predictions at the 0.5 threshold
    pub fn predict(&self, features: &Array2<f64>) -> Array1<f64> {
        self.predict_proba(features)
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 })
    }
}
