//! Evaluation metric helpers
//!
//! Thresholding continuous classifier output into discrete labels is this
//! crate's concern; the metric math itself is deliberately plain.

use ndarray::Array1;

/// Fraction of predictions on the correct side of `threshold`.
///
/// Returns 0.0 for empty input.
pub fn binary_accuracy(predictions: &Array1<f64>, targets: &Array1<f64>, threshold: f64) -> f64 {
    assert_eq!(
        predictions.len(),
        targets.len(),
        "predictions and targets must have same length"
    );
    if predictions.is_empty() {
        return 0.0;
    }

    let correct = predictions
        .iter()
        .zip(targets.iter())
        .filter(|(p, t)| (**p >= threshold) == (**t >= threshold))
        .count();
    correct as f64 / predictions.len() as f64
}

/// Mean squared error between predictions and targets.
///
/// Returns 0.0 for empty input.
pub fn mean_squared_error(predictions: &Array1<f64>, targets: &Array1<f64>) -> f64 {
    assert_eq!(
        predictions.len(),
        targets.len(),
        "predictions and targets must have same length"
    );
    if predictions.is_empty() {
        return 0.0;
    }

    predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / predictions.len() as f64
}
