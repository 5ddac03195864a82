/// Mismatch between two xi vectors: the sum of squared per-dimension differences.
///
/// Every retained dimension takes part, not just the two used for binning. The
/// result is not clamped and may exceed 1.
#[must_use]
pub fn mismatch(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += (x - y).powi(2);
    }
    sum
}

/// Like [`mismatch`], but stops summing once the partial sum exceeds `threshold`.
#[must_use]
pub fn within(a: &[f64], b: &[f64], threshold: f64) -> bool {
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        sum += (x - y).powi(2);
        if sum > threshold {
            return false;
        }
    }
    true
}

/// Mismatch between points assigned to different upper-frequency cutoffs.
///
/// `distance` is measured under the lower cutoff. The signal power between the
/// two cutoffs is lost to the lower one, so the overlap shrinks by the ratio of
/// their normalizations.
#[must_use]
pub fn penalized(distance: f64, lower_norm: f64, upper_norm: f64) -> f64 {
    1.0 - (1.0 - distance) * (lower_norm / upper_norm)
}

/// Fitting factor reported for a minimum mismatch.
#[must_use]
pub fn fitting_factor(mismatch: f64) -> f64 {
    (1.0 - mismatch).max(0.0)
}
