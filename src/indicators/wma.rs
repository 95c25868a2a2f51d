//! WMA (Weighted Moving Average)

use super::{window_at, WindowPolicy};

/// Linearly weighted mean: the oldest sample in the window has weight 1, the
/// most recent has weight n.
pub fn weighted_moving_average(values: &[f64], window: usize, policy: WindowPolicy) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| window_at(values, i, window, policy).map(weighted_mean))
        .collect()
}

fn weighted_mean(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let weight_sum = n * (n + 1.0) / 2.0;
    let weighted: f64 = window
        .iter()
        .enumerate()
        .map(|(i, value)| (i as f64 + 1.0) * value)
        .sum();
    weighted / weight_sum
}
