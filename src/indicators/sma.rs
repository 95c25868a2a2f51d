//! SMA (Simple Moving Average)

use super::{window_at, WindowPolicy};

/// Arithmetic mean of the trailing `window` values at each position.
pub fn simple_moving_average(values: &[f64], window: usize, policy: WindowPolicy) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| window_at(values, i, window, policy).map(mean))
        .collect()
}

pub(crate) fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_leading_values_are_undefined() {
        let sma = simple_moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3, WindowPolicy::Strict);
        assert_eq!(sma, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_relaxed_uses_available_samples() {
        let sma = simple_moving_average(&[1.0, 2.0, 3.0, 4.0], 3, WindowPolicy::Relaxed);
        assert_eq!(sma, vec![Some(1.0), Some(1.5), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_matches_window_mean_definition() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
        let k = 20;
        let sma = simple_moving_average(&closes, k, WindowPolicy::Strict);
        for i in 0..closes.len() {
            if i + 1 < k {
                assert_eq!(sma[i], None);
            } else {
                let expected = closes[i + 1 - k..=i].iter().sum::<f64>() / k as f64;
                assert!((sma[i].unwrap() - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_window_longer_than_series() {
        let sma = simple_moving_average(&[1.0, 2.0], 5, WindowPolicy::Strict);
        assert_eq!(sma, vec![None, None]);
        assert!(simple_moving_average(&[], 5, WindowPolicy::Strict).is_empty());
    }
}
