//! Bollinger Bands: rolling SMA plus/minus a multiple of the population
//! standard deviation (ddof = 0) over the same window.

use super::sma::mean;
use super::{window_at, WindowPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerOutput {
    pub middle: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

pub fn bollinger_bands(values: &[f64], window: usize, num_std: f64, policy: WindowPolicy) -> BollingerOutput {
    // 负的倍数会让上下轨颠倒
    let num_std = num_std.abs();
    let mut output = BollingerOutput {
        middle: Vec::with_capacity(values.len()),
        upper: Vec::with_capacity(values.len()),
        lower: Vec::with_capacity(values.len()),
    };

    for i in 0..values.len() {
        match window_at(values, i, window, policy) {
            Some(samples) => {
                let middle = mean(samples);
                let half_width = num_std * population_std(samples, middle);
                output.middle.push(Some(middle));
                output.upper.push(Some(middle + half_width));
                output.lower.push(Some(middle - half_width));
            }
            None => {
                output.middle.push(None);
                output.upper.push(None);
                output.lower.push(None);
            }
        }
    }

    output
}

fn population_std(samples: &[f64], mean: f64) -> f64 {
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // 窗口 [2, 4, 4, 4, 5, 5, 7, 9]：均值 5，总体标准差 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger_bands(&values, 8, 2.0, WindowPolicy::Strict);
        assert_eq!(bands.middle[7], Some(5.0));
        assert_eq!(bands.upper[7], Some(9.0));
        assert_eq!(bands.lower[7], Some(1.0));
        assert!(bands.middle[..7].iter().all(Option::is_none));
    }

    #[test]
    fn test_band_ordering() {
        let values: Vec<f64> = (0..100).map(|i| 20.0 + ((i * 37) % 17) as f64 * 0.9).collect();
        for policy in [WindowPolicy::Strict, WindowPolicy::Relaxed] {
            let bands = bollinger_bands(&values, 20, 2.0, policy);
            for i in 0..values.len() {
                if let (Some(u), Some(m), Some(l)) = (bands.upper[i], bands.middle[i], bands.lower[i]) {
                    assert!(u >= m && m >= l, "row {}", i);
                }
            }
        }
    }

    #[test]
    fn test_relaxed_single_sample_has_zero_width() {
        let bands = bollinger_bands(&[10.0, 12.0], 20, 2.0, WindowPolicy::Relaxed);
        assert_eq!(bands.upper[0], Some(10.0));
        assert_eq!(bands.lower[0], Some(10.0));
    }

    #[test]
    fn test_negative_multiplier_is_normalized() {
        let bands = bollinger_bands(&[1.0, 3.0], 2, -2.0, WindowPolicy::Strict);
        assert_eq!(bands.upper[1], Some(4.0));
        assert_eq!(bands.lower[1], Some(0.0));
    }
}
