//! Rolling-window indicators over the close column.
//!
//! Every output column has one entry per bar. Positions without a defined
//! value hold `None`, never `0.0`.

pub mod bollinger;
pub mod sma;
pub mod wma;

pub use bollinger::{bollinger_bands, BollingerOutput};
pub use sma::simple_moving_average;
pub use wma::weighted_moving_average;

use crate::models::request::IndicatorKind;
use crate::models::series::PriceSeries;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Minimum-periods policy shared by all rolling indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowPolicy {
    /// 窗口未填满之前没有值
    #[default]
    Strict,
    /// 窗口未填满时按已有样本计算（最少一个样本）
    Relaxed,
}

/// Trailing window ending at `index`, or `None` when the policy leaves the
/// position undefined.
pub(crate) fn window_at(values: &[f64], index: usize, window: usize, policy: WindowPolicy) -> Option<&[f64]> {
    if window == 0 || index >= values.len() {
        return None;
    }
    if index + 1 >= window {
        return Some(&values[index + 1 - window..=index]);
    }
    match policy {
        WindowPolicy::Strict => None,
        WindowPolicy::Relaxed => Some(&values[..=index]),
    }
}

/// New series with the requested indicator columns added. The input series
/// is left untouched.
pub fn compute(series: &PriceSeries, indicators: &[IndicatorKind], policy: WindowPolicy) -> PriceSeries {
    let closes = series.closes();
    let mut result = series.clone();

    for indicator in indicators {
        debug!("Computing {} for {} ({} bars)", indicator, series.symbol, closes.len());
        let columns = match indicator {
            IndicatorKind::Sma(window) => vec![simple_moving_average(&closes, *window, policy)],
            IndicatorKind::Wma(window) => vec![weighted_moving_average(&closes, *window, policy)],
            IndicatorKind::Bollinger { window, num_std } => {
                let bands = bollinger_bands(&closes, *window, *num_std, policy);
                vec![bands.middle, bands.upper, bands.lower]
            }
        };

        for (name, values) in indicator.column_names().into_iter().zip(columns) {
            if values.len() != result.len() {
                // 长度不一致说明实现有误，跳过该列而不是返回错位的数据
                warn!("Indicator column {} is not aligned with {} bars, skipped", name, result.len());
                continue;
            }
            result.indicators.insert(name, values);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::models::bar::Bar;
    use crate::models::symbol::AssetClass;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: (start + chrono::Duration::days(i as i64)).and_hms_opt(0, 0, 0).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000,
            })
            .collect();
        PriceSeries::new("TEST", Interval::Daily, AssetClass::Listed, bars)
    }

    #[test]
    fn test_two_period_ma_scenario() {
        let input = series(&[100.0, 102.0, 101.0]);
        let output = compute(&input, &[IndicatorKind::Sma(2)], WindowPolicy::Strict);
        assert_eq!(output.indicator("MA2").unwrap(), &[None, Some(101.0), Some(101.5)]);
        // 输入序列不被修改
        assert!(input.indicators.is_empty());
    }

    #[test]
    fn test_all_columns_aligned() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let input = series(&closes);
        let output = compute(
            &input,
            &[
                IndicatorKind::Sma(20),
                IndicatorKind::Sma(200),
                IndicatorKind::Wma(10),
                IndicatorKind::bollinger(),
            ],
            WindowPolicy::Strict,
        );
        assert_eq!(output.indicators.len(), 6);
        for (name, values) in &output.indicators {
            assert_eq!(values.len(), output.len(), "column {}", name);
        }
        // 200 周期均线在 60 根K线上全部无值
        assert!(output.indicator("MA200").unwrap().iter().all(Option::is_none));
        assert_eq!(output.bars, input.bars);
    }

    #[test]
    fn test_window_at_policies() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(window_at(&values, 0, 2, WindowPolicy::Strict), None);
        assert_eq!(window_at(&values, 0, 2, WindowPolicy::Relaxed), Some(&values[..1]));
        assert_eq!(window_at(&values, 2, 2, WindowPolicy::Strict), Some(&values[1..3]));
        assert_eq!(window_at(&values, 1, 0, WindowPolicy::Relaxed), None);
    }
}
