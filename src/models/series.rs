use crate::interval::Interval;
use crate::models::bar::Bar;
use crate::models::symbol::AssetClass;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// Cleaned bars plus index-aligned indicator columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub display_name: Option<String>,
    pub interval: Interval,
    pub asset_class: AssetClass,
    pub bars: Vec<Bar>,
    pub indicators: BTreeMap<String, Vec<Option<f64>>>,
}

/// 最近行情表中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailRow {
    pub bar: Bar,
    pub indicators: Vec<(String, Option<f64>)>,
}

impl PriceSeries {
    pub fn new(symbol: &str, interval: Interval, asset_class: AssetClass, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.to_string(),
            display_name: None,
            interval,
            asset_class,
            bars,
            indicators: BTreeMap::new(),
        }
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.last().map(|b| b.timestamp)
    }

    pub fn indicator(&self, name: &str) -> Option<&[Option<f64>]> {
        self.indicators.get(name).map(|v| v.as_slice())
    }

    /// Copy of this series with one more indicator column. A column whose
    /// length does not match the bars is rejected.
    pub fn with_column(mut self, name: &str, values: Vec<Option<f64>>) -> Option<Self> {
        if values.len() != self.bars.len() {
            return None;
        }
        self.indicators.insert(name.to_string(), values);
        Some(self)
    }

    /// 最近 n 行（时间升序），附带各指标在该行的取值
    pub fn tail(&self, n: usize) -> Vec<TailRow> {
        let start = self.bars.len().saturating_sub(n);
        (start..self.bars.len())
            .map(|i| TailRow {
                bar: self.bars[i],
                indicators: self
                    .indicators
                    .iter()
                    .map(|(name, values)| (name.clone(), values[i]))
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100,
        }
    }

    #[test]
    fn test_with_column_rejects_misaligned() {
        let series = PriceSeries::new("AAPL", Interval::Daily, AssetClass::Listed, vec![bar(2, 1.0), bar(3, 2.0)]);
        assert!(series.clone().with_column("X", vec![None]).is_none());
        let series = series.with_column("X", vec![None, Some(2.0)]).unwrap();
        assert_eq!(series.indicator("X").unwrap().len(), 2);
    }

    #[test]
    fn test_tail_returns_last_rows_in_order() {
        let series = PriceSeries::new(
            "AAPL",
            Interval::Daily,
            AssetClass::Listed,
            vec![bar(2, 1.0), bar(3, 2.0), bar(4, 3.0)],
        )
        .with_column("MA2", vec![None, Some(1.5), Some(2.5)])
        .unwrap();

        let tail = series.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].bar.close, 2.0);
        assert_eq!(tail[1].indicators, vec![("MA2".to_string(), Some(2.5))]);
        assert_eq!(series.tail(10).len(), 3);
    }
}
