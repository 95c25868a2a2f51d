//! Turns a provider frame into a clean, ascending, gap-free price series.

use crate::calendar::{Exchange, TradingCalendar};
use crate::models::bar::Bar;
use crate::models::outcome::{NoDataReason, Outcome};
use crate::models::raw::{Field, RawFrame, RawTimestamp};
use crate::models::series::PriceSeries;
use crate::models::symbol::AssetClass;
use crate::interval::Interval;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use log::{debug, warn};
use std::sync::Arc;

const TEXT_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

#[derive(Debug, Clone)]
struct Row {
    timestamp: NaiveDateTime,
    values: [Option<f64>; 5],
}

impl Row {
    fn is_degenerate(&self) -> bool {
        match self.values {
            [Some(open), Some(high), Some(low), Some(close), Some(volume)] => {
                volume == 0.0 && open == close && high == low
            }
            _ => false,
        }
    }
}

pub struct DataCleaner {
    calendar: Arc<TradingCalendar>,
    min_rows: usize,
}

impl DataCleaner {
    pub fn new(calendar: Arc<TradingCalendar>, min_rows: usize) -> Self {
        Self { calendar, min_rows }
    }

    pub fn min_rows(&self) -> usize {
        self.min_rows
    }

    pub fn clean(&self, raw: &RawFrame) -> Outcome<PriceSeries> {
        if raw.is_empty() {
            return Outcome::NoData(NoDataReason::NotFound);
        }

        // 1. 列名标准化
        let columns = match canonical_columns(raw) {
            Ok(columns) => columns,
            Err(reason) => return Outcome::NoData(reason),
        };

        // 2. 时间索引转换，失败的行丢弃，然后稳定排序
        let mut rows: Vec<Row> = raw
            .index
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let timestamp = coerce_timestamp(ts, raw.timezone, raw.interval)?;
                let mut values = [None; 5];
                for (slot, column) in values.iter_mut().zip(columns.iter()) {
                    *slot = column.as_ref().and_then(|c| c.get(i).copied().flatten());
                }
                Some(Row { timestamp, values })
            })
            .collect();
        let dropped = raw.len() - rows.len();
        if dropped > 0 {
            debug!("{}: dropped {} rows with unusable timestamps", raw.symbol, dropped);
        }
        if rows.is_empty() {
            return Outcome::NoData(NoDataReason::NotFound);
        }
        rows.sort_by_key(|r| r.timestamp);

        // 3. 重复时间戳只保留第一条
        rows.dedup_by_key(|r| r.timestamp);

        // 非正价格与负成交量按缺失处理
        for row in &mut rows {
            sanitize(&mut row.values);
        }

        // 4. 去掉无成交且无波动的行
        rows.retain(|r| !r.is_degenerate());

        // 5. 交易日历过滤，全天候资产跳过
        let asset_class = AssetClass::classify(&raw.symbol, raw.meta.instrument_type.as_deref());
        if asset_class.follows_exchange_calendar() && raw.interval.labels_trading_days() {
            rows = self.filter_trading_days(&raw.symbol, rows);
        }

        // 6. 逐列先向前填充再向后填充
        for field in Field::ALL {
            let slot = field_slot(field);
            let mut column: Vec<Option<f64>> = rows.iter().map(|r| r.values[slot]).collect();
            if !column.is_empty() && !fill_gaps(&mut column) {
                return Outcome::NoData(NoDataReason::MalformedData(format!(
                    "column {} has no values",
                    field.name()
                )));
            }
            for (row, value) in rows.iter_mut().zip(column) {
                row.values[slot] = value;
            }
        }

        let mut bars: Vec<Bar> = rows.iter().filter_map(to_bar).collect();
        // 填充后可能出现新的无效行，再过滤一次保证清洗结果是不动点
        bars.retain(|b| !b.is_degenerate());

        if bars.is_empty() {
            return Outcome::NoData(NoDataReason::NotFound);
        }

        // 7. 最少行数检查
        if bars.len() < self.min_rows {
            warn!(
                "{}: only {} usable rows after cleaning, {} required",
                raw.symbol,
                bars.len(),
                self.min_rows
            );
            return Outcome::NoData(NoDataReason::InsufficientData {
                rows: bars.len(),
                required: self.min_rows,
            });
        }

        debug!("{}: {} clean bars from {} raw rows", raw.symbol, bars.len(), raw.len());
        Outcome::Data(
            PriceSeries::new(&raw.symbol, raw.interval, asset_class, bars)
                .with_display_name(raw.meta.display_name.clone()),
        )
    }

    fn filter_trading_days(&self, symbol: &str, mut rows: Vec<Row>) -> Vec<Row> {
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (first.timestamp.date(), last.timestamp.date()),
            _ => return rows,
        };

        let exchange = Exchange::from_symbol(symbol);
        let trading_days = self.calendar.trading_days(exchange, first, last);
        let before = rows.len();
        rows.retain(|r| trading_days.contains(&r.timestamp.date()));
        if rows.len() < before {
            debug!(
                "{}: removed {} rows outside the {} trading calendar",
                symbol,
                before - rows.len(),
                exchange.code()
            );
        }
        rows
    }
}

fn field_slot(field: Field) -> usize {
    match field {
        Field::Open => 0,
        Field::High => 1,
        Field::Low => 2,
        Field::Close => 3,
        Field::Volume => 4,
    }
}

/// Column values per canonical field. Price columns are mandatory; a
/// missing volume column is treated as all gaps.
fn canonical_columns(raw: &RawFrame) -> Result<[Option<&Vec<Option<f64>>>; 5], NoDataReason> {
    let missing = raw.missing_price_columns();
    if !missing.is_empty() {
        return Err(NoDataReason::MalformedData(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut columns = [None; 5];
    for field in Field::ALL {
        columns[field_slot(field)] = raw.column(field).map(|c| &c.values);
    }
    Ok(columns)
}

/// Row label → naive exchange-local timestamp. Daily and coarser intervals
/// are truncated to midnight.
pub fn coerce_timestamp(ts: &RawTimestamp, timezone: Option<Tz>, interval: Interval) -> Option<NaiveDateTime> {
    let timestamp = match ts {
        RawTimestamp::Epoch(secs) => {
            let utc = DateTime::from_timestamp(*secs, 0)?;
            match timezone {
                Some(tz) => utc.with_timezone(&tz).naive_local(),
                None => utc.naive_utc(),
            }
        }
        RawTimestamp::Text(text) => parse_text_timestamp(text.trim(), timezone)?,
        RawTimestamp::Naive(naive) => *naive,
    };

    if interval.is_intraday() {
        Some(timestamp)
    } else {
        timestamp.date().and_hms_opt(0, 0, 0)
    }
}

fn parse_text_timestamp(text: &str, timezone: Option<Tz>) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(match timezone {
            Some(tz) => parsed.with_timezone(&tz).naive_local(),
            None => parsed.naive_local(),
        });
    }
    for format in TEXT_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn sanitize(values: &mut [Option<f64>; 5]) {
    for (slot, value) in values.iter_mut().enumerate() {
        let valid = match *value {
            Some(v) if slot == 4 => v.is_finite() && v >= 0.0,
            Some(v) => v.is_finite() && v > 0.0,
            None => true,
        };
        if !valid {
            *value = None;
        }
        // 成交量按整数处理
        if slot == 4 {
            *value = value.map(f64::round);
        }
    }
}

/// Forward fill, then backward fill for a leading gap. Returns false when
/// the column holds no value at all.
fn fill_gaps(values: &mut [Option<f64>]) -> bool {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }

    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }

    values.iter().all(Option::is_some)
}

fn to_bar(row: &Row) -> Option<Bar> {
    let [open, high, low, close, volume] = row.values;
    Some(Bar {
        timestamp: row.timestamp,
        open: open?,
        high: high?,
        low: low?,
        close: close?,
        volume: volume? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::raw::RawColumn;
    use chrono::{Datelike, Duration};

    fn cleaner(min_rows: usize) -> DataCleaner {
        DataCleaner::new(Arc::new(TradingCalendar::new()), min_rows)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Daily frame with one row per calendar day starting at `start`.
    fn daily_frame(symbol: &str, start: NaiveDate, closes: &[f64]) -> RawFrame {
        let mut frame = RawFrame::new(symbol, Interval::Daily);
        frame.index = (0..closes.len())
            .map(|i| RawTimestamp::Text((start + Duration::days(i as i64)).format("%Y-%m-%d").to_string()))
            .collect();
        let opt: Vec<Option<f64>> = closes.iter().map(|c| Some(*c)).collect();
        frame.columns = vec![
            RawColumn::new(&["Open"], opt.clone()),
            RawColumn::new(&["High"], closes.iter().map(|c| Some(c + 1.0)).collect()),
            RawColumn::new(&["Low"], closes.iter().map(|c| Some(c - 1.0)).collect()),
            RawColumn::new(&["Close"], opt),
            RawColumn::new(&["Volume"], vec![Some(1000.0); closes.len()]),
        ];
        frame
    }

    #[test]
    fn test_three_bar_scenario_with_relaxed_floor() {
        let frame = daily_frame("AAPL", date(2024, 1, 2), &[100.0, 102.0, 101.0]);
        let series = cleaner(1).clean(&frame).into_data().unwrap();
        assert_eq!(series.closes(), vec![100.0, 102.0, 101.0]);
        assert_eq!(series.bars[0].timestamp, date(2024, 1, 2).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_empty_frame_is_not_found() {
        let frame = RawFrame::new("AAPL", Interval::Daily);
        assert_eq!(cleaner(30).clean(&frame), Outcome::NoData(NoDataReason::NotFound));
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let mut frame = daily_frame("AAPL", date(2024, 1, 2), &[1.0, 2.0]);
        frame.columns.retain(|c| c.field() != Some(Field::Close));
        match cleaner(1).clean(&frame) {
            Outcome::NoData(NoDataReason::MalformedData(msg)) => assert!(msg.contains("close")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_multi_level_headers_are_understood() {
        let mut frame = daily_frame("AAPL", date(2024, 1, 2), &[10.0, 11.0]);
        for column in &mut frame.columns {
            column.header.push("AAPL".to_string());
        }
        let series = cleaner(1).clean(&frame).into_data().unwrap();
        assert_eq!(series.closes(), vec![10.0, 11.0]);
    }

    #[test]
    fn test_bad_timestamps_dropped_and_duplicates_keep_first() {
        let mut frame = daily_frame("BTC-USD", date(2024, 1, 1), &[10.0, 11.0, 12.0, 13.0]);
        frame.index[1] = RawTimestamp::Text("not a date".to_string());
        // 第四行与第一行时间相同，应保留第一行
        frame.index[3] = RawTimestamp::Text("2024-01-01".to_string());
        let series = cleaner(1).clean(&frame).into_data().unwrap();
        assert_eq!(series.closes(), vec![10.0, 12.0]);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut frame = daily_frame("BTC-USD", date(2024, 1, 1), &[10.0, 11.0, 12.0]);
        frame.index.reverse();
        let series = cleaner(1).clean(&frame).into_data().unwrap();
        assert_eq!(series.closes(), vec![12.0, 11.0, 10.0]);
        assert!(series.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_degenerate_rows_removed() {
        let mut frame = daily_frame("BTC-USD", date(2024, 1, 1), &[10.0, 11.0, 12.0]);
        // 第二行：成交量为0，开收相同，高低相同
        frame.columns[1].values[1] = Some(11.0);
        frame.columns[2].values[1] = Some(11.0);
        frame.columns[4].values[1] = Some(0.0);
        let series = cleaner(1).clean(&frame).into_data().unwrap();
        assert_eq!(series.closes(), vec![10.0, 12.0]);

        // 只有成交量为0但价格有波动的行保留
        let mut frame = daily_frame("BTC-USD", date(2024, 1, 1), &[10.0, 11.0, 12.0]);
        frame.columns[4].values[1] = Some(0.0);
        assert_eq!(cleaner(1).clean(&frame).into_data().unwrap().len(), 3);
    }

    #[test]
    fn test_gaps_forward_then_backward_filled() {
        let mut frame = daily_frame("BTC-USD", date(2024, 1, 1), &[10.0, 11.0, 12.0, 13.0]);
        frame.columns[3].values = vec![None, Some(11.0), None, Some(-1.0)];
        let series = cleaner(1).clean(&frame).into_data().unwrap();
        assert_eq!(series.closes(), vec![11.0, 11.0, 11.0, 11.0]);
    }

    #[test]
    fn test_missing_volume_column_is_malformed_after_fill() {
        let mut frame = daily_frame("BTC-USD", date(2024, 1, 1), &[10.0, 11.0]);
        frame.columns.retain(|c| c.field() != Some(Field::Volume));
        assert!(matches!(
            cleaner(1).clean(&frame),
            Outcome::NoData(NoDataReason::MalformedData(_))
        ));
    }

    #[test]
    fn test_weekends_removed_for_equity_only() {
        // 2024-01-01 (周一, 元旦) 起 14 天
        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        let equity = cleaner(1).clean(&daily_frame("AAPL", date(2024, 1, 1), &closes)).into_data().unwrap();
        let crypto = cleaner(1).clean(&daily_frame("BTC-USD", date(2024, 1, 1), &closes)).into_data().unwrap();

        assert_eq!(crypto.len(), 14);
        // 去掉 4 个周末日和元旦
        assert_eq!(equity.len(), 9);
        assert!(equity.bars.iter().all(|b| b.date().weekday().number_from_monday() <= 5));
    }

    #[test]
    fn test_weekly_bars_skip_calendar_filter() {
        let mut frame = daily_frame("AAPL", date(2024, 1, 1), &[1.0, 2.0, 3.0]);
        frame.interval = Interval::Weekly;
        frame.index = ["2024-01-01", "2024-01-08", "2024-01-15"]
            .iter()
            .map(|d| RawTimestamp::Text(d.to_string()))
            .collect();
        // 元旦和马丁路德金纪念日都是周一，周线不应被过滤
        assert_eq!(cleaner(1).clean(&frame).into_data().unwrap().len(), 3);
    }

    #[test]
    fn test_minimum_length_guard() {
        let closes: Vec<f64> = (0..20).map(|i| 50.0 + i as f64).collect();
        let frame = daily_frame("BTC-USD", date(2024, 1, 1), &closes);
        assert_eq!(
            cleaner(30).clean(&frame),
            Outcome::NoData(NoDataReason::InsufficientData { rows: 20, required: 30 })
        );
    }

    #[test]
    fn test_epoch_timestamps_use_exchange_timezone() {
        // 2024-01-02 14:30 UTC = 09:30 纽约
        let ts = RawTimestamp::Epoch(1_704_205_800);
        let ny = coerce_timestamp(&ts, Some(chrono_tz::America::New_York), Interval::Hourly).unwrap();
        assert_eq!(ny, date(2024, 1, 2).and_hms_opt(9, 30, 0).unwrap());
        let daily = coerce_timestamp(&ts, Some(chrono_tz::America::New_York), Interval::Daily).unwrap();
        assert_eq!(daily, date(2024, 1, 2).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 7) as f64).collect();
        let mut frame = daily_frame("AAPL", date(2024, 1, 1), &closes);
        frame.columns[3].values[5] = None;
        frame.columns[4].values[9] = None;
        frame.index[12] = RawTimestamp::Text("garbage".to_string());

        let c = cleaner(30);
        let once = c.clean(&frame).into_data().unwrap();
        let twice = c.clean(&RawFrame::from(&once)).into_data().unwrap();
        assert_eq!(once, twice);
    }
}
