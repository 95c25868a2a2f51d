use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 单根K线（OHLCV），时间戳为交易所本地时间，不带时区
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// 无成交且价格没有任何波动的K线视为噪声
    pub fn is_degenerate(&self) -> bool {
        self.volume == 0 && self.open == self.close && self.high == self.low
    }
}
