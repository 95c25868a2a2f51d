use crate::calendar::Exchange;
use crate::config::Config;
use crate::errors::{ChartDataError, Result};
use crate::interval::{FetchWindow, Interval};
use crate::models::raw::{Field, RawColumn, RawFrame, RawTimestamp};
use crate::models::symbol::{exchange_code, SymbolMatch};
use crate::providers::{MarketDataProvider, SymbolSearch};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Finnhub REST API: symbol search and candles. Needs an API key.
pub struct FinnhubProvider {
    client: Client,
    base_url: String,
    api_key: String,
    request_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl FinnhubProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .finnhub_api_key
            .clone()
            .ok_or_else(|| ChartDataError::ConfigError("Finnhub API key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ChartDataError::RequestError)?;

        Ok(Self {
            client,
            base_url: config.finnhub_base_url.clone(),
            api_key,
            request_interval: config.finnhub_min_interval,
            last_request: Mutex::new(None),
        })
    }

    // 免费额度有调用频率限制，两次请求之间至少间隔 request_interval
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(time) = *last {
            let elapsed = time.elapsed();
            if elapsed < self.request_interval {
                tokio::time::sleep(self.request_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.wait_for_rate_limit().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChartDataError::provider("finnhub", format!("HTTP {} for {}", status, path)));
        }

        let json: Value = response.json().await?;
        if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
            return Err(ChartDataError::provider("finnhub", error));
        }
        Ok(json)
    }
}

/// Candle resolution for an interval.
pub fn resolution(interval: Interval) -> &'static str {
    match interval {
        Interval::FifteenMinutes => "15",
        Interval::Hourly => "60",
        Interval::Daily => "D",
        Interval::Weekly => "W",
        Interval::Monthly => "M",
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn provider_name(&self) -> &'static str {
        "finnhub"
    }

    async fn fetch_bars(&self, symbol: &str, interval: Interval, window: &FetchWindow) -> Result<RawFrame> {
        info!("Fetching {} candles for {} from Finnhub", interval, symbol);

        let query = [
            ("symbol", symbol.to_string()),
            ("resolution", resolution(interval).to_string()),
            ("from", window.start.timestamp().to_string()),
            ("to", window.end.timestamp().to_string()),
        ];
        let json = self.get_json("/stock/candle", &query).await?;
        let frame = parse_candles(symbol, interval, &json)?;
        info!("Finnhub returned {} rows for {}", frame.len(), symbol);
        Ok(frame)
    }
}

#[async_trait]
impl SymbolSearch for FinnhubProvider {
    fn provider_name(&self) -> &'static str {
        "finnhub"
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>> {
        let json = self.get_json("/search", &[("q", query.to_string())]).await?;
        let matches = parse_search(&json);
        debug!("Finnhub search '{}' returned {} candidates", query, matches.len());
        Ok(matches)
    }
}

pub fn parse_search(json: &Value) -> Vec<SymbolMatch> {
    let results = match json.get("result").and_then(|r| r.as_array()) {
        Some(results) => results,
        None => return Vec::new(),
    };

    results
        .iter()
        .filter_map(|item| {
            let symbol = item.get("symbol").and_then(|s| s.as_str())?;
            if symbol.is_empty() {
                return None;
            }
            let name = item.get("description").and_then(|d| d.as_str()).unwrap_or(symbol);
            Some(SymbolMatch::new(symbol, name, Some(&exchange_code(symbol))))
        })
        .collect()
}

// 非整数时间戳保留为文本，由清洗整行丢弃，价格列不会错位
fn candle_timestamp(value: &Value) -> RawTimestamp {
    match value.as_i64() {
        Some(secs) => RawTimestamp::Epoch(secs),
        None => RawTimestamp::Text(value.to_string()),
    }
}

/// Candle JSON → raw frame. Status `no_data` is an empty frame.
pub fn parse_candles(symbol: &str, interval: Interval, json: &Value) -> Result<RawFrame> {
    let mut frame = RawFrame::new(symbol, interval);

    match json.get("s").and_then(|s| s.as_str()) {
        Some("ok") => {}
        Some("no_data") => return Ok(frame),
        other => {
            return Err(ChartDataError::provider(
                "finnhub",
                format!("unexpected candle status {:?} for {}", other, symbol),
            ))
        }
    }

    // 日线及以上的时间戳是 UTC 零点，只有日内数据需要换算到交易所时区
    if interval.is_intraday() {
        frame.timezone = Exchange::from_symbol(symbol).timezone();
    }

    frame.index = json
        .get("t")
        .and_then(|t| t.as_array())
        .map(|t| t.iter().map(candle_timestamp).collect())
        .unwrap_or_default();

    let keys = [
        (Field::Open, "o"),
        (Field::High, "h"),
        (Field::Low, "l"),
        (Field::Close, "c"),
        (Field::Volume, "v"),
    ];
    for (field, key) in keys {
        if let Some(values) = json.get(key).and_then(|v| v.as_array()) {
            let mut values: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
            values.resize(frame.index.len(), None);
            frame.columns.push(RawColumn::new(&[field.name()], values));
        }
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::TradingCalendar;
    use crate::cleaner::DataCleaner;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_parse_candles() {
        let json = json!({
            "c": [217.68, 221.03],
            "h": [219.49, 221.48],
            "l": [216.58, 217.71],
            "o": [217.37, 218.85],
            "s": "ok",
            "t": [1569297600, 1569384000],
            "v": [33463820, 24018876]
        });
        let frame = parse_candles("AAPL", Interval::Daily, &json).unwrap();
        assert_eq!(frame.len(), 2);
        assert!(frame.has_price_columns());
        assert_eq!(frame.timezone, None);
        assert_eq!(frame.column(Field::Close).unwrap().values, vec![Some(217.68), Some(221.03)]);

        let intraday = parse_candles("ASML.AS", Interval::Hourly, &json).unwrap();
        assert_eq!(intraday.timezone, Some(chrono_tz::Europe::Amsterdam));
    }

    #[test]
    fn test_no_data_is_empty() {
        let frame = parse_candles("AAPL", Interval::Daily, &json!({"s": "no_data"})).unwrap();
        assert!(frame.is_empty());
        assert!(parse_candles("AAPL", Interval::Daily, &json!({})).is_err());
    }

    #[test]
    fn test_null_timestamp_keeps_rows_aligned() {
        let json = json!({
            "c": [10.0, 20.0, 30.0],
            "h": [11.0, 21.0, 31.0],
            "l": [9.0, 19.0, 29.0],
            "o": [10.0, 20.0, 30.0],
            "s": "ok",
            "t": [1704153600, null, 1704326400],
            "v": [100, 200, 300]
        });
        let frame = parse_candles("AAPL", Interval::Daily, &json).unwrap();
        assert_eq!(frame.len(), 3);
        assert!(matches!(frame.index[1], RawTimestamp::Text(_)));
        assert_eq!(frame.index[2], RawTimestamp::Epoch(1704326400));
        assert_eq!(frame.column(Field::Close).unwrap().values[2], Some(30.0));

        let cleaner = DataCleaner::new(Arc::new(TradingCalendar::new()), 1);
        let series = cleaner.clean(&frame).into_data().unwrap();
        assert_eq!(series.closes(), vec![10.0, 30.0]);
    }

    #[test]
    fn test_parse_search() {
        let json = json!({
            "count": 3,
            "result": [
                {"description": "APPLE INC", "displaySymbol": "AAPL", "symbol": "AAPL", "type": "Common Stock"},
                {"description": "APPLE INC", "displaySymbol": "APC.DE", "symbol": "APC.DE", "type": "Common Stock"},
                {"description": "", "displaySymbol": "", "symbol": "", "type": ""}
            ]
        });
        let matches = parse_search(&json);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].exchange.as_deref(), Some("US"));
        assert_eq!(matches[1].exchange.as_deref(), Some("DE"));
        assert_eq!(matches[1].display_name, "APPLE INC");
    }

    #[test]
    fn test_resolution_mapping() {
        assert_eq!(resolution(Interval::FifteenMinutes), "15");
        assert_eq!(resolution(Interval::Monthly), "M");
    }

    #[test]
    fn test_requires_api_key() {
        assert!(FinnhubProvider::new(&Config::new()).is_err());
        assert!(FinnhubProvider::new(&Config::new().with_finnhub_api_key("demo")).is_ok());
    }
}
