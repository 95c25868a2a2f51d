use crate::config::Config;
use crate::errors::{ChartDataError, Result};
use crate::interval::{FetchWindow, Interval};
use crate::models::raw::{Field, InstrumentMeta, RawColumn, RawFrame, RawTimestamp};
use crate::models::symbol::SymbolMatch;
use crate::providers::{MarketDataProvider, SymbolLookup};
use async_trait::async_trait;
use chrono_tz::Tz;
use log::{debug, info};
use reqwest::{Client, Url};
use serde_json::Value;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// 可交易的品种类型
const TRADEABLE_TYPES: &[&str] = &[
    "EQUITY",
    "ETF",
    "MUTUALFUND",
    "INDEX",
    "CRYPTOCURRENCY",
    "CURRENCY",
    "FUTURE",
];

/// Yahoo Finance chart API (`v8/finance/chart`).
pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ChartDataError::RequestError)?;

        Ok(Self {
            client,
            base_url: config.yahoo_base_url.clone(),
        })
    }

    async fn get_chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = chart_url(&self.base_url, symbol)?;
        debug!("GET {} {:?}", url, query);

        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        // 404 时仍然返回 chart.error，交给解析处理
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(ChartDataError::provider("yahoo", format!("HTTP {} for {}", status, symbol)));
        }
        Ok(response.json().await?)
    }
}

/// Chart endpoint for `symbol`. The symbol is one percent-encoded path
/// segment, so `/`, `#` or `?` in user input cannot change the request.
pub fn chart_url(base_url: &str, symbol: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ChartDataError::ConfigError(format!("Invalid Yahoo base URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| ChartDataError::ConfigError(format!("Yahoo base URL {} cannot take a path", base_url)))?
        .pop_if_empty()
        .extend(["v8", "finance", "chart", symbol]);
    Ok(url)
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_bars(&self, symbol: &str, interval: Interval, window: &FetchWindow) -> Result<RawFrame> {
        info!("Fetching {} bars for {} from Yahoo", interval, symbol);

        let mut query = vec![
            ("interval", interval.as_str().to_string()),
            ("includePrePost", "false".to_string()),
        ];
        match window.range {
            Some(range) => query.push(("range", range.to_string())),
            None => {
                query.push(("period1", window.start.timestamp().to_string()));
                query.push(("period2", window.end.timestamp().to_string()));
            }
        }

        let json = self.get_chart(symbol, &query).await?;
        let frame = parse_chart_response(symbol, interval, &json)?;
        info!("Yahoo returned {} rows for {}", frame.len(), symbol);
        Ok(frame)
    }
}

#[async_trait]
impl SymbolLookup for YahooProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo"
    }

    async fn lookup(&self, symbol: &str) -> Result<Option<SymbolMatch>> {
        let query = [("interval", "1d".to_string()), ("range", "5d".to_string())];
        let json = self.get_chart(symbol, &query).await?;
        let frame = parse_chart_response(symbol, Interval::Daily, &json)?;
        Ok(confirmed_match(symbol, &frame.meta))
    }
}

/// A symbol counts as confirmed when the quote carries a market price and a
/// tradeable instrument type.
pub fn confirmed_match(symbol: &str, meta: &InstrumentMeta) -> Option<SymbolMatch> {
    meta.regular_market_price?;
    let instrument_type = meta.instrument_type.as_deref()?.to_uppercase();
    if !TRADEABLE_TYPES.contains(&instrument_type.as_str()) {
        return None;
    }

    let symbol = meta.symbol.as_deref().unwrap_or(symbol);
    let name = meta.display_name.as_deref().unwrap_or(symbol);
    Some(SymbolMatch::new(symbol, name, meta.exchange_name.as_deref()))
}

/// Chart JSON → raw frame. A `Not Found` error payload is an empty frame.
pub fn parse_chart_response(symbol: &str, interval: Interval, json: &Value) -> Result<RawFrame> {
    let chart = json
        .get("chart")
        .ok_or_else(|| ChartDataError::provider("yahoo", "response has no chart object"))?;

    let mut frame = RawFrame::new(symbol, interval);

    if let Some(error) = chart.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("");
        let description = error.get("description").and_then(|d| d.as_str()).unwrap_or("");
        if code.eq_ignore_ascii_case("Not Found") {
            debug!("Yahoo has no data for {}: {}", symbol, description);
            return Ok(frame);
        }
        return Err(ChartDataError::provider("yahoo", format!("{}: {}", code, description)));
    }

    let result = match chart.get("result").and_then(|r| r.as_array()).and_then(|r| r.first()) {
        Some(result) => result,
        None => return Ok(frame),
    };

    if let Some(meta) = result.get("meta") {
        frame.meta = parse_meta(meta);
        frame.timezone = meta
            .get("exchangeTimezoneName")
            .and_then(|tz| tz.as_str())
            .and_then(|tz| tz.parse::<Tz>().ok());
    }

    let timestamps = match result.get("timestamp").and_then(|t| t.as_array()) {
        Some(timestamps) => timestamps,
        None => return Ok(frame),
    };
    frame.index = timestamps
        .iter()
        .map(|t| match t.as_i64() {
            Some(secs) => RawTimestamp::Epoch(secs),
            None => RawTimestamp::Text(t.to_string()),
        })
        .collect();

    let quote = result
        .get("indicators")
        .and_then(|i| i.get("quote"))
        .and_then(|q| q.as_array())
        .and_then(|q| q.first());

    if let Some(quote) = quote {
        for field in Field::ALL {
            if let Some(values) = quote.get(field.name()).and_then(|v| v.as_array()) {
                let mut values: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
                values.resize(frame.index.len(), None);
                frame.columns.push(RawColumn::new(&[field.name()], values));
            }
        }
    }

    Ok(frame)
}

fn parse_meta(meta: &Value) -> InstrumentMeta {
    let text = |key: &str| meta.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());
    InstrumentMeta {
        symbol: text("symbol"),
        display_name: text("longName").or_else(|| text("shortName")),
        currency: text("currency"),
        exchange_name: text("exchangeName"),
        instrument_type: text("instrumentType"),
        regular_market_price: meta.get("regularMarketPrice").and_then(|v| v.as_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chart_url_encodes_symbol() {
        let base = "https://query1.finance.yahoo.com";
        assert_eq!(
            chart_url(base, "ASML.AS").unwrap().as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/ASML.AS"
        );
        assert_eq!(chart_url(base, "A/B").unwrap().path(), "/v8/finance/chart/A%2FB");
        let url = chart_url(&format!("{}/", base), "AAPL#x").unwrap();
        assert_eq!(url.path(), "/v8/finance/chart/AAPL%23x");
        assert_eq!(url.fragment(), None);
        assert!(chart_url("not a url", "AAPL").is_err());
    }

    fn sample_chart() -> Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "USD",
                        "symbol": "AAPL",
                        "exchangeName": "NMS",
                        "instrumentType": "EQUITY",
                        "regularMarketPrice": 189.5,
                        "exchangeTimezoneName": "America/New_York",
                        "longName": "Apple Inc.",
                        "shortName": "Apple"
                    },
                    "timestamp": [1704205800, 1704292200, 1704378600],
                    "indicators": {
                        "quote": [{
                            "open": [187.15, 184.22, null],
                            "high": [188.44, 185.88, 183.09],
                            "low": [183.89, 183.43, 180.88],
                            "close": [185.64, 184.25, 181.91],
                            "volume": [82488700, 58414500, 71983600]
                        }]
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_parse_chart_response() {
        let frame = parse_chart_response("AAPL", Interval::Daily, &sample_chart()).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.index[0], RawTimestamp::Epoch(1704205800));
        assert_eq!(frame.timezone, Some(chrono_tz::America::New_York));
        assert!(frame.has_price_columns());
        assert_eq!(frame.column(Field::Open).unwrap().values[2], None);
        assert_eq!(frame.column(Field::Volume).unwrap().values[1], Some(58414500.0));
        assert_eq!(frame.meta.display_name.as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn test_not_found_is_empty_frame() {
        let json = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        });
        let frame = parse_chart_response("NOPE", Interval::Daily, &json).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_other_errors_are_failures() {
        let json = json!({
            "chart": {"result": null, "error": {"code": "Bad Request", "description": "Invalid input"}}
        });
        assert!(parse_chart_response("AAPL", Interval::Daily, &json).is_err());
        assert!(parse_chart_response("AAPL", Interval::Daily, &json!({"finance": {}})).is_err());
    }

    #[test]
    fn test_confirmed_match_requires_price_and_type() {
        let frame = parse_chart_response("aapl", Interval::Daily, &sample_chart()).unwrap();
        let matched = confirmed_match("aapl", &frame.meta).unwrap();
        assert_eq!(matched.symbol, "AAPL");
        assert_eq!(matched.display_name, "Apple Inc.");
        assert_eq!(matched.exchange.as_deref(), Some("NMS"));

        let mut meta = frame.meta.clone();
        meta.regular_market_price = None;
        assert!(confirmed_match("AAPL", &meta).is_none());

        let mut meta = frame.meta;
        meta.instrument_type = Some("OPTION".to_string());
        assert!(confirmed_match("AAPL", &meta).is_none());
    }
}
