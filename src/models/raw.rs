use crate::interval::Interval;
use crate::models::series::PriceSeries;
use chrono::NaiveDateTime;
use chrono_tz::Tz;

/// Canonical OHLCV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    pub const ALL: [Field; 5] = [Field::Open, Field::High, Field::Low, Field::Close, Field::Volume];
    pub const PRICES: [Field; 4] = [Field::Open, Field::High, Field::Low, Field::Close];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Open => "open",
            Field::High => "high",
            Field::Low => "low",
            Field::Close => "close",
            Field::Volume => "volume",
        }
    }

    /// 列名匹配不区分大小写，"Adj Close" 之类的衍生列不算
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_lowercase().as_str() {
            "open" | "o" => Some(Field::Open),
            "high" | "h" => Some(Field::High),
            "low" | "l" => Some(Field::Low),
            "close" | "c" => Some(Field::Close),
            "volume" | "v" => Some(Field::Volume),
            _ => None,
        }
    }
}

/// Row label as delivered by a provider, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    Epoch(i64),
    Text(String),
    Naive(NaiveDateTime),
}

/// One provider column. Providers that scope columns by symbol deliver
/// multi-level headers such as `["Close", "AAPL"]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub header: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl RawColumn {
    pub fn new(header: &[&str], values: Vec<Option<f64>>) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            values,
        }
    }

    /// Canonical field named by any level of the header.
    pub fn field(&self) -> Option<Field> {
        self.header.iter().find_map(|level| Field::from_header(level))
    }
}

/// Descriptive metadata returned next to the bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentMeta {
    pub symbol: Option<String>,
    pub display_name: Option<String>,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    pub instrument_type: Option<String>,
    pub regular_market_price: Option<f64>,
}

/// Provider payload before cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub symbol: String,
    pub interval: Interval,
    pub timezone: Option<Tz>,
    pub meta: InstrumentMeta,
    pub index: Vec<RawTimestamp>,
    pub columns: Vec<RawColumn>,
}

impl RawFrame {
    pub fn new(symbol: &str, interval: Interval) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval,
            timezone: None,
            meta: InstrumentMeta::default(),
            index: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn column(&self, field: Field) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.field() == Some(field))
    }

    pub fn has_price_columns(&self) -> bool {
        Field::PRICES.iter().all(|f| self.column(*f).is_some())
    }

    pub fn missing_price_columns(&self) -> Vec<&'static str> {
        Field::PRICES
            .iter()
            .filter(|f| self.column(**f).is_none())
            .map(|f| f.name())
            .collect()
    }

    /// 多级列名压平为单级：能识别出标准字段的用字段名，其余用下划线拼接
    pub fn flatten_columns(&mut self) {
        for column in &mut self.columns {
            if column.header.len() <= 1 && column.field().is_none() {
                continue;
            }
            let flat = match column.field() {
                Some(field) => field.name().to_string(),
                None => column.header.join("_"),
            };
            column.header = vec![flat];
        }
    }
}

impl From<&PriceSeries> for RawFrame {
    fn from(series: &PriceSeries) -> Self {
        let mut frame = RawFrame::new(&series.symbol, series.interval);
        frame.meta.display_name = series.display_name.clone();
        frame.meta.instrument_type = series.asset_class.instrument_type().map(|t| t.to_string());
        frame.index = series.bars.iter().map(|b| RawTimestamp::Naive(b.timestamp)).collect();
        frame.columns = vec![
            RawColumn::new(&["open"], series.bars.iter().map(|b| Some(b.open)).collect()),
            RawColumn::new(&["high"], series.bars.iter().map(|b| Some(b.high)).collect()),
            RawColumn::new(&["low"], series.bars.iter().map(|b| Some(b.low)).collect()),
            RawColumn::new(&["close"], series.bars.iter().map(|b| Some(b.close)).collect()),
            RawColumn::new(&["volume"], series.bars.iter().map(|b| Some(b.volume as f64)).collect()),
        ];
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_multi_level_headers() {
        let mut frame = RawFrame::new("AAPL", Interval::Daily);
        frame.columns = vec![
            RawColumn::new(&["Close", "AAPL"], vec![Some(1.0)]),
            RawColumn::new(&["Price", "Open"], vec![Some(1.0)]),
            RawColumn::new(&["Adj Close", "AAPL"], vec![Some(1.0)]),
        ];
        frame.flatten_columns();

        let headers: Vec<_> = frame.columns.iter().map(|c| c.header.clone()).collect();
        assert_eq!(headers[0], vec!["close"]);
        assert_eq!(headers[1], vec!["open"]);
        assert_eq!(headers[2], vec!["Adj Close_AAPL"]);
    }

    #[test]
    fn test_missing_price_columns() {
        let mut frame = RawFrame::new("AAPL", Interval::Daily);
        frame.columns = vec![
            RawColumn::new(&["Open"], vec![]),
            RawColumn::new(&["Close"], vec![]),
        ];
        assert!(!frame.has_price_columns());
        assert_eq!(frame.missing_price_columns(), vec!["high", "low"]);
    }
}
