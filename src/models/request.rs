use crate::interval::{FetchWindow, Interval, Period};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What span of history a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestSpan {
    /// 按展示周期请求，间隔由周期推导
    Period(Period),
    /// 按K线间隔请求，回看长度取该间隔的默认值
    Interval(Interval),
}

impl RequestSpan {
    pub fn interval(&self) -> Interval {
        match self {
            RequestSpan::Period(period) => period.interval(),
            RequestSpan::Interval(interval) => *interval,
        }
    }

    pub fn window(&self, now: DateTime<Utc>) -> FetchWindow {
        match self {
            RequestSpan::Period(period) => FetchWindow {
                range: period.named_range(),
                start: period.start(now),
                end: now,
            },
            RequestSpan::Interval(interval) => FetchWindow {
                range: None,
                start: now - interval.default_lookback(),
                end: now,
            },
        }
    }
}

impl fmt::Display for RequestSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestSpan::Period(period) => write!(f, "period {}", period),
            RequestSpan::Interval(interval) => write!(f, "interval {}", interval),
        }
    }
}

/// Overlay indicator selectable on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IndicatorKind {
    Sma(usize),
    Wma(usize),
    Bollinger { window: usize, num_std: f64 },
}

impl IndicatorKind {
    pub const BOLLINGER_MIDDLE: &'static str = "BB_MIDDLE";
    pub const BOLLINGER_UPPER: &'static str = "BB_UPPER";
    pub const BOLLINGER_LOWER: &'static str = "BB_LOWER";

    pub fn bollinger() -> Self {
        IndicatorKind::Bollinger { window: 20, num_std: 2.0 }
    }

    /// 默认勾选的均线
    pub fn default_overlays() -> Vec<Self> {
        vec![IndicatorKind::Sma(20), IndicatorKind::Sma(50)]
    }

    /// 图表上可供选择的均线
    pub fn offered_overlays() -> Vec<Self> {
        vec![IndicatorKind::Sma(20), IndicatorKind::Sma(50), IndicatorKind::Sma(200)]
    }

    /// Accepts `MA20`, `SMA20`, `WMA50`, `BB` and `BB20`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_uppercase();
        if let Some(window) = value.strip_prefix("WMA") {
            return window.parse().ok().map(IndicatorKind::Wma);
        }
        if let Some(window) = value.strip_prefix("SMA").or_else(|| value.strip_prefix("MA")) {
            return window.parse().ok().map(IndicatorKind::Sma);
        }
        if let Some(window) = value.strip_prefix("BB") {
            if window.is_empty() {
                return Some(Self::bollinger());
            }
            return window
                .parse()
                .ok()
                .map(|window| IndicatorKind::Bollinger { window, num_std: 2.0 });
        }
        None
    }

    pub fn column_names(&self) -> Vec<String> {
        match self {
            IndicatorKind::Sma(window) => vec![format!("MA{}", window)],
            IndicatorKind::Wma(window) => vec![format!("WMA{}", window)],
            IndicatorKind::Bollinger { .. } => vec![
                Self::BOLLINGER_MIDDLE.to_string(),
                Self::BOLLINGER_UPPER.to_string(),
                Self::BOLLINGER_LOWER.to_string(),
            ],
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorKind::Sma(window) => write!(f, "MA{}", window),
            IndicatorKind::Wma(window) => write!(f, "WMA{}", window),
            IndicatorKind::Bollinger { window, num_std } => write!(f, "BB{}({})", window, num_std),
        }
    }
}

/// Parameters of one pipeline run. Built by whatever front end drives the
/// pipeline; the pipeline knows nothing else about the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub symbol: String,
    pub span: RequestSpan,
    pub indicators: Vec<IndicatorKind>,
}

impl ChartRequest {
    pub fn new(symbol: &str, span: RequestSpan) -> Self {
        Self {
            symbol: symbol.to_string(),
            span,
            indicators: Vec::new(),
        }
    }

    /// Unknown period strings fall back to `max`, consistent with the
    /// interval policy's coarsest default.
    pub fn for_period(symbol: &str, period: &str) -> Self {
        let period = Period::parse(period).unwrap_or(Period::Max);
        Self::new(symbol, RequestSpan::Period(period))
    }

    pub fn with_indicators(mut self, indicators: Vec<IndicatorKind>) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn with_indicator(mut self, indicator: IndicatorKind) -> Self {
        self.indicators.push(indicator);
        self
    }
}
