//! Period and interval vocabulary, and the period → interval policy.
//!
//! The policy picks the finest interval the upstream providers accept for a
//! requested span, trading chart resolution against payload size.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling granularity of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    FifteenMinutes,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::FifteenMinutes => "15m",
            Interval::Hourly => "1h",
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "15m" => Some(Interval::FifteenMinutes),
            "1h" | "60m" => Some(Interval::Hourly),
            "1d" => Some(Interval::Daily),
            "1wk" | "1w" => Some(Interval::Weekly),
            "1mo" => Some(Interval::Monthly),
            _ => None,
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(self, Interval::FifteenMinutes | Interval::Hourly)
    }

    /// Weekly and monthly bars are labelled with a bucket start that need not
    /// be a trading day.
    pub fn labels_trading_days(&self) -> bool {
        !matches!(self, Interval::Weekly | Interval::Monthly)
    }

    /// History span fetched when a caller asks by interval instead of period.
    pub fn default_lookback(&self) -> Duration {
        match self {
            Interval::FifteenMinutes => Duration::days(30),
            Interval::Hourly => Duration::days(720),
            Interval::Daily => Duration::days(20 * 365),
            Interval::Weekly => Duration::days(20 * 365),
            Interval::Monthly => Duration::days(25 * 365),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total span of history the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    YearToDate,
    OneYear,
    ThreeYears,
    FiveYears,
    TenYears,
    Max,
}

impl Period {
    pub const ALL: [Period; 11] = [
        Period::OneDay,
        Period::FiveDays,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::YearToDate,
        Period::OneYear,
        Period::ThreeYears,
        Period::FiveYears,
        Period::TenYears,
        Period::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::YearToDate => "ytd",
            Period::OneYear => "1y",
            Period::ThreeYears => "3y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::Max => "max",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL.iter().copied().find(|p| p.as_str() == value)
    }

    pub fn interval(&self) -> Interval {
        match self {
            Period::OneDay | Period::FiveDays => Interval::FifteenMinutes,
            Period::OneMonth | Period::ThreeMonths => Interval::Hourly,
            Period::SixMonths | Period::OneYear | Period::YearToDate => Interval::Daily,
            Period::ThreeYears | Period::FiveYears => Interval::Weekly,
            Period::TenYears | Period::Max => Interval::Monthly,
        }
    }

    /// Named range understood by the chart API; `None` when the span has to
    /// be sent as explicit bounds.
    pub fn named_range(&self) -> Option<&'static str> {
        match self {
            Period::ThreeYears => None,
            other => Some(other.as_str()),
        }
    }

    /// Start of the span relative to `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Period::OneDay => now - Duration::days(1),
            Period::FiveDays => now - Duration::days(5),
            Period::OneMonth => now - Duration::days(30),
            Period::ThreeMonths => now - Duration::days(91),
            Period::SixMonths => now - Duration::days(182),
            Period::YearToDate => Utc
                .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(now - Duration::days(365)),
            Period::OneYear => now - Duration::days(365),
            Period::ThreeYears => now - Duration::days(3 * 365),
            Period::FiveYears => now - Duration::days(5 * 365),
            Period::TenYears => now - Duration::days(10 * 365),
            Period::Max => DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interval for a free-form period string. Total: anything unrecognized gets
/// the coarsest interval.
pub fn resolve_interval(period: &str) -> Interval {
    Period::parse(period)
        .map(|p| p.interval())
        .unwrap_or(Interval::Monthly)
}

/// Time bounds of one upstream query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    pub range: Option<&'static str>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
