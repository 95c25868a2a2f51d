//! Exchange trading calendars.
//!
//! Holidays are generated from rules per exchange. Ad-hoc closures (mourning
//! days, one-off bank holidays) are added on top, optionally from a workbook.

use crate::errors::{ChartDataError, Result};
use crate::models::symbol::listing_suffix;
use calamine::{open_workbook_auto, DataType, Reader};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

const EUROPE_SUFFIXES: &[&str] = &[
    "AS", "PA", "BR", "LS", "MI", "MC", "DE", "F", "VI", "HE", "CO", "ST", "OL", "SW",
];

/// Calendar family of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    Us,
    London,
    Europe,
    Generic,
}

impl Exchange {
    /// 根据代码后缀推断交易所：无后缀视为美股，`^` 开头的指数同样按美股处理
    pub fn from_symbol(symbol: &str) -> Self {
        let symbol = symbol.trim().to_uppercase();
        match listing_suffix(&symbol) {
            None => Exchange::Us,
            Some("L") => Exchange::London,
            Some(suffix) if EUROPE_SUFFIXES.contains(&suffix) => Exchange::Europe,
            Some(_) => Exchange::Generic,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Exchange::Us => "US",
            Exchange::London => "LSE",
            Exchange::Europe => "EU",
            Exchange::Generic => "GENERIC",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "US" | "NYSE" | "NASDAQ" => Some(Exchange::Us),
            "LSE" | "L" | "LONDON" => Some(Exchange::London),
            "EU" | "EUROPE" | "EURONEXT" | "XETRA" => Some(Exchange::Europe),
            "GENERIC" => Some(Exchange::Generic),
            _ => None,
        }
    }

    pub fn timezone(&self) -> Option<Tz> {
        match self {
            Exchange::Us => Some(chrono_tz::America::New_York),
            Exchange::London => Some(chrono_tz::Europe::London),
            Exchange::Europe => Some(chrono_tz::Europe::Amsterdam),
            Exchange::Generic => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    extra_closures: HashMap<Exchange, BTreeSet<NaiveDate>>,
}

impl TradingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra_closures(mut self, exchange: Exchange, dates: &[NaiveDate]) -> Self {
        self.extra_closures
            .entry(exchange)
            .or_default()
            .extend(dates.iter().copied());
        self
    }

    /// 从工作簿第一张表读取额外休市日：A列为日期，B列（可选）为交易所代码，
    /// 未填交易所的行对所有交易所生效
    pub fn load_closures_from_workbook<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ChartDataError::DataError(format!("{} has no worksheet", path.display())))??;

        let mut loaded = 0;
        for (row_no, row) in range.rows().enumerate() {
            let date = match row.first().and_then(cell_to_date) {
                Some(date) => date,
                None => {
                    // 第一行通常是表头
                    if row_no > 0 {
                        warn!("Skipping row {} of {}: no date in first column", row_no + 1, path.display());
                    }
                    continue;
                }
            };

            let exchanges = match row.get(1).map(|cell| cell.to_string()) {
                Some(code) if !code.trim().is_empty() => match Exchange::parse(&code) {
                    Some(exchange) => vec![exchange],
                    None => {
                        warn!("Skipping row {} of {}: unknown exchange {}", row_no + 1, path.display(), code);
                        continue;
                    }
                },
                _ => vec![Exchange::Us, Exchange::London, Exchange::Europe, Exchange::Generic],
            };

            for exchange in exchanges {
                self.extra_closures.entry(exchange).or_default().insert(date);
            }
            loaded += 1;
        }

        info!("Loaded {} extra closures from {}", loaded, path.display());
        Ok(self)
    }

    pub fn is_holiday(&self, exchange: Exchange, date: NaiveDate) -> bool {
        if self
            .extra_closures
            .get(&exchange)
            .is_some_and(|dates| dates.contains(&date))
        {
            return true;
        }
        match exchange {
            Exchange::Us => us_holidays(date.year()).contains(&date),
            Exchange::London => london_holidays(date.year()).contains(&date),
            Exchange::Europe => europe_holidays(date.year()).contains(&date),
            Exchange::Generic => false,
        }
    }

    pub fn is_trading_day(&self, exchange: Exchange, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.is_holiday(exchange, date)
    }

    /// Trading days in `[start, end]`.
    pub fn trading_days(&self, exchange: Exchange, start: NaiveDate, end: NaiveDate) -> BTreeSet<NaiveDate> {
        let mut days = BTreeSet::new();
        if start > end {
            return days;
        }

        let mut holidays_by_year: HashMap<i32, BTreeSet<NaiveDate>> = HashMap::new();
        let mut date = start;
        while date <= end {
            if !is_weekend(date) {
                let holidays = holidays_by_year
                    .entry(date.year())
                    .or_insert_with(|| self.holidays(exchange, date.year()));
                if !holidays.contains(&date) {
                    days.insert(date);
                }
            }
            date += Duration::days(1);
        }

        debug!("{} trading days for {} between {} and {}", days.len(), exchange.code(), start, end);
        days
    }

    fn holidays(&self, exchange: Exchange, year: i32) -> BTreeSet<NaiveDate> {
        let mut holidays: BTreeSet<NaiveDate> = match exchange {
            Exchange::Us => us_holidays(year),
            Exchange::London => london_holidays(year),
            Exchange::Europe => europe_holidays(year),
            Exchange::Generic => Vec::new(),
        }
        .into_iter()
        .collect();

        if let Some(extra) = self.extra_closures.get(&exchange) {
            holidays.extend(extra.iter().filter(|d| d.year() == year));
        }
        holidays
    }
}

fn cell_to_date(cell: &DataType) -> Option<NaiveDate> {
    match cell {
        DataType::String(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(text.trim(), "%d-%m-%Y"))
            .ok(),
        // Excel 序列日期，以 1899-12-30 为零点
        DataType::DateTime(serial) | DataType::Float(serial) => excel_serial_to_date(*serial),
        DataType::Int(serial) => excel_serial_to_date(*serial as f64),
        _ => None,
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Western Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut date = first_of_next.pred_opt()?;
    while date.weekday() != weekday {
        date = date.pred_opt()?;
    }
    Some(date)
}

// 周六的节假日提前到周五，周日的顺延到周一
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// NYSE full-day closures.
fn us_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::new();

    // 元旦落在周六时不补休（前一年12月31日照常交易）
    if let Some(new_year) = NaiveDate::from_ymd_opt(year, 1, 1) {
        match new_year.weekday() {
            Weekday::Sat => {}
            Weekday::Sun => days.push(new_year + Duration::days(1)),
            _ => days.push(new_year),
        }
    }
    if year >= 1998 {
        days.extend(nth_weekday(year, 1, Weekday::Mon, 3));
    }
    days.extend(nth_weekday(year, 2, Weekday::Mon, 3));
    days.extend(easter_sunday(year).map(|easter| easter - Duration::days(2)));
    days.extend(last_weekday(year, 5, Weekday::Mon));
    if year >= 2022 {
        days.extend(NaiveDate::from_ymd_opt(year, 6, 19).map(observed));
    }
    days.extend(NaiveDate::from_ymd_opt(year, 7, 4).map(observed));
    days.extend(nth_weekday(year, 9, Weekday::Mon, 1));
    days.extend(nth_weekday(year, 11, Weekday::Thu, 4));
    days.extend(NaiveDate::from_ymd_opt(year, 12, 25).map(observed));
    days
}

/// London Stock Exchange closures (England and Wales bank holidays).
fn london_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::new();

    if let Some(new_year) = NaiveDate::from_ymd_opt(year, 1, 1) {
        days.push(match new_year.weekday() {
            Weekday::Sat => new_year + Duration::days(2),
            Weekday::Sun => new_year + Duration::days(1),
            _ => new_year,
        });
    }
    if let Some(easter) = easter_sunday(year) {
        days.push(easter - Duration::days(2));
        days.push(easter + Duration::days(1));
    }
    days.extend(nth_weekday(year, 5, Weekday::Mon, 1));
    days.extend(last_weekday(year, 5, Weekday::Mon));
    days.extend(last_weekday(year, 8, Weekday::Mon));

    if let Some(christmas) = NaiveDate::from_ymd_opt(year, 12, 25) {
        let boxing = christmas + Duration::days(1);
        match christmas.weekday() {
            Weekday::Fri => {
                days.push(christmas);
                days.push(christmas + Duration::days(3));
            }
            Weekday::Sat => {
                days.push(christmas + Duration::days(2));
                days.push(christmas + Duration::days(3));
            }
            Weekday::Sun => {
                days.push(boxing);
                days.push(christmas + Duration::days(2));
            }
            _ => {
                days.push(christmas);
                days.push(boxing);
            }
        }
    }
    days
}

/// Continental European listings share one rule: 1 Jan, Good Friday, Easter
/// Monday, 1 May, 25 and 26 Dec. No weekend substitution.
fn europe_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    days.extend(NaiveDate::from_ymd_opt(year, 1, 1));
    if let Some(easter) = easter_sunday(year) {
        days.push(easter - Duration::days(2));
        days.push(easter + Duration::days(1));
    }
    days.extend(NaiveDate::from_ymd_opt(year, 5, 1));
    days.extend(NaiveDate::from_ymd_opt(year, 12, 25));
    days.extend(NaiveDate::from_ymd_opt(year, 12, 26));
    days
}
