// 公开导出的模块，供外部使用
pub mod models;
pub mod interval;
pub mod calendar;
pub mod cleaner;
pub mod indicators;
pub mod cache;
pub mod providers;
pub mod services;
pub mod config;
pub mod errors;
pub mod util;

// 重新导出常用类型，方便使用
pub use models::bar::Bar;
pub use models::outcome::{Diagnostic, NoDataReason, Outcome};
pub use models::raw::{RawFrame, RawTimestamp};
pub use models::request::{ChartRequest, IndicatorKind, RequestSpan};
pub use models::series::PriceSeries;
pub use models::symbol::{AssetClass, SymbolMatch};
pub use interval::{resolve_interval, Interval, Period};
pub use calendar::{Exchange, TradingCalendar};
pub use cleaner::DataCleaner;
pub use indicators::WindowPolicy;
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use services::chart_service::{ChartResponse, ChartService};
pub use services::symbol_resolver::{Resolution, SymbolResolver};
pub use config::Config;
pub use errors::{ChartDataError, Result};
