pub mod finnhub;
pub mod yahoo;

use crate::errors::Result;
use crate::interval::{FetchWindow, Interval};
use crate::models::raw::RawFrame;
use crate::models::symbol::SymbolMatch;
use async_trait::async_trait;

pub use finnhub::FinnhubProvider;
pub use yahoo::YahooProvider;

/// Source of historical bars.
#[async_trait]
pub trait MarketDataProvider {
    /// Name used in diagnostics and logs
    fn provider_name(&self) -> &'static str;

    /// Fetch bars for `symbol` covering `window`.
    /// An unknown symbol is an empty frame, not an error.
    async fn fetch_bars(&self, symbol: &str, interval: Interval, window: &FetchWindow) -> Result<RawFrame>;
}

/// Direct lookup of one symbol.
#[async_trait]
pub trait SymbolLookup {
    fn provider_name(&self) -> &'static str;

    /// `Some` only when the symbol is a confirmed, tradeable instrument
    async fn lookup(&self, symbol: &str) -> Result<Option<SymbolMatch>>;
}

/// Free-text search returning candidates in provider order.
#[async_trait]
pub trait SymbolSearch {
    fn provider_name(&self) -> &'static str;

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>>;
}
