use crate::models::outcome::{Diagnostic, NoDataReason, Outcome};
use crate::models::raw::RawFrame;
use crate::models::request::RequestSpan;
use crate::providers::MarketDataProvider;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

/// Fetches raw bars from a chain of providers, first usable answer wins.
pub struct MarketDataFetcher {
    providers: Vec<Arc<dyn MarketDataProvider + Send + Sync>>,
}

impl MarketDataFetcher {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider + Send + Sync>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    pub async fn fetch(&self, symbol: &str, span: RequestSpan) -> Outcome<RawFrame> {
        self.fetch_at(symbol, span, Utc::now()).await
    }

    /// Same as [`fetch`](Self::fetch) with the window anchored at `now`.
    pub async fn fetch_at(&self, symbol: &str, span: RequestSpan, now: DateTime<Utc>) -> Outcome<RawFrame> {
        let interval = span.interval();
        let window = span.window(now);
        info!("Fetching {} ({}, interval {})", symbol, span, interval);

        let mut no_data: Option<NoDataReason> = None;
        let mut failure: Option<Diagnostic> = None;

        for provider in &self.providers {
            let name = provider.provider_name();
            match provider.fetch_bars(symbol, interval, &window).await {
                Ok(mut frame) => {
                    frame.flatten_columns();
                    if frame.is_empty() {
                        debug!("{} has no data for {}", name, symbol);
                        no_data.get_or_insert(NoDataReason::NotFound);
                        continue;
                    }
                    let missing = frame.missing_price_columns();
                    if !missing.is_empty() {
                        warn!("{} returned {} without columns: {}", name, symbol, missing.join(", "));
                        no_data = Some(NoDataReason::MalformedData(format!(
                            "{} response lacks columns: {}",
                            name,
                            missing.join(", ")
                        )));
                        continue;
                    }
                    return Outcome::Data(frame);
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", name, symbol, e);
                    failure = Some(Diagnostic::from_error(name, &e));
                }
            }
        }

        // 只要有数据源明确回答"无数据"，就不把结果当作故障
        if let Some(reason) = no_data {
            return Outcome::NoData(reason);
        }
        match failure {
            Some(diagnostic) => Outcome::Failed(diagnostic),
            None => Outcome::Failed(Diagnostic::new("fetcher", "no market data provider configured")),
        }
    }
}
