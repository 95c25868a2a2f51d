use crate::cache::{Clock, SystemClock, TtlCache};
use crate::calendar::TradingCalendar;
use crate::cleaner::DataCleaner;
use crate::config::Config;
use crate::errors::Result;
use crate::indicators;
use crate::interval::Interval;
use crate::models::outcome::{NoDataReason, Outcome};
use crate::models::request::{ChartRequest, IndicatorKind, RequestSpan};
use crate::models::series::PriceSeries;
use crate::providers::{FinnhubProvider, MarketDataProvider, SymbolLookup, SymbolSearch, YahooProvider};
use crate::services::fetcher::MarketDataFetcher;
use crate::services::symbol_resolver::{Resolution, SymbolResolver};
use crate::util;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// 缓存键：同一代码、同一时间跨度、同一K线间隔共享一份清洗后的数据
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub symbol: String,
    pub span: RequestSpan,
    pub interval: Interval,
}

/// Everything a front end needs to draw one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartResponse {
    pub symbol: String,
    pub display_name: Option<String>,
    pub interval: Interval,
    pub series: Outcome<PriceSeries>,
    pub warnings: Vec<String>,
}

impl ChartResponse {
    pub fn has_data(&self) -> bool {
        self.series.is_data()
    }
}

/// The chart pipeline: resolve, fetch, clean, cache, compute indicators.
pub struct ChartService {
    config: Config,
    resolver: SymbolResolver,
    fetcher: MarketDataFetcher,
    cleaner: DataCleaner,
    cache: TtlCache<SeriesKey, Outcome<Arc<PriceSeries>>>,
}

impl ChartService {
    /// Service wired to the live providers. Finnhub joins the chain only when
    /// an API key is configured.
    pub fn new(config: Config) -> Result<Self> {
        let yahoo = Arc::new(YahooProvider::new(&config)?);
        let mut providers: Vec<Arc<dyn MarketDataProvider + Send + Sync>> = vec![yahoo.clone()];
        let mut search: Option<Arc<dyn SymbolSearch + Send + Sync>> = None;

        if config.finnhub_api_key.is_some() {
            let finnhub = Arc::new(FinnhubProvider::new(&config)?);
            providers.push(finnhub.clone());
            search = Some(finnhub);
        } else {
            info!("No Finnhub API key configured, symbol search is disabled");
        }

        let mut calendar = TradingCalendar::new();
        if let Some(path) = &config.closures_workbook {
            calendar = calendar.load_closures_from_workbook(path)?;
        }

        let lookup: Arc<dyn SymbolLookup + Send + Sync> = yahoo;
        let resolver = SymbolResolver::new(Some(lookup), search, config.preferred_exchanges.clone());
        let fetcher = MarketDataFetcher::new(providers);

        Ok(Self::from_parts(config, resolver, fetcher, calendar, Arc::new(SystemClock)))
    }

    pub fn from_parts(
        config: Config,
        resolver: SymbolResolver,
        fetcher: MarketDataFetcher,
        calendar: TradingCalendar,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cleaner = DataCleaner::new(Arc::new(calendar), config.min_rows);
        info!("Chart service using providers: {}", fetcher.provider_names().join(", "));
        Self {
            config,
            resolver,
            fetcher,
            cleaner,
            cache: TtlCache::with_clock(clock),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn search(&self, query: &str) -> Resolution {
        self.resolver.resolve(query).await
    }

    pub async fn chart(&self, request: &ChartRequest) -> ChartResponse {
        let symbol = util::normalize_symbol(&request.symbol);
        let interval = request.span.interval();

        if symbol.is_empty() {
            return ChartResponse {
                symbol,
                display_name: None,
                interval,
                series: Outcome::NoData(NoDataReason::NotFound),
                warnings: vec!["no symbol given".to_string()],
            };
        }

        let key = SeriesKey {
            symbol: symbol.clone(),
            span: request.span,
            interval,
        };
        let cached = self
            .cache
            .get_or_compute_by(key, || self.load_series(&symbol, request.span), |outcome| self.ttl_for(outcome))
            .await;

        let mut warnings = Vec::new();
        let series = match cached {
            Outcome::Data(series) => {
                warnings.extend(window_warnings(&series, &request.indicators));
                Outcome::Data(indicators::compute(&series, &request.indicators, self.config.window_policy))
            }
            Outcome::NoData(reason) => {
                warnings.push(reason.to_string());
                Outcome::NoData(reason)
            }
            Outcome::Failed(diagnostic) => {
                warnings.push(format!("data temporarily unavailable ({})", diagnostic));
                Outcome::Failed(diagnostic)
            }
        };

        ChartResponse {
            display_name: series.data().and_then(|s| s.display_name.clone()),
            symbol,
            interval,
            series,
            warnings,
        }
    }

    /// Resolves free text to its best symbol, then charts it with the same
    /// span and indicators as `request`.
    pub async fn chart_query(&self, query: &str, request: &ChartRequest) -> ChartResponse {
        let resolution = self.search(query).await;
        let mut warnings: Vec<String> = resolution.diagnostics.iter().map(|d| d.to_string()).collect();

        let best = match resolution.best() {
            Some(best) => best,
            None => {
                warnings.push(format!("no symbol matches '{}'", query.trim()));
                return ChartResponse {
                    symbol: util::normalize_symbol(query),
                    display_name: None,
                    interval: request.span.interval(),
                    series: Outcome::NoData(NoDataReason::NotFound),
                    warnings,
                };
            }
        };

        let mut resolved = request.clone();
        resolved.symbol = best.symbol.clone();
        let mut response = self.chart(&resolved).await;
        if response.display_name.is_none() {
            response.display_name = Some(best.display_name.clone());
        }
        warnings.append(&mut response.warnings);
        response.warnings = warnings;
        response
    }

    /// Drops the cached series of one request so the next call refetches.
    pub async fn invalidate(&self, request: &ChartRequest) -> bool {
        let key = SeriesKey {
            symbol: util::normalize_symbol(&request.symbol),
            span: request.span,
            interval: request.span.interval(),
        };
        self.cache.invalidate(&key).await
    }

    async fn load_series(&self, symbol: &str, span: RequestSpan) -> Outcome<Arc<PriceSeries>> {
        let outcome = self
            .fetcher
            .fetch(symbol, span)
            .await
            .and_then(|frame| self.cleaner.clean(&frame))
            .map(Arc::new);

        match &outcome {
            Outcome::Data(series) => info!("{}: {} bars ready for {}", symbol, series.len(), span),
            Outcome::NoData(reason) => info!("{}: no chart data for {}: {}", symbol, span, reason),
            Outcome::Failed(diagnostic) => warn!("{}: fetch failed for {}: {}", symbol, span, diagnostic),
        }
        outcome
    }

    // 故障结果不缓存，无数据结果只缓存很短时间
    fn ttl_for(&self, outcome: &Outcome<Arc<PriceSeries>>) -> Duration {
        match outcome {
            Outcome::Data(_) => self.config.cache_ttl,
            Outcome::NoData(_) => self.config.empty_result_ttl,
            Outcome::Failed(_) => Duration::ZERO,
        }
    }
}

/// Warnings for indicators whose window is longer than the series.
fn window_warnings(series: &PriceSeries, indicators: &[IndicatorKind]) -> Vec<String> {
    indicators
        .iter()
        .filter_map(|indicator| {
            let window = match indicator {
                IndicatorKind::Sma(window) | IndicatorKind::Wma(window) => *window,
                IndicatorKind::Bollinger { window, .. } => *window,
            };
            (window > series.len()).then(|| {
                format!(
                    "{} needs {} data points but only {} are available",
                    indicator,
                    window,
                    series.len()
                )
            })
        })
        .collect()
}
