use crate::errors::{ChartDataError, Result};
use crate::indicators::WindowPolicy;
use std::env;
use std::time::Duration;

pub const FINNHUB_KEY_ENV: &str = "FINNHUB_API_KEY";
pub const CACHE_TTL_ENV: &str = "CHARTDATA_CACHE_TTL_SECS";

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_ttl: Duration,
    pub empty_result_ttl: Duration, // 无数据结果只短暂缓存，方便尽快重试
    pub min_rows: usize,
    pub window_policy: WindowPolicy,
    pub preferred_exchanges: Vec<String>,
    pub finnhub_api_key: Option<String>,
    pub request_timeout: Duration,
    pub yahoo_base_url: String,
    pub finnhub_base_url: String,
    pub finnhub_min_interval: Duration,
    pub tail_rows: usize,
    pub closures_workbook: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            cache_ttl: Duration::from_secs(900),
            empty_result_ttl: Duration::from_secs(60),
            min_rows: 30,
            window_policy: WindowPolicy::Strict,
            preferred_exchanges: vec!["US".to_string(), "AS".to_string()],
            finnhub_api_key: None,
            request_timeout: Duration::from_secs(30),
            yahoo_base_url: "https://query1.finance.yahoo.com".to_string(),
            finnhub_base_url: "https://finnhub.io/api/v1".to_string(),
            finnhub_min_interval: Duration::from_millis(1000),
            tail_rows: 20,
            closures_workbook: None,
        }
    }

    /// 从环境变量读取 Finnhub 密钥与缓存时长，其余字段保持默认值
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(key) = env::var(FINNHUB_KEY_ENV) {
            if !key.trim().is_empty() {
                config.finnhub_api_key = Some(key.trim().to_string());
            }
        }

        if let Ok(ttl) = env::var(CACHE_TTL_ENV) {
            let secs = ttl.trim().parse::<u64>().map_err(|e| {
                ChartDataError::ConfigError(format!("{} must be a number of seconds: {}", CACHE_TTL_ENV, e))
            })?;
            config.cache_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_empty_result_ttl(mut self, ttl: Duration) -> Self {
        self.empty_result_ttl = ttl;
        self
    }

    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn with_window_policy(mut self, policy: WindowPolicy) -> Self {
        self.window_policy = policy;
        self
    }

    pub fn with_preferred_exchanges(mut self, exchanges: &[&str]) -> Self {
        self.preferred_exchanges = exchanges.iter().map(|e| e.to_uppercase()).collect();
        self
    }

    pub fn with_finnhub_api_key(mut self, key: &str) -> Self {
        self.finnhub_api_key = Some(key.to_string());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_yahoo_base_url(mut self, url: &str) -> Self {
        self.yahoo_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_finnhub_base_url(mut self, url: &str) -> Self {
        self.finnhub_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_tail_rows(mut self, rows: usize) -> Self {
        self.tail_rows = rows;
        self
    }

    pub fn with_closures_workbook(mut self, path: &str) -> Self {
        self.closures_workbook = Some(path.to_string());
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.cache_ttl, Duration::from_secs(900));
        assert_eq!(config.min_rows, 30);
        assert_eq!(config.window_policy, WindowPolicy::Strict);
        assert!(config.finnhub_api_key.is_none());
    }

    #[test]
    fn test_builder_normalizes_values() {
        let config = Config::new()
            .with_preferred_exchanges(&["us", "l"])
            .with_yahoo_base_url("http://localhost:8080/");
        assert_eq!(config.preferred_exchanges, vec!["US", "L"]);
        assert_eq!(config.yahoo_base_url, "http://localhost:8080");
    }
}
