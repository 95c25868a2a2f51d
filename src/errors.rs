use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartDataError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    #[error("Excel parsing error: {0}")]
    ExcelError(#[from] calamine::Error),

    #[error("Provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl ChartDataError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        ChartDataError::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChartDataError>;

// 用于从字符串创建错误
impl From<String> for ChartDataError {
    fn from(s: String) -> Self {
        ChartDataError::DataError(s)
    }
}

impl From<&str> for ChartDataError {
    fn from(s: &str) -> Self {
        ChartDataError::DataError(s.to_string())
    }
}
