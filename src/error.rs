//! Errors raised by market-data providers.
//!
//! These never leave the market-data facade: it logs them and reports "no data".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} responded with status {1}")]
    Status(&'static str, u16),

    #[error("rate limited by {0}")]
    RateLimited(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("{0} does not support this request")]
    Unsupported(&'static str),

    #[error("API key for {0} is missing")]
    MissingKey(&'static str),
}

impl ProviderError {
    pub fn is_parse(&self) -> bool {
        matches!(self, ProviderError::Json(_) | ProviderError::Parse(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
