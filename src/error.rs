//! Error taxonomy shared by every stage of the planner.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScenicError>;

#[derive(Debug, Error)]
pub enum ScenicError {
    /// Connection, timeout or server-side failure worth retrying.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Upstream asked us to slow down (HTTP 429).
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// Malformed or empty response for a single item.
    #[error("data error: {0}")]
    Data(String),

    /// Invalid parameters; fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl ScenicError {
    pub fn config(message: impl Into<String>) -> Self {
        ScenicError::Config(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        ScenicError::Data(message.into())
    }

    /// Only network-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScenicError::TransientNetwork(_) | ScenicError::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for ScenicError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                return ScenicError::RateLimited { retry_after: None };
            }
            if status.is_server_error() {
                return ScenicError::TransientNetwork(err.to_string());
            }
            return ScenicError::Data(err.to_string());
        }

        if err.is_decode() {
            return ScenicError::Data(err.to_string());
        }

        ScenicError::TransientNetwork(err.to_string())
    }
}
