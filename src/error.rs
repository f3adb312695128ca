//! Custom error types for scholar-record.
//!
//! Only run-level failures live here. A detail page that cannot be turned into
//! a record is not an error; see [`crate::detail::SkipReason`].

use thiserror::Error;

/// Main error type for scholar-record operations.
#[derive(Debug, Error)]
pub enum ScholarError {
    /// Upstream answered with a non-success status
    #[error("Failed to fetch publications: {status} {reason}")]
    Fetch {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status
        reason: String,
    },

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML or payload parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by upstream
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API reported an error in its response body
    #[error("API error: {0}")]
    Api(String),

    /// CAPTCHA interstitial instead of data
    #[error("CAPTCHA detected, please refresh cookies")]
    Captcha,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl ScholarError {
    /// Build a `Fetch` error from a response status.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        ScholarError::Fetch {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ScholarError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ScholarError::RateLimited(_) => true,
            ScholarError::Fetch { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using `ScholarError`
pub type Result<T> = std::result::Result<T, ScholarError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ScholarError::Parse(msg.to_string()))
    }
}
