//! Run configuration.
//!
//! A [`Config`] is built once at startup, either from CLI flags or from
//! Actions-style inputs, and passed by reference to everything that needs it.

use crate::error::{Result, ScholarError};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Default SerpApi endpoint
pub const DEFAULT_SERPAPI_URL: &str = "https://serpapi.com";

/// Rows requested per listing page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest listing window either upstream serves in one response
pub const MAX_PAGE_SIZE: usize = 100;

/// Name of the published output value when no record file is given
pub const DEFAULT_OUTPUT_NAME: &str = "record";

/// Where the publication listing comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Scrape the Scholar profile pages directly
    #[default]
    Scholar,
    /// Query the SerpApi `google_scholar_author` engine
    SerpApi,
}

impl std::str::FromStr for SourceKind {
    type Err = ScholarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scholar" | "gscholar" => Ok(SourceKind::Scholar),
            "serpapi" => Ok(SourceKind::SerpApi),
            other => Err(ScholarError::Config(format!("Invalid source: {}", other))),
        }
    }
}

/// Delays inserted before upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Sleep before each listing page request
    pub page_delay: Duration,
    /// Sleep before each detail request
    pub detail_delay: Duration,
    /// Upper bound of random extra delay added to both
    pub jitter: Duration,
}

impl Pacing {
    /// No delays at all.
    pub const fn disabled() -> Self {
        Self {
            page_delay: Duration::ZERO,
            detail_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(1000),
            detail_delay: Duration::from_millis(2000),
            jitter: Duration::ZERO,
        }
    }
}

/// Everything a harvest run needs to know.
#[derive(Debug, Clone)]
pub struct Config {
    /// Scholar profile id whose listing is harvested
    pub subject_id: String,
    /// Write the result set here; `None` publishes it as a named output
    pub record_file: Option<PathBuf>,
    /// Name of the published output value
    pub output_name: String,
    /// Rows per listing page
    pub page_size: usize,
    pub pacing: Pacing,
    /// Timeout applied to every HTTP call
    pub request_timeout: Duration,
    /// Extra attempts for transient failures (0 = no retry)
    pub max_retries: u32,
    /// Scholar base URL (mirror or test server)
    pub base_url: String,
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Cookie file sent along with Scholar requests
    pub cookie_file: Option<PathBuf>,
    /// Indent the JSON output
    pub pretty: bool,
    pub source: SourceKind,
    /// API key for [`SourceKind::SerpApi`]
    pub serpapi_key: Option<String>,
    /// SerpApi base URL
    pub serpapi_url: String,
}

impl Config {
    /// Configuration with defaults for everything but the subject.
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            record_file: None,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            pacing: Pacing::default(),
            request_timeout: Duration::from_secs(30),
            max_retries: 0,
            base_url: DEFAULT_SCHOLAR_URL.to_string(),
            proxy: None,
            cookie_file: None,
            pretty: false,
            source: SourceKind::default(),
            serpapi_key: None,
            serpapi_url: DEFAULT_SERPAPI_URL.to_string(),
        }
    }

    /// Build a configuration from Actions-style inputs.
    ///
    /// `input` returns the raw value of a named input, or `None` when unset.
    /// Empty values count as unset, so an empty `record-file` selects the
    /// named-output sink.
    pub fn from_inputs<F>(input: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| input(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let subject_id = get("google-scholar-id")
            .ok_or_else(|| ScholarError::Config("Input required and not supplied: google-scholar-id".to_string()))?;

        let mut config = Config::new(subject_id);
        config.record_file = get("record-file").map(PathBuf::from);

        if let Some(size) = get("page-size") {
            config.page_size = parse_number(&size, "page-size")?;
        }
        if let Some(ms) = get("page-delay-ms") {
            config.pacing.page_delay = Duration::from_millis(parse_number(&ms, "page-delay-ms")?);
        }
        if let Some(ms) = get("detail-delay-ms") {
            config.pacing.detail_delay = Duration::from_millis(parse_number(&ms, "detail-delay-ms")?);
        }
        if let Some(retries) = get("retries") {
            config.max_retries = parse_number(&retries, "retries")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.subject_id.is_empty() {
            return Err(ScholarError::Config("Scholar id must not be empty".to_string()));
        }
        if self.subject_id.chars().any(char::is_whitespace) {
            return Err(ScholarError::Config(format!(
                "Scholar id '{}' must not contain whitespace",
                self.subject_id
            )));
        }
        if self.page_size == 0 {
            return Err(ScholarError::Config("Page size must be positive".to_string()));
        }
        if self.source == SourceKind::Scholar && self.page_size > MAX_PAGE_SIZE {
            return Err(ScholarError::Config(format!(
                "Page size {} exceeds the Scholar listing maximum of {}",
                self.page_size, MAX_PAGE_SIZE
            )));
        }
        Url::parse(&self.base_url)
            .map_err(|e| ScholarError::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        if self.source == SourceKind::SerpApi && self.serpapi_key.as_deref().unwrap_or("").is_empty() {
            return Err(ScholarError::Config(
                "SerpApi source requires an API key (SERPAPI_KEY)".to_string(),
            ));
        }
        Ok(())
    }

    /// Scholar base URL without a trailing slash.
    pub fn scholar_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Read an Actions input the way the runner exposes it: `INPUT_<NAME>`,
/// upper-cased with spaces replaced by underscores.
pub fn action_input(name: &str) -> Option<String> {
    let key = format!("INPUT_{}", name.replace(' ', "_").to_uppercase());
    std::env::var(key).ok()
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ScholarError::Config(format!("Input '{}' is not a valid number: {}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn inputs(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("61Ou1P8AAAAJ");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.pacing.page_delay, Duration::from_secs(1));
        assert_eq!(config.pacing.detail_delay, Duration::from_secs(2));
        assert_eq!(config.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_inputs_empty_record_file_means_output_value() {
        let config = Config::from_inputs(inputs(&[
            ("google-scholar-id", "61Ou1P8AAAAJ"),
            ("record-file", ""),
        ]))
        .expect("valid inputs");
        assert_eq!(config.subject_id, "61Ou1P8AAAAJ");
        assert!(config.record_file.is_none());
    }

    #[test]
    fn test_from_inputs_overrides() {
        let config = Config::from_inputs(inputs(&[
            ("google-scholar-id", " abc "),
            ("record-file", "data/scholar.json"),
            ("page-size", "20"),
            ("page-delay-ms", "0"),
            ("detail-delay-ms", "250"),
            ("retries", "2"),
        ]))
        .expect("valid inputs");
        assert_eq!(config.subject_id, "abc");
        assert_eq!(config.record_file, Some(PathBuf::from("data/scholar.json")));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.pacing.page_delay, Duration::ZERO);
        assert_eq!(config.pacing.detail_delay, Duration::from_millis(250));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_missing_subject_rejected() {
        let err = Config::from_inputs(inputs(&[])).expect_err("subject is required");
        assert!(err.to_string().contains("google-scholar-id"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_inputs(inputs(&[("google-scholar-id", "a"), ("page-size", "ten")])).is_err());
        assert!(Config::from_inputs(inputs(&[("google-scholar-id", "a"), ("page-size", "0")])).is_err());
        assert!(Config::new("has space").validate().is_err());

        let mut config = Config::new("abc");
        config.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scholar_page_size_capped() {
        let mut config = Config::new("abc");
        config.page_size = MAX_PAGE_SIZE;
        assert!(config.validate().is_ok());

        config.page_size = 500;
        let err = config.validate().expect_err("oversized window");
        assert!(err.to_string().contains("500"));
        assert!(Config::from_inputs(inputs(&[("google-scholar-id", "a"), ("page-size", "101")])).is_err());

        config.source = SourceKind::SerpApi;
        config.serpapi_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serpapi_requires_key() {
        let mut config = Config::new("abc");
        config.source = SourceKind::SerpApi;
        assert!(config.validate().is_err());
        config.serpapi_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("serpapi".parse::<SourceKind>().ok(), Some(SourceKind::SerpApi));
        assert_eq!("Scholar".parse::<SourceKind>().ok(), Some(SourceKind::Scholar));
        assert!("bing".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_scholar_url_trims_slash() {
        let mut config = Config::new("abc");
        config.base_url = "http://127.0.0.1:1234/".to_string();
        assert_eq!(config.scholar_url(), "http://127.0.0.1:1234");
    }
}
