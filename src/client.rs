//! HTTP transport for Scholar requests.
//!
//! Every request carries browser-like headers, the optional session cookie
//! header, and a bounded timeout. Transient failures are retried with
//! exponential backoff up to `max_retries` extra attempts.

use crate::config::Config;
use crate::cookies::{default_cookie_path, CookieJar};
use crate::error::{Result, ScholarError};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";

/// First retry delay; doubles on each further attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Ceiling for the doubling backoff
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Wait used for 429 responses without a usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Scholar HTTP client
pub struct ScholarClient {
    http: reqwest::Client,
    base_url: String,
    cookie_header: Option<String>,
    max_retries: u32,
}

impl ScholarClient {
    /// Build a client from the run configuration.
    ///
    /// Cookies come from `config.cookie_file` or, failing that, the default
    /// cookie file if one exists.
    pub fn new(config: &Config) -> Result<Self> {
        let http = build_http_client(config.proxy.as_deref(), config.request_timeout)?;

        let jar = match &config.cookie_file {
            Some(path) => Some(CookieJar::at(path)),
            None => default_cookie_path().ok().filter(|p| p.exists()).map(CookieJar::at),
        };
        let cookie_header = jar.and_then(|j| j.header());
        if cookie_header.is_some() {
            info!("Sending stored session cookies with Scholar requests");
        }

        Ok(Self {
            http,
            base_url: config.scholar_url().to_string(),
            cookie_header,
            max_retries: config.max_retries,
        })
    }

    /// Scholar base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of `path` on the Scholar host.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ScholarError::Config(format!("Invalid base URL: {}", e)))
    }

    /// POST a form body and return the response text.
    pub async fn post_form(&self, url: &Url, body: &'static str) -> Result<String> {
        self.execute(Method::POST, url, Some(body)).await
    }

    /// GET a document and return the response text.
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        self.execute(Method::GET, url, None).await
    }

    async fn execute(&self, method: Method, url: &Url, body: Option<&'static str>) -> Result<String> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            match self.execute_once(method.clone(), url, body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = match &e {
                        ScholarError::RateLimited(secs) => Duration::from_secs(*secs).max(backoff),
                        _ => backoff,
                    };
                    warn!(
                        url = %url,
                        attempt = attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    backoff = next_backoff(backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_once(&self, method: Method, url: &Url, body: Option<&'static str>) -> Result<String> {
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self
            .http
            .request(method, url.as_str())
            .header("Accept", ACCEPT)
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache");

        if let Some(cookie) = &self.cookie_header {
            request = request.header("Cookie", cookie);
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ScholarError::RateLimited(retry_after));
        }
        if !status.is_success() {
            return Err(ScholarError::from_status(status));
        }

        let text = response.text().await?;
        if is_captcha(&text) {
            return Err(ScholarError::Captcha);
        }
        Ok(text)
    }
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>, timeout: Duration) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            ScholarError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ScholarError::Config(format!("Failed to build HTTP client: {}", e)))
}

fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_BACKOFF)
}

/// Scholar serves this interstitial instead of data once it suspects a bot.
fn is_captcha(body: &str) -> bool {
    body.contains("Solving the above CAPTCHA") || body.contains("unusual traffic from your computer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_captcha() {
        assert!(is_captcha("<p>Our systems have detected unusual traffic from your computer network.</p>"));
        assert!(!is_captcha(r#"{"B":"<tr></tr>"}"#));
    }

    #[test]
    fn test_backoff_doubles_up_to_ceiling() {
        assert_eq!(next_backoff(INITIAL_BACKOFF), Duration::from_secs(1));
        assert_eq!(next_backoff(Duration::from_secs(16)), MAX_BACKOFF);

        let mut backoff = INITIAL_BACKOFF;
        for _ in 0..20 {
            backoff = next_backoff(backoff);
        }
        assert_eq!(backoff, MAX_BACKOFF);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let mut config = Config::new("abc");
        config.base_url = "http://127.0.0.1:9/".to_string();
        config.cookie_file = Some("/nonexistent/cookies.json".into());
        let client = ScholarClient::new(&config).expect("client");
        let url = client.endpoint("/citations").expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9/citations");
    }
}
