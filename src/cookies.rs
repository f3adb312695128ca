//! Session cookies for Scholar requests.
//!
//! Scholar is far less likely to answer with a CAPTCHA when requests carry
//! the cookies of a browser session that already passed one. Cookies are
//! exported from a browser as JSON and sent verbatim as a `Cookie` header.

use crate::error::{Result, ScholarError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COOKIE_FILE_NAME: &str = ".scholar_record_cookies.json";

/// Default cookie file path: `~/.scholar_record_cookies.json`
pub fn default_cookie_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(COOKIE_FILE_NAME))
        .ok_or_else(|| ScholarError::Config("Cannot determine home directory".to_string()))
}

/// Cookie entry in browser-export format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
}

/// Cookies stored on disk for one user
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Jar at the default location in the home directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self::at(default_cookie_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cookies; a missing or unreadable file yields an empty jar.
    pub fn load(&self) -> Vec<Cookie> {
        if !self.path.exists() {
            debug!(path = ?self.path, "Cookie file not found");
            return Vec::new();
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read cookie file");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Cookie>>(&content) {
            Ok(cookies) => {
                info!(count = cookies.len(), path = ?self.path, "Loaded cookies");
                cookies
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to parse cookies");
                Vec::new()
            }
        }
    }

    /// Replace the stored cookies.
    pub fn save(&self, cookies: &[Cookie]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(cookies)?)?;
        info!(count = cookies.len(), path = ?self.path, "Saved cookies");
        Ok(())
    }

    /// Validate an exported JSON file and store its cookies in this jar.
    pub fn import(&self, source: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(source)?;
        let cookies: Vec<Cookie> = serde_json::from_str(&content)?;
        self.save(&cookies)?;
        Ok(cookies.len())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!(path = ?self.path, "Cleared cookies");
        }
        Ok(())
    }

    /// `Cookie` header value for Google domains, `None` when there is nothing to send.
    pub fn header(&self) -> Option<String> {
        cookie_header(&self.load())
    }
}

/// Join Google-domain cookies into a `Cookie` header value.
pub fn cookie_header(cookies: &[Cookie]) -> Option<String> {
    let header = cookies
        .iter()
        .filter(|c| c.domain.contains("google"))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");
    (!header.is_empty()).then_some(header)
}
