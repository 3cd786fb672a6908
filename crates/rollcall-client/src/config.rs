//! Client configuration.
//!
//! Points the client at one rollcall API deployment and names the SQLite
//! file that holds intents created while that deployment was unreachable.

use std::path::PathBuf;

use url::Url;
use zeroize::Zeroizing;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default offline queue file, relative to the working directory.
pub const DEFAULT_QUEUE_PATH: &str = "rollcall-offline.db";

/// Configuration for connecting to the rollcall API.
///
/// Custom `Debug` implementation redacts the `api_token` field.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://attendance.example.school`.
    pub api_url: Url,
    /// Bearer token (`teacher:{secret}` or `{secret}`). `None` when the
    /// server runs with auth disabled.
    pub api_token: Option<Zeroizing<String>>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// SQLite file holding queued intents.
    pub queue_path: PathBuf,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("queue_path", &self.queue_path)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `ROLLCALL_API_URL` (required)
    /// - `ROLLCALL_API_TOKEN` (optional)
    /// - `ROLLCALL_TIMEOUT_SECS` (default: 10)
    /// - `ROLLCALL_QUEUE_PATH` (default: `rollcall-offline.db`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("ROLLCALL_API_URL").ok_or(ConfigError::MissingUrl)?;
        let timeout_secs = match lookup("ROLLCALL_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            api_url: parse_base_url(&raw_url)?,
            api_token: lookup("ROLLCALL_API_TOKEN")
                .filter(|t| !t.is_empty())
                .map(Zeroizing::new),
            timeout_secs,
            queue_path: lookup("ROLLCALL_QUEUE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_QUEUE_PATH)),
        })
    }

    /// Configuration for a local test server, with a queue file at `queue_path`.
    pub fn local(api_url: &str, queue_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_base_url(api_url)?,
            api_token: None,
            timeout_secs: 5,
            queue_path: queue_path.into(),
        })
    }
}

/// Parse a base URL, ensuring a trailing slash so relative joins keep any
/// path prefix.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e.to_string()))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ROLLCALL_API_URL environment variable is required")]
    MissingUrl,
    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid ROLLCALL_TIMEOUT_SECS: {0}")]
    InvalidTimeout(String),
    #[error("bearer token contains characters not allowed in a header")]
    InvalidToken,
}
