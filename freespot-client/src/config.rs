//! Client configuration

use shared::FloorId;

use crate::{ClientError, ClientResult};

/// Backend URL used when nothing is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration for connecting to the FreeSpot backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Normalized base URL (e.g., "http://localhost:8000"), no trailing slash
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl ClientConfig {
    /// Create a configuration for `base_url`
    ///
    /// The URL is trimmed, trailing slashes are removed and `https://` is
    /// prefixed when no scheme is given.
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read `FREESPOT_API_URL` and `FREESPOT_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> ClientResult<Self> {
        let base_url =
            std::env::var("FREESPOT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        if base_url.trim().is_empty() {
            return Err(ClientError::Config("FREESPOT_API_URL is empty".into()));
        }

        let mut config = Self::new(base_url);
        if let Ok(raw) = std::env::var("FREESPOT_REQUEST_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                ClientError::Config(format!("FREESPOT_REQUEST_TIMEOUT_SECS is not a number: {raw}"))
            })?;
            config = config.with_timeout(secs);
        }
        Ok(config)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Full URL of a REST path (`path` starts with `/`)
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// WebSocket base derived from the HTTP base (`http`→`ws`, `https`→`wss`)
    pub fn ws_url(&self) -> String {
        self.base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    }

    /// Detection stream endpoint of one floor
    pub fn detection_ws_url(&self, floor_id: FloorId) -> String {
        format!("{}/ws/detection/{}", self.ws_url(), floor_id)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Trim, drop trailing slashes, default to `https://` when schemeless
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
