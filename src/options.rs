//! Transport configuration for the backend connection.

use std::collections::HashMap;
use std::time::Duration;

/// Default base URL of the backend (the server binds port 8000 locally).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Transport options for talking to the chat backend.
///
/// # Example
/// ```rust
/// use sohbet::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::new("http://127.0.0.1:8000")
///     .with_timeout(Duration::from_secs(30))
///     .with_idle_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Base URL for all backend endpoints.
    pub base_url: String,

    /// Whole-request timeout. Applies only to the non-streaming requests;
    /// a long-lived stream must not be killed by a total-request bound.
    pub timeout: Option<Duration>,

    /// Maximum gap between consecutive stream chunks before the session
    /// ends as interrupted. `None` waits indefinitely.
    pub idle_timeout: Option<Duration>,

    /// HTTP proxy URL.
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests.
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl TransportOptions {
    /// Create new transport options for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            idle_timeout: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Set the whole-request timeout for non-streaming requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the per-chunk idle timeout for streaming sessions.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}
