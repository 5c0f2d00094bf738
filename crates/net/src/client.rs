//! HTTP client with connection pooling

use lspkg_errors::{Error, NetworkError};
use reqwest::{Client, Response};
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: format!("lspkg/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&lspkg_config::NetworkConfig> for NetConfig {
    fn from(config: &lspkg_config::NetworkConfig) -> Self {
        Self {
            timeout: config.timeout(),
            connect_timeout: config.connect_timeout(),
            ..Self::default()
        }
    }
}

/// HTTP client wrapper. Redirects are followed; retries are the caller's
/// decision (see [`crate::with_retry`]).
#[derive(Debug, Clone)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ConnectionRefused(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(NetConfig::default())
    }

    /// Execute a single GET request
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, connection failure or any other transport
    /// error. HTTP error statuses are returned as responses.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        self.get_with_timeout(url, self.config.timeout).await
    }

    /// Execute a single GET request bounded by `timeout` end to end
    ///
    /// # Errors
    ///
    /// Same as [`NetClient::get`].
    pub async fn get_with_timeout(&self, url: &str, timeout: Duration) -> Result<Response, Error> {
        self.client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, &e))
    }

    /// The configuration this client was built with
    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }
}

/// Classify a transport error the way the rest of lspkg expects
pub(crate) fn map_reqwest_error(url: &str, error: &reqwest::Error) -> Error {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
        .into()
    } else if error.is_connect() {
        NetworkError::ConnectionRefused(error.to_string()).into()
    } else {
        NetworkError::DownloadFailed(error.to_string()).into()
    }
}
