//! Configuration Module
//!
//! Handles loading gateway and proxy configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Gateway configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST backend
    pub backend_url: String,
    /// TTL in seconds applied to every cached read
    pub cache_ttl: u64,
    /// HTTP port of the caching proxy
    pub server_port: u16,
    /// Transport timeout per backend request in seconds
    pub request_timeout: u64,
    /// Retries on rate-limit / server-busy responses
    pub max_retries: u32,
    /// Initial retry backoff in milliseconds
    pub retry_delay_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `BACKEND_URL` - REST backend base URL (default: http://localhost:8080/api)
    /// - `CACHE_TTL` - Cache TTL in seconds (default: 300)
    /// - `SERVER_PORT` - Proxy HTTP port (default: 3000)
    /// - `REQUEST_TIMEOUT` - Backend request timeout in seconds (default: 30)
    /// - `MAX_RETRIES` - Retries on 429/503 (default: 3)
    /// - `RETRY_DELAY_MS` - Initial retry backoff (default: 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            cache_ttl: parse_var("CACHE_TTL").unwrap_or(defaults.cache_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            request_timeout: parse_var("REQUEST_TIMEOUT").unwrap_or(defaults.request_timeout),
            max_retries: parse_var("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay_ms: parse_var("RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
        }
    }

    /// Cache TTL as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8080/api".to_string(),
            cache_ttl: 300,
            server_port: 3000,
            request_timeout: 30,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
