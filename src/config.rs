//! Configuration for the notes API server.
//!
//! All configuration is loaded from environment variables.
//! No secrets are logged.

use std::str::FromStr;
use std::time::Duration;

/// Path prefix shared by every API route
pub const API_PREFIX: &str = "/api/v1";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind host
    pub host: String,

    /// Server port (0 picks an ephemeral port)
    pub port: u16,

    // === Rate Limiting ===
    /// Requests allowed per caller within one window (0 disables limiting)
    pub rate_limit_requests: u32,

    /// Length of a rate limit window (default: 60 seconds)
    pub rate_limit_window: Duration,

    /// Key callers by the first `X-Forwarded-For` hop instead of the peer address
    pub rate_limit_trust_proxy: bool,

    /// Interval between purges of expired rate limit windows
    pub rate_limit_cleanup_interval: Duration,

    // === HTTP ===
    /// Allowed CORS origins, `*` allows any
    pub cors_allowed_origins: Vec<String>,

    /// Maximum time a single request may take (default: 10 seconds)
    pub request_timeout: Duration,

    /// Maximum time to receive a request's headers (default: 5 seconds)
    pub header_read_timeout: Duration,

    /// Drain deadline once shutdown starts (default: 30 seconds)
    pub shutdown_timeout: Duration,

    /// Directory holding the swagger UI assets
    pub swagger_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HTTP_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("HTTP_SERVER_PORT", 8080),

            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", 100),
            rate_limit_window: Duration::from_secs(env_or("RATE_LIMIT_WINDOW_SECS", 60)),
            rate_limit_trust_proxy: std::env::var("RATE_LIMIT_TRUST_PROXY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            rate_limit_cleanup_interval: Duration::from_secs(env_or(
                "RATE_LIMIT_CLEANUP_INTERVAL_SECS",
                30,
            )),

            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_else(|_| vec!["*".to_string()]),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", 10)),
            header_read_timeout: Duration::from_secs(env_or("HEADER_READ_TIMEOUT_SECS", 5)),
            shutdown_timeout: Duration::from_secs(env_or("SHUTDOWN_TIMEOUT_SECS", 30)),
            swagger_dir: std::env::var("SWAGGER_DIR")
                .unwrap_or_else(|_| "./third_party/swagger-ui".to_string()),
        }
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if any origin is allowed
    pub fn cors_allows_any(&self) -> bool {
        self.cors_allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Read and parse an environment variable, falling back to `default`
/// when it is unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
