//! # Backend Configuration
//!
//! Where the rental API lives and how long to wait for it.
//! Values are loaded from environment variables (and `.env`).

use rental_core::RentalError;
use std::env;
use std::time::Duration;

/// Default base URL of the rental API
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Default HTTP timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Rental API client configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// API base URL, including the `/api/v1` prefix
    pub api_base_url: String,

    /// Bearer token of an already logged-in customer
    pub access_token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl BackendConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `RENTAL_API_BASE_URL` (default `http://localhost:8000/api/v1`)
    /// - `RENTAL_ACCESS_TOKEN`
    /// - `RENTAL_HTTP_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Result<Self, RentalError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_base_url =
            env::var("RENTAL_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(RentalError::Configuration(
                "RENTAL_API_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        let timeout_secs = match env::var("RENTAL_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                RentalError::Configuration(format!(
                    "RENTAL_HTTP_TIMEOUT_SECS must be a number of seconds, got {:?}",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let access_token = env::var("RENTAL_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            access_token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Create config with explicit values (for testing)
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Builder: start with a bearer token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL for an API path such as `/productos/3`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

/// Authorization header value for a bearer token
pub fn auth_header(token: &str) -> String {
    format!("Bearer {}", token)
}
