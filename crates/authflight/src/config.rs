//! Static configuration for the coordinator and renewal executor.

use std::time::Duration;

/// Configuration for credential renewal and expiry inspection.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the API, with a trailing slash.
    pub base_url: String,
    /// Path of the renewal endpoint, relative to `base_url`.
    pub refresh_path: String,
    /// Maximum number of renewal attempts per round.
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Treat credentials expiring within this window as already expired.
    pub expiry_leeway: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8000/".to_string(),
            refresh_path: "token/refresh/".to_string(),
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
            expiry_leeway: Duration::ZERO,
        }
    }
}
