//! Error types for the credential coordinator.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the coordinator, the renewal executor, and the client.
///
/// The type is `Clone` so a single renewal outcome can be fanned out to every
/// waiter of a round; payloads are therefore strings rather than source
/// errors.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Every renewal attempt in a round failed.
    #[error("credential renewal exhausted after {attempts} attempts: {last}")]
    RenewalExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The last underlying failure.
        last: String,
    },

    /// The renewal endpoint answered but rejected the attempt (4xx).
    #[error("credential renewal rejected: {0}")]
    RenewalRejected(String),

    /// The upstream rejected a request again after a successful renewal
    /// and a single retry.
    #[error("upstream rejected credential after retry: {0}")]
    UpstreamAuthFailure(String),

    /// Network/HTTP transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The caller that owned a renewal round was dropped before the round
    /// settled; waiters of that round receive this instead of hanging.
    #[error("renewal interrupted: {0}")]
    Interrupted(String),

    /// Server returned a non-success response outside the auth path.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code from the server, when one was provided.
        code: String,
        /// Error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(String),
}

impl Error {
    /// Check whether this error came from the renewal path (as opposed to a
    /// plain transport or API failure), so callers can distinguish
    /// "credential problem" from "network problem".
    pub fn is_renewal_failure(&self) -> bool {
        matches!(
            self,
            Error::RenewalExhausted { .. } | Error::RenewalRejected(_) | Error::Interrupted(_)
        )
    }

    /// Check whether this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::UpstreamAuthFailure(_)) || matches!(self, Error::Api { status: 401, .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renewal_failures_are_distinguishable() {
        let exhausted = Error::RenewalExhausted {
            attempts: 3,
            last: "connection refused".to_string(),
        };
        assert!(exhausted.is_renewal_failure());
        assert!(Error::RenewalRejected("invalid refresh token".into()).is_renewal_failure());
        assert!(!Error::Network("timeout".into()).is_renewal_failure());
    }

    #[test]
    fn test_auth_error_detection() {
        assert!(Error::UpstreamAuthFailure("401".into()).is_auth_error());
        assert!(
            Error::Api {
                status: 401,
                code: "unauthorized".into(),
                message: "bad token".into(),
            }
            .is_auth_error()
        );
        assert!(
            !Error::Api {
                status: 500,
                code: "internal".into(),
                message: "oops".into(),
            }
            .is_auth_error()
        );
    }
}
