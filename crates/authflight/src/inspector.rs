//! Credential validity inspection.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;

/// Trait for deciding whether a credential is still usable.
///
/// Malformed input must be reported as expired so the pipeline falls through
/// to renewal instead of sending a credential the server will reject.
pub trait CredentialInspector: Send + Sync + std::fmt::Debug {
    /// Whether the credential is expired or unusable.
    fn is_expired(&self, credential: &str) -> bool;
}

/// Shared inspector handle.
pub type SharedInspector = Arc<dyn CredentialInspector>;

/// Claims we care about when inspecting a JWT.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Inspector for compact JWT credentials.
///
/// Decodes the payload segment and compares the `exp` claim against the
/// current time. A token that fails to decode, carries no `exp`, or expires
/// within the configured leeway window counts as expired.
#[derive(Debug, Clone, Default)]
pub struct JwtInspector {
    leeway: Duration,
}

impl JwtInspector {
    /// Create an inspector with no leeway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inspector that treats tokens expiring within `leeway` as
    /// already expired.
    pub fn with_leeway(leeway: Duration) -> Self {
        Self { leeway }
    }

    /// Extract the `exp` claim (seconds since the epoch), if the token
    /// decodes as a JWT.
    pub fn expiry(&self, credential: &str) -> Option<i64> {
        let payload = credential.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;
        claims.exp
    }
}

impl CredentialInspector for JwtInspector {
    fn is_expired(&self, credential: &str) -> bool {
        let Some(exp) = self.expiry(credential) else {
            tracing::debug!("credential did not decode as a JWT, treating as expired");
            return true;
        };

        let now = chrono::Utc::now().timestamp();
        exp <= now + self.leeway.as_secs() as i64
    }
}
