//! Renewal executor: performs the credential renewal call with bounded
//! retries and exponential backoff.
//!
//! This component is sequential by construction; single-flight across
//! concurrent callers is the [`coordinator`](crate::coordinator)'s job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::store::SharedCredentialStore;

/// Trait for the renewal call, so the coordinator can be exercised without a
/// network.
#[async_trait]
pub trait RenewalExecutor: Send + Sync + std::fmt::Debug {
    /// Obtain a fresh credential, or fail terminally.
    async fn renew(&self) -> Result<String>;
}

/// Shared executor handle.
pub type SharedRenewalExecutor = Arc<dyn RenewalExecutor>;

/// Response body of the renewal endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Outcome of a single attempt, before retry policy is applied.
enum AttemptError {
    /// Endpoint answered with a client error; the round is over.
    Rejected(String),
    /// Network failure or server error; worth retrying.
    Transient(String),
}

/// Backoff delay before retrying after failed attempt `attempt` (1-based):
/// `base * 2^attempt`, so 200ms, 400ms, ... for the default 100ms base.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

/// HTTP renewal executor.
///
/// Posts to the configured refresh endpoint and expects a JSON body with an
/// `access` field carrying the new credential. On success the credential is
/// written to the store before returning, so callers that re-read the store
/// observe it without going through the coordinator's fan-out.
#[derive(Debug)]
pub struct HttpRenewer {
    http: reqwest::Client,
    refresh_url: Url,
    max_retries: u32,
    backoff_base: Duration,
    store: SharedCredentialStore,
}

impl HttpRenewer {
    /// Create a renewer from configuration.
    pub fn new(config: &AuthConfig, store: SharedCredentialStore) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        let refresh_url = base.join(config.refresh_path.trim_start_matches('/'))?;

        Ok(Self {
            http: reqwest::Client::new(),
            refresh_url,
            max_retries: config.max_retries.max(1),
            backoff_base: config.backoff_base,
            store,
        })
    }

    async fn attempt(&self) -> std::result::Result<String, AttemptError> {
        let response = self
            .http
            .post(self.refresh_url.clone())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| AttemptError::Transient(format!("renewal request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body: RefreshResponse = response.json().await.map_err(|e| {
                AttemptError::Transient(format!("failed to parse renewal response: {e}"))
            })?;
            return Ok(body.access);
        }

        let text = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(AttemptError::Rejected(format!("{status}: {text}")))
        } else {
            Err(AttemptError::Transient(format!("{status}: {text}")))
        }
    }
}

#[async_trait]
impl RenewalExecutor for HttpRenewer {
    async fn renew(&self) -> Result<String> {
        let mut attempt = 0u32;

        loop {
            match self.attempt().await {
                Ok(credential) => {
                    self.store.set(credential.clone()).await;
                    tracing::info!("credential renewed");
                    return Ok(credential);
                }
                Err(AttemptError::Rejected(message)) => {
                    tracing::error!(%message, "renewal rejected by endpoint");
                    return Err(Error::RenewalRejected(message));
                }
                Err(AttemptError::Transient(message)) => {
                    attempt += 1;
                    tracing::warn!(attempt, %message, "credential renewal attempt failed");

                    if attempt >= self.max_retries {
                        tracing::error!(
                            attempts = attempt,
                            "credential renewal exhausted all retries"
                        );
                        return Err(Error::RenewalExhausted {
                            attempts: attempt,
                            last: message,
                        });
                    }

                    tokio::time::sleep(backoff_delay(self.backoff_base, attempt)).await;
                }
            }
        }
    }
}
