//! Authenticated client: the interceptor pipeline around the transport.
//!
//! `dispatch` behaves like the transport's `send`, plus credential
//! attachment, suspension while a renewal is in flight, and a single retry
//! after an auth rejection.

use std::sync::Arc;

use crate::config::AuthConfig;
use crate::coordinator::{InvalidationHook, RefreshCoordinator};
use crate::error::{Error, Result};
use crate::inspector::{JwtInspector, SharedInspector};
use crate::renew::{HttpRenewer, SharedRenewalExecutor};
use crate::store::{InMemoryCredentialStore, SharedCredentialStore};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, SharedTransport};

/// Authenticated HTTP client.
///
/// # Example
///
/// ```no_run
/// use authflight::{ApiRequest, AuthClient};
///
/// # async fn example() -> authflight::Result<()> {
/// let client = AuthClient::builder()
///     .base_url("https://api.example.com")
///     .credential("initial-jwt")
///     .build()?;
///
/// let response = client.dispatch(ApiRequest::get("profile")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: SharedTransport,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthClient {
    /// Create a new client builder.
    pub fn builder() -> AuthClientBuilder {
        AuthClientBuilder::new()
    }

    /// The coordinator backing this client.
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    /// Send a request through the interceptor pipeline.
    ///
    /// Request interceptor: obtain a valid credential (suspending on an
    /// in-flight renewal if needed) and attach it; a renewal failure fails
    /// the request before it reaches the transport. Response interceptor: on
    /// an auth rejection, force one renewal and resend the request derived
    /// from the original exactly once; a second rejection is terminal.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
        let credential = self.inner.coordinator.ensure_fresh().await?;
        let response = self
            .inner
            .transport
            .send(request.with_bearer(&credential)?)
            .await?;

        if !response.is_auth_rejection() {
            return Ok(response);
        }

        tracing::debug!(path = %request.path, "credential rejected upstream, renewing and retrying once");
        let credential = self.inner.coordinator.refresh().await?;
        let response = self
            .inner
            .transport
            .send(request.with_bearer(&credential)?)
            .await?;

        if response.is_auth_rejection() {
            return Err(Error::UpstreamAuthFailure(response.text()));
        }
        Ok(response)
    }

    /// Dispatch a GET request and deserialize a 2xx JSON body.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.dispatch(ApiRequest::get(path)).await?;
        Self::handle_response(response)
    }

    /// Dispatch a POST request with a JSON body and deserialize a 2xx JSON
    /// response.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let response = self.dispatch(ApiRequest::post(path).json(body)?).await?;
        Self::handle_response(response)
    }

    fn handle_response<T: serde::de::DeserializeOwned>(response: ApiResponse) -> Result<T> {
        if response.is_success() {
            response.json()
        } else {
            Err(Self::extract_error(&response))
        }
    }

    fn extract_error(response: &ApiResponse) -> Error {
        let status = response.status.as_u16();

        match response.json::<ErrorResponse>() {
            Ok(err) => Error::Api {
                status,
                code: err.code,
                message: err.message,
            },
            Err(_) => Error::Api {
                status,
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
            },
        }
    }
}

/// Error response from the server.
#[derive(Debug, serde::Deserialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

/// Builder for creating an [`AuthClient`].
#[derive(Default)]
pub struct AuthClientBuilder {
    config: AuthConfig,
    credential: Option<String>,
    store: Option<SharedCredentialStore>,
    inspector: Option<SharedInspector>,
    transport: Option<SharedTransport>,
    executor: Option<SharedRenewalExecutor>,
    on_invalidated: Option<InvalidationHook>,
}

impl AuthClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: AuthConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base URL for the API and the renewal endpoint.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Seed the credential store with an initial credential.
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Use a custom credential store.
    pub fn store(mut self, store: SharedCredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom credential inspector.
    pub fn inspector(mut self, inspector: SharedInspector) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Use a custom transport.
    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom renewal executor.
    pub fn executor(mut self, executor: SharedRenewalExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Register a session-invalidation hook, fired once per failed renewal
    /// round.
    pub fn on_invalidated(mut self, hook: InvalidationHook) -> Self {
        self.on_invalidated = Some(hook);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AuthClient> {
        let store: SharedCredentialStore = match (self.store, self.credential) {
            (Some(store), None) => store,
            (None, Some(credential)) => {
                Arc::new(InMemoryCredentialStore::with_credential(credential))
            }
            (None, None) => Arc::new(InMemoryCredentialStore::new()),
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "credential() and store() are mutually exclusive; seed the store instead"
                        .to_string(),
                ));
            }
        };

        let inspector: SharedInspector = self
            .inspector
            .unwrap_or_else(|| Arc::new(JwtInspector::with_leeway(self.config.expiry_leeway)));

        let transport: SharedTransport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config.base_url)?),
        };

        let executor: SharedRenewalExecutor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(HttpRenewer::new(&self.config, store.clone())?),
        };

        let mut coordinator = RefreshCoordinator::new(executor, store, inspector);
        if let Some(hook) = self.on_invalidated {
            coordinator = coordinator.with_invalidation_hook(hook);
        }

        Ok(AuthClient {
            inner: Arc::new(ClientInner {
                transport,
                coordinator: Arc::new(coordinator),
            }),
        })
    }
}
