//! Single-flight bearer credential coordinator for HTTP clients.
//!
//! Sits in front of an HTTP transport and guarantees that every outgoing
//! request carries a valid bearer credential, that credential renewal runs at
//! most once at a time under concurrent load, and that requests arriving or
//! failing during a renewal are queued and replayed against the refreshed
//! credential instead of failing outright.
//!
//! # Components
//!
//! - [`inspector`] — credential validity inspection (JWT `exp` claim)
//! - [`store`] — credential storage trait + in-memory implementation
//! - [`renew`] — renewal executor: bounded retries with exponential backoff
//! - [`coordinator`] — single-flight guard with a FIFO waiter queue
//! - [`transport`] — immutable request/response values and the wire trait
//! - [`client`] — interceptor pipeline exposed as [`AuthClient::dispatch`]
//!
//! # Example
//!
//! ```no_run
//! use authflight::{ApiRequest, AuthClient};
//!
//! # async fn example() -> authflight::Result<()> {
//! let client = AuthClient::builder()
//!     .base_url("https://api.example.com")
//!     .credential("initial-jwt")
//!     .on_invalidated(std::sync::Arc::new(|| {
//!         eprintln!("session invalidated, please log in again");
//!     }))
//!     .build()?;
//!
//! // Concurrent dispatches share a single renewal when the credential
//! // expires; a 401 triggers renewal plus exactly one retry.
//! let profile: serde_json::Value = client.get("profile").await?;
//! let _ = client.dispatch(ApiRequest::get("things")).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod inspector;
pub mod renew;
pub mod store;
pub mod transport;

pub use client::{AuthClient, AuthClientBuilder};
pub use config::AuthConfig;
pub use coordinator::{InvalidationHook, RefreshCoordinator};
pub use error::{Error, Result};
pub use inspector::{CredentialInspector, JwtInspector, SharedInspector};
pub use renew::{HttpRenewer, RenewalExecutor, SharedRenewalExecutor};
pub use store::{CredentialStore, InMemoryCredentialStore, SharedCredentialStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, SharedTransport, Transport};
