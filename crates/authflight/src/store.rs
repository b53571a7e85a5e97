//! Credential storage.
//!
//! The store is the single shared mutable resource of the pipeline. Only the
//! renewal success path writes to it; interceptors and the coordinator only
//! read.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Trait for the credential store consumed by the coordinator.
#[async_trait]
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Get the current credential, if any.
    async fn get(&self) -> Option<String>;

    /// Replace the current credential.
    async fn set(&self, credential: String);

    /// Remove the current credential.
    async fn clear(&self);
}

/// Shared store handle for use across async contexts.
pub type SharedCredentialStore = Arc<dyn CredentialStore>;

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credential: RwLock<Option<String>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a credential.
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: RwLock::new(Some(credential.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self) -> Option<String> {
        self.credential.read().await.clone()
    }

    async fn set(&self, credential: String) {
        let mut guard = self.credential.write().await;
        *guard = Some(credential);
    }

    async fn clear(&self) {
        let mut guard = self.credential.write().await;
        *guard = None;
    }
}
