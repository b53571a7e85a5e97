//! Refresh coordinator: the single-flight guard around credential renewal.
//!
//! At most one renewal call is outstanding per coordinator. Callers that find
//! a round already in flight enqueue a waiter and suspend on a oneshot
//! channel; when the round settles, the outcome is fanned out to every waiter
//! in enqueue order. The coordinator is an owned, injectable object rather
//! than process-global state, so independent clients and tests do not
//! cross-contaminate.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::inspector::SharedInspector;
use crate::renew::SharedRenewalExecutor;
use crate::store::SharedCredentialStore;

/// Hook invoked once per failed renewal round, so the application layer can
/// force re-authentication.
pub type InvalidationHook = Arc<dyn Fn() + Send + Sync>;

/// A suspended caller awaiting the outcome of the in-flight round.
type Waiter = oneshot::Sender<Result<String>>;

/// Mutable single-flight state. The `in_flight` check-and-set and waiter
/// enqueue are a single critical section; the lock is never held across an
/// await point.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<Waiter>,
}

/// Single-flight coordinator for credential renewal.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    executor: SharedRenewalExecutor,
    store: SharedCredentialStore,
    inspector: SharedInspector,
    on_invalidated: Option<InvalidationHook>,
}

impl RefreshCoordinator {
    /// Create a coordinator over the given executor, store, and inspector.
    pub fn new(
        executor: SharedRenewalExecutor,
        store: SharedCredentialStore,
        inspector: SharedInspector,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            executor,
            store,
            inspector,
            on_invalidated: None,
        }
    }

    /// Register a session-invalidation hook, fired once per failed round.
    pub fn with_invalidation_hook(mut self, hook: InvalidationHook) -> Self {
        self.on_invalidated = Some(hook);
        self
    }

    /// Return the stored credential if it is still valid, otherwise run (or
    /// join) a renewal round and return its outcome.
    ///
    /// A caller with a valid credential never suspends.
    pub async fn ensure_fresh(&self) -> Result<String> {
        if let Some(credential) = self.store.get().await
            && !self.inspector.is_expired(&credential)
        {
            return Ok(credential);
        }

        self.refresh().await
    }

    /// Force a renewal round, joining the in-flight one if present.
    ///
    /// Used by the response interceptor after an auth rejection, where the
    /// stored credential is presumptively invalid regardless of what the
    /// inspector says.
    pub async fn refresh(&self) -> Result<String> {
        let waiter_rx = {
            let mut state = self.state.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter_rx {
            tracing::debug!("renewal in flight, suspending caller");
            return match rx.await {
                Ok(outcome) => outcome,
                // The sender half is never dropped unsent; treat it as an
                // interrupted round if it somehow is.
                Err(_) => Err(Error::Interrupted(
                    "renewal round settled without a result".to_string(),
                )),
            };
        }

        // This caller owns the round. The guard settles the round even if
        // our future is dropped mid-renewal, so waiters are never stranded.
        let mut guard = RoundGuard {
            coordinator: self,
            settled: false,
        };

        tracing::debug!("starting credential renewal round");
        let outcome = self.executor.renew().await;

        match &outcome {
            Ok(credential) => {
                // Store write happens-before fan-out.
                self.store.set(credential.clone()).await;
            }
            Err(error) => {
                tracing::warn!(%error, "renewal round failed, invalidating session");
                if let Some(hook) = &self.on_invalidated {
                    hook();
                }
            }
        }

        guard.settled = true;
        self.settle_round(&outcome);
        outcome
    }

    /// Drain the waiter queue and clear `in_flight` atomically, then fan the
    /// outcome out in FIFO enqueue order. A send into a dropped receiver
    /// (caller cancelled downstream) is ignored.
    fn settle_round(&self, outcome: &Result<String>) {
        let waiters = {
            let mut state = self.state.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            tracing::debug!(count = waiters.len(), "resolving queued callers");
        }
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Settles the round from `Drop` if the owning caller was cancelled before
/// the renewal completed.
struct RoundGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle_round(&Err(Error::Interrupted(
                "renewal round owner was cancelled".to_string(),
            )));
        }
    }
}
