//! Session store — single source of truth for who, if anyone, is signed in.
//!
//! DESIGN
//! ======
//! A store owns exactly one provider subscription. `initialize` spawns the
//! subscription task; that task is the only writer of the `watch` channel
//! holding the current [`Session`]. `sign_in` / `sign_up` / `sign_out`
//! delegate to the provider and return its verdict, but never write the
//! session themselves: the provider's own notification is the one write
//! path, so an explicit local write can never race the subscription.
//!
//! Readers (access gates, handlers) take a [`SessionWatch`] and react to
//! changes. Dropping the store aborts the task, which drops the feed and
//! unsubscribes from the provider.
//!
//! FAILURE
//! =======
//! A feed that errors, closes, or stays silent past `init_timeout` moves the
//! store to `Failed`. That state is terminal; callers discard the store and
//! build a new one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::identity::{Credentials, Identity, IdentityProvider, Notification, ProviderError, SessionFeed};

// =============================================================================
// SESSION
// =============================================================================

/// Why a store stopped tracking the provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFailure {
    #[error("identity provider reported no session state within {0:?}")]
    InitTimeout(Duration),
    #[error("session stream failed: {0}")]
    Stream(String),
    #[error("session stream closed by the identity provider")]
    Closed,
}

/// Authentication state of one store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// No provider notification yet; ground truth unknown.
    Initializing,
    SignedOut,
    SignedIn(Identity),
    Failed(SessionFailure),
}

impl Session {
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        matches!(self, Self::Initializing)
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity().is_some()
    }
}

/// Read-only view of a store's session.
pub type SessionWatch = watch::Receiver<Session>;

// =============================================================================
// STORE
// =============================================================================

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<Session>,
    subscription: Mutex<Option<JoinHandle<()>>>,
    init_timeout: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, init_timeout: Duration) -> Self {
        let (state, _) = watch::channel(Session::Initializing);
        Self { provider, state, subscription: Mutex::new(None), init_timeout }
    }

    /// Open the provider subscription. Later calls are no-ops.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize(&self) {
        let mut slot = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            debug!("session store already initialized");
            return;
        }
        let feed = self.provider.subscribe();
        let state = self.state.clone();
        *slot = Some(tokio::spawn(run_subscription(feed, state, self.init_timeout)));
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn watch(&self) -> SessionWatch {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Wait until the store has left `Initializing`.
    ///
    /// # Errors
    ///
    /// Returns the failure if the store could not establish ground truth.
    pub async fn ready(&self) -> Result<Option<Identity>, SessionFailure> {
        let mut rx = self.watch();
        loop {
            let session = rx.borrow_and_update().clone();
            match session {
                Session::Initializing => {}
                Session::SignedIn(identity) => return Ok(Some(identity)),
                Session::SignedOut => return Ok(None),
                Session::Failed(failure) => return Err(failure),
            }
            if rx.changed().await.is_err() {
                return Err(SessionFailure::Closed);
            }
        }
    }

    /// Wait up to `timeout` for a session matching `predicate`.
    /// Returns the matching session, or `None` on timeout.
    pub async fn wait_until(&self, predicate: impl FnMut(&Session) -> bool, timeout: Duration) -> Option<Session> {
        let mut rx = self.watch();
        match tokio::time::timeout(timeout, rx.wait_for(predicate)).await {
            Ok(Ok(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Authenticate with the provider. The session updates via the subscription.
    ///
    /// # Errors
    ///
    /// `Authentication` on rejection, `ProviderUnavailable` on transport failure.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        match self.provider.sign_in_with_credential(credentials).await {
            Ok(identity) => {
                info!(uid = %identity.uid, "sign-in accepted");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, email = %credentials.email, "sign-in rejected");
                Err(AuthError::from_sign_in(e))
            }
        }
    }

    /// Create an account with the provider.
    ///
    /// # Errors
    ///
    /// `Registration` on rejection, `ProviderUnavailable` on transport failure.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        match self.provider.create_account_with_credential(credentials).await {
            Ok(identity) => {
                info!(uid = %identity.uid, "account created");
                Ok(identity)
            }
            Err(e) => {
                warn!(error = %e, email = %credentials.email, "sign-up rejected");
                Err(AuthError::from_sign_up(e))
            }
        }
    }

    /// End the session with the provider.
    ///
    /// # Errors
    ///
    /// `ProviderUnavailable` if the provider did not confirm.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await.map_err(|e| {
            warn!(error = %e, "sign-out failed");
            AuthError::from_sign_out(e)
        })
    }

    /// Cancel the provider subscription. The last session value stays readable.
    pub fn shutdown(&self) {
        let handle = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// SUBSCRIPTION TASK
// =============================================================================

/// Apply one notification. Returns `false` once the store has failed.
fn apply(state: &watch::Sender<Session>, notification: Notification) -> bool {
    match notification {
        Ok(Some(identity)) => {
            debug!(uid = %identity.uid, "session signed in");
            state.send_replace(Session::SignedIn(identity));
            true
        }
        Ok(None) => {
            debug!("session signed out");
            state.send_replace(Session::SignedOut);
            true
        }
        Err(e) => {
            warn!(error = %e, "session stream failed");
            let reason = match e {
                ProviderError::Stream(reason) => reason,
                other => other.to_string(),
            };
            state.send_replace(Session::Failed(SessionFailure::Stream(reason)));
            false
        }
    }
}

async fn run_subscription(mut feed: SessionFeed, state: watch::Sender<Session>, init_timeout: Duration) {
    let first = match tokio::time::timeout(init_timeout, feed.recv()).await {
        Ok(Some(notification)) => notification,
        Ok(None) => {
            warn!("session stream closed before the initial notification");
            state.send_replace(Session::Failed(SessionFailure::Closed));
            return;
        }
        Err(_) => {
            warn!(timeout = ?init_timeout, "identity provider did not report initial session state");
            state.send_replace(Session::Failed(SessionFailure::InitTimeout(init_timeout)));
            return;
        }
    };
    if !apply(&state, first) {
        return;
    }

    while let Some(notification) = feed.recv().await {
        if !apply(&state, notification) {
            return;
        }
    }

    warn!("session stream closed");
    state.send_replace(Session::Failed(SessionFailure::Closed));
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
