//! Identity provider contract.
//!
//! DESIGN
//! ======
//! The identity provider is an external service that authenticates
//! credentials and owns session persistence. The app only sees it through
//! [`IdentityProvider`]: one instance per client (per visitor), exposing a
//! session feed plus sign-in, sign-up and sign-out.
//!
//! The feed is an unbounded channel of notifications. The receiver is the
//! unsubscribe handle: dropping it ends the provider's forwarding task.
//! Providers keep their authoritative state in a `watch` channel and turn it
//! into a feed with [`spawn_feed`], which suppresses duplicates and the
//! `Pending` placeholder so consumers see at most one initial notification
//! followed by ordered changes.

pub mod firebase;
pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

// =============================================================================
// TYPES
// =============================================================================

/// Opaque user record reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable provider-assigned identifier.
    pub uid: String,
    /// Human-readable label for headers and greetings.
    pub display_name: String,
    /// Account email, when the provider reports one.
    pub email: Option<String>,
}

/// Email + password credential pair submitted by the sign-in forms.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// ERROR
// =============================================================================

/// Rejection reasons reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("no account exists for that email")]
    UnknownAccount,
    #[error("account disabled")]
    AccountDisabled,
    #[error("an account already exists for that email")]
    AccountExists,
    #[error("weak credential: {0}")]
    WeakCredential(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity provider rejected the request: {0}")]
    Rejected(String),
    #[error("session stream failed: {0}")]
    Stream(String),
}

impl ProviderError {
    /// Network or service failures, as opposed to a verdict on the credential.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Stream(_))
    }
}

// =============================================================================
// PROVIDER CONTRACT
// =============================================================================

/// One session notification: the signed-in identity, `None` for signed out,
/// or a stream failure (which ends the feed).
pub type Notification = Result<Option<Identity>, ProviderError>;

/// Receiving end of a provider subscription. Drop it to unsubscribe.
pub type SessionFeed = mpsc::UnboundedReceiver<Notification>;

/// Abstract identity provider, one instance per client.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Open a session-change subscription.
    ///
    /// Must be called from within a Tokio runtime.
    fn subscribe(&self) -> SessionFeed;

    /// Authenticate an existing account.
    async fn sign_in_with_credential(&self, credentials: &Credentials) -> Result<Identity, ProviderError>;

    /// Create an account and sign it in.
    async fn create_account_with_credential(&self, credentials: &Credentials) -> Result<Identity, ProviderError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

// =============================================================================
// FEED PLUMBING
// =============================================================================

/// Authoritative provider-side session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FeedState {
    /// The provider has not determined whether a session exists yet.
    Pending,
    Ready(Option<Identity>),
    Failed(ProviderError),
}

impl FeedState {
    fn notification(&self) -> Option<Notification> {
        match self {
            Self::Pending => None,
            Self::Ready(identity) => Some(Ok(identity.clone())),
            Self::Failed(e) => Some(Err(e.clone())),
        }
    }
}

/// Forward a provider's `watch` state into a fresh [`SessionFeed`].
///
/// The forwarding task exits when the subscriber drops its receiver, when
/// the provider drops its sender, or after delivering a failure.
pub(crate) fn spawn_feed(mut state: watch::Receiver<FeedState>) -> SessionFeed {
    let (tx, feed) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut last: Option<Notification> = None;
        loop {
            let current = state.borrow_and_update().notification();
            if let Some(notification) = current {
                if last.as_ref() != Some(&notification) {
                    let failed = notification.is_err();
                    if tx.send(notification.clone()).is_err() || failed {
                        return;
                    }
                    last = Some(notification);
                }
            }

            tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                () = tx.closed() => return,
            }
        }
    });

    feed
}

/// Normalize an email address, rejecting obviously malformed input.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(normalized)
}

/// Default display label for an account: the email's local part.
#[must_use]
pub fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("Clinician")
        .to_string()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
