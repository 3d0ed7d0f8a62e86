//! Access gate — renders protected content only for a signed-in session.
//!
//! DESIGN
//! ======
//! [`GateState::next`] is the whole decision: a pure transition from the
//! gate's previous state and the store's current [`Session`]. The HTTP
//! extractor evaluates it once per request; [`AccessGate`] evaluates it on
//! every session change for long-lived views and performs the sign-in
//! redirect through a [`Navigator`].
//!
//! A gate never redirects while the store is still `Initializing`, and
//! redirects at most once per mount.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::identity::Identity;
use crate::redirect::RedirectIntent;
use crate::session::{Session, SessionFailure, SessionWatch};

/// Placeholder shown while the store establishes ground truth.
pub const CHECKING_MESSAGE: &str = "Checking access…";
/// Placeholder shown once a redirect to sign-in is under way.
pub const REDIRECTING_MESSAGE: &str = "Redirecting to sign in…";

// =============================================================================
// NAVIGATION
// =============================================================================

/// Location of the view hosting a gate.
///
/// `replace` is called while the gate holds its mount lock. Implementations
/// must not drop the calling [`AccessGate`] from inside `replace`.
pub trait Navigator: Send + Sync {
    /// Current path including any query string, e.g. `/history?page=2`.
    fn current_path(&self) -> String;

    /// Replace the current location without adding a history entry.
    fn replace(&self, path: &str);
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Checking,
    Denied(RedirectIntent),
    Granted(Identity),
    /// The store failed; protected content cannot be decided.
    Unavailable(SessionFailure),
}

/// What the hosting view should render for a gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateView<'a> {
    Waiting(&'static str),
    Content(&'a Identity),
    Error(String),
}

impl GateState {
    /// Next state given the store's session and the location being guarded.
    #[must_use]
    pub fn next(&self, session: &Session, current_path: &str) -> Self {
        match (self, session) {
            (Self::Denied(_) | Self::Unavailable(_), _) => self.clone(),
            (_, Session::Failed(failure)) => Self::Unavailable(failure.clone()),
            (_, Session::SignedIn(identity)) => Self::Granted(identity.clone()),
            (_, Session::SignedOut) => Self::Denied(RedirectIntent::new(current_path)),
            (Self::Checking, Session::Initializing) => Self::Checking,
            // A store never returns to Initializing; keep what we had.
            (Self::Granted(_), Session::Initializing) => self.clone(),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::Unavailable(_))
    }

    #[must_use]
    pub fn view(&self) -> GateView<'_> {
        match self {
            Self::Checking => GateView::Waiting(CHECKING_MESSAGE),
            Self::Denied(_) => GateView::Waiting(REDIRECTING_MESSAGE),
            Self::Granted(identity) => GateView::Content(identity),
            Self::Unavailable(failure) => GateView::Error(format!("Sign-in is temporarily unavailable ({failure}).")),
        }
    }
}

// =============================================================================
// LIVE GATE
// =============================================================================

/// A mounted gate. Dropping it unmounts: no navigation happens after drop returns.
pub struct AccessGate {
    state: watch::Receiver<GateState>,
    mounted: Arc<Mutex<bool>>,
    driver: JoinHandle<()>,
}

impl AccessGate {
    /// Mount a gate over `session`. Must be called from within a Tokio runtime.
    #[must_use]
    pub fn mount(session: SessionWatch, navigator: Arc<dyn Navigator>, sign_in_path: impl Into<String>) -> Self {
        let (tx, state) = watch::channel(GateState::Checking);
        let mounted = Arc::new(Mutex::new(true));
        let driver = tokio::spawn(drive(session, navigator, sign_in_path.into(), tx, Arc::clone(&mounted)));
        Self { state, mounted, driver }
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.state.clone()
    }

    /// Wait until the gate has left `Checking`.
    pub async fn settled(&self) -> GateState {
        let mut rx = self.state.clone();
        let settled = rx.wait_for(|s| *s != GateState::Checking).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| rx.borrow().clone())
    }
}

impl Drop for AccessGate {
    fn drop(&mut self) {
        *self.mounted.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.driver.abort();
    }
}

async fn drive(
    mut session: SessionWatch,
    navigator: Arc<dyn Navigator>,
    sign_in_path: String,
    state: watch::Sender<GateState>,
    mounted: Arc<Mutex<bool>>,
) {
    loop {
        let current = session.borrow_and_update().clone();
        let previous = state.borrow().clone();
        let next = previous.next(&current, &navigator.current_path());

        match &next {
            GateState::Denied(intent) => {
                let target = intent.sign_in_url(&sign_in_path);
                let guard = mounted.lock().unwrap_or_else(PoisonError::into_inner);
                if *guard {
                    info!(destination = intent.destination_path(), "access denied; redirecting to sign in");
                    navigator.replace(&target);
                }
                drop(guard);
                state.send_replace(next.clone());
                return;
            }
            GateState::Unavailable(failure) => {
                debug!(error = %failure, "access gate unavailable");
                state.send_replace(next.clone());
                return;
            }
            GateState::Checking | GateState::Granted(_) => {
                state.send_if_modified(|s| {
                    if *s == next {
                        false
                    } else {
                        *s = next.clone();
                        true
                    }
                });
            }
        }

        if session.changed().await.is_err() {
            state.send_replace(GateState::Unavailable(SessionFailure::Closed));
            return;
        }
    }
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
