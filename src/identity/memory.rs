//! In-process identity provider.
//!
//! DESIGN
//! ======
//! `MemoryDirectory` is the shared account table (the "service"); each
//! visitor gets its own `MemoryProvider` client holding that visitor's
//! session state. Passwords are stored as salted SHA-256 digests.
//!
//! Clients normally report "no session" immediately. A deferred client
//! starts `Pending` and only notifies once `restore` is called, which lets
//! tests hold a store in its initializing phase.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use uuid::Uuid;

use super::{
    Credentials, FeedState, Identity, IdentityProvider, ProviderError, SessionFeed, name_from_email, normalize_email,
    spawn_feed,
};

/// Shortest password the directory accepts for new accounts.
pub const MIN_PROVIDER_PASSWORD_LEN: usize = 6;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// DIRECTORY
// =============================================================================

struct Account {
    uid: String,
    email: String,
    display_name: String,
    salt: String,
    password_hash: String,
    disabled: bool,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity { uid: self.uid.clone(), display_name: self.display_name.clone(), email: Some(self.email.clone()) }
    }
}

/// Shared in-memory account table.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail`, `WeakCredential` or `AccountExists`.
    pub fn register(&self, credentials: &Credentials) -> Result<Identity, ProviderError> {
        let email = normalize_email(&credentials.email).ok_or(ProviderError::InvalidEmail)?;
        if credentials.password.chars().count() < MIN_PROVIDER_PASSWORD_LEN {
            return Err(ProviderError::WeakCredential(format!(
                "Password should be at least {MIN_PROVIDER_PASSWORD_LEN} characters"
            )));
        }

        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(&email) {
            return Err(ProviderError::AccountExists);
        }

        let salt = generate_salt();
        let account = Account {
            uid: Uuid::new_v4().to_string(),
            display_name: name_from_email(&email),
            password_hash: hash_password(&salt, &credentials.password),
            salt,
            email: email.clone(),
            disabled: false,
        };
        let identity = account.identity();
        accounts.insert(email, account);
        Ok(identity)
    }

    /// Check a credential against the table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail`, `UnknownAccount`, `AccountDisabled` or
    /// `InvalidCredential`.
    pub fn verify(&self, credentials: &Credentials) -> Result<Identity, ProviderError> {
        let email = normalize_email(&credentials.email).ok_or(ProviderError::InvalidEmail)?;
        let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let account = accounts.get(&email).ok_or(ProviderError::UnknownAccount)?;
        if account.disabled {
            return Err(ProviderError::AccountDisabled);
        }
        if hash_password(&account.salt, &credentials.password) != account.password_hash {
            return Err(ProviderError::InvalidCredential);
        }
        Ok(account.identity())
    }

    /// Disable an account. Returns `false` if no such account exists.
    pub fn disable(&self, email: &str) -> bool {
        let Some(email) = normalize_email(email) else {
            return false;
        };
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        match accounts.get_mut(&email) {
            Some(account) => {
                account.disabled = true;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A client whose initial notification is "no session".
    #[must_use]
    pub fn client(&self) -> MemoryProvider {
        MemoryProvider::with_state(self.clone(), FeedState::Ready(None))
    }

    /// A client that stays silent until [`MemoryProvider::restore`] is called.
    #[must_use]
    pub fn deferred_client(&self) -> MemoryProvider {
        MemoryProvider::with_state(self.clone(), FeedState::Pending)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// One visitor's connection to a [`MemoryDirectory`].
pub struct MemoryProvider {
    directory: MemoryDirectory,
    state: watch::Sender<FeedState>,
}

impl MemoryProvider {
    fn with_state(directory: MemoryDirectory, initial: FeedState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { directory, state }
    }

    /// Report a restored (or absent) prior session, resolving a deferred client.
    pub fn restore(&self, identity: Option<Identity>) {
        self.state.send_replace(FeedState::Ready(identity));
    }

    /// Simulate the provider ending the session remotely (expiry, revocation).
    pub fn expire(&self) {
        self.state.send_replace(FeedState::Ready(None));
    }

    /// Simulate the notification stream breaking.
    pub fn fail(&self, reason: &str) {
        self.state.send_replace(FeedState::Failed(ProviderError::Stream(reason.to_string())));
    }

    #[must_use]
    pub fn directory(&self) -> &MemoryDirectory {
        &self.directory
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryProvider {
    fn subscribe(&self) -> SessionFeed {
        spawn_feed(self.state.subscribe())
    }

    async fn sign_in_with_credential(&self, credentials: &Credentials) -> Result<Identity, ProviderError> {
        let identity = self.directory.verify(credentials)?;
        self.state.send_replace(FeedState::Ready(Some(identity.clone())));
        Ok(identity)
    }

    async fn create_account_with_credential(&self, credentials: &Credentials) -> Result<Identity, ProviderError> {
        let identity = self.directory.register(credentials)?;
        self.state.send_replace(FeedState::Ready(Some(identity.clone())));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.state.send_replace(FeedState::Ready(None));
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
