//! Firebase Authentication client over the Identity Toolkit REST API.
//!
//! DESIGN
//! ======
//! Thin HTTP wrapper for `accounts:signInWithPassword`, `accounts:signUp`
//! and the secure-token refresh endpoint. Response parsing is pure
//! (`parse_auth_response`, `parse_refresh_response`, `map_error_message`)
//! for testability.
//!
//! The server keeps no browser credentials, so every client starts signed
//! out. After a sign-in a background task refreshes the ID token shortly
//! before it expires; a rejected refresh ends the session, which the
//! session store observes like any other sign-out.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Credentials, FeedState, Identity, IdentityProvider, ProviderError, SessionFeed, name_from_email, spawn_feed};
use crate::config::{ConfigError, require_var};

pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Refresh this long before the ID token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Wait this long before retrying a refresh that failed in transit.
const REFRESH_RETRY_BACKOFF: Duration = Duration::from_secs(30);

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub identity_toolkit_url: String,
    pub secure_token_url: String,
}

impl FirebaseConfig {
    /// Required: `FIREBASE_API_KEY`, `FIREBASE_AUTH_DOMAIN`, `FIREBASE_PROJECT_ID`.
    /// Optional: `FIREBASE_IDENTITY_TOOLKIT_URL`, `FIREBASE_SECURE_TOKEN_URL`.
    ///
    /// # Errors
    ///
    /// Returns `MissingVar` naming the first absent required variable.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base = |key: &str, default: &str| {
            lookup(key)
                .unwrap_or_else(|| default.to_string())
                .trim_end_matches('/')
                .to_string()
        };
        Ok(Self {
            api_key: require_var(lookup, "FIREBASE_API_KEY")?,
            auth_domain: require_var(lookup, "FIREBASE_AUTH_DOMAIN")?,
            project_id: require_var(lookup, "FIREBASE_PROJECT_ID")?,
            identity_toolkit_url: base("FIREBASE_IDENTITY_TOOLKIT_URL", DEFAULT_IDENTITY_TOOLKIT_URL),
            secure_token_url: base("FIREBASE_SECURE_TOKEN_URL", DEFAULT_SECURE_TOKEN_URL),
        })
    }

    fn accounts_url(&self, method: &str) -> String {
        format!("{}/accounts:{method}?key={}", self.identity_toolkit_url, self.api_key)
    }

    fn token_url(&self) -> String {
        format!("{}/token?key={}", self.secure_token_url, self.api_key)
    }
}

/// Build the shared HTTP client used by every Firebase provider instance.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| ProviderError::Unavailable(format!("http client build failed: {e}")))
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Tokens held for the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenSet {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: Duration,
}

fn parse_expires_in(raw: &str) -> Duration {
    Duration::from_secs(raw.trim().parse().unwrap_or(3600))
}

/// Map an Identity Toolkit error message to a provider error.
///
/// Messages look like `EMAIL_NOT_FOUND` or `WEAK_PASSWORD : Password should be at least 6 characters`.
pub(crate) fn map_error_message(message: &str) -> ProviderError {
    let (code, detail) = match message.split_once(':') {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };
    match code {
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => ProviderError::UnknownAccount,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "MISSING_PASSWORD" => ProviderError::InvalidCredential,
        "USER_DISABLED" => ProviderError::AccountDisabled,
        "EMAIL_EXISTS" => ProviderError::AccountExists,
        "WEAK_PASSWORD" => ProviderError::WeakCredential(detail.to_string()),
        "INVALID_EMAIL" | "MISSING_EMAIL" => ProviderError::InvalidEmail,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => ProviderError::Unavailable(code.to_string()),
        other => ProviderError::Rejected(other.to_string()),
    }
}

fn parse_error(status: u16, body: &str) -> ProviderError {
    if status >= 500 {
        return ProviderError::Unavailable(format!("status {status}"));
    }
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => map_error_message(&envelope.error.message),
        Err(_) => ProviderError::Rejected(format!("status {status}")),
    }
}

/// Parse an `accounts:*` response into the identity and its tokens.
pub(crate) fn parse_auth_response(status: u16, body: &str) -> Result<(Identity, TokenSet), ProviderError> {
    if !(200..300).contains(&status) {
        return Err(parse_error(status, body));
    }
    let resp: AuthResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Unavailable(format!("unexpected response: {e}")))?;

    let display_name = resp
        .display_name
        .filter(|name| !name.trim().is_empty())
        .or_else(|| resp.email.as_deref().map(name_from_email))
        .unwrap_or_else(|| "Clinician".to_string());
    let identity = Identity { uid: resp.local_id, display_name, email: resp.email };
    let tokens = TokenSet {
        id_token: resp.id_token,
        refresh_token: resp.refresh_token,
        expires_in: parse_expires_in(&resp.expires_in),
    };
    Ok((identity, tokens))
}

/// Parse a secure-token refresh response.
pub(crate) fn parse_refresh_response(status: u16, body: &str) -> Result<TokenSet, ProviderError> {
    if !(200..300).contains(&status) {
        return Err(parse_error(status, body));
    }
    let resp: RefreshResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Unavailable(format!("unexpected response: {e}")))?;
    Ok(TokenSet {
        id_token: resp.id_token,
        refresh_token: resp.refresh_token,
        expires_in: parse_expires_in(&resp.expires_in),
    })
}

pub(crate) fn refresh_delay(expires_in: Duration) -> Duration {
    expires_in.saturating_sub(REFRESH_MARGIN).max(Duration::from_secs(1))
}

// =============================================================================
// CLIENT
// =============================================================================

struct Inner {
    http: reqwest::Client,
    config: Arc<FirebaseConfig>,
    state: watch::Sender<FeedState>,
    tokens: Mutex<Option<TokenSet>>,
}

impl Inner {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<(u16, String), ProviderError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        read_response(response).await
    }

    async fn authenticate(&self, method: &str, credentials: &Credentials) -> Result<(Identity, TokenSet), ProviderError> {
        let body = serde_json::json!({
            "email": credentials.email.trim(),
            "password": credentials.password,
            "returnSecureToken": true,
        });
        let (status, text) = self.post_json(&self.config.accounts_url(method), &body).await?;
        parse_auth_response(status, &text)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        let form = format!("grant_type=refresh_token&refresh_token={}", urlencoding::encode(refresh_token));
        let response = self
            .http
            .post(self.config.token_url())
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        let (status, text) = read_response(response).await?;
        parse_refresh_response(status, &text)
    }

    fn set_tokens(&self, tokens: Option<TokenSet>) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = tokens;
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.refresh_token.clone())
    }
}

async fn read_response(response: reqwest::Response) -> Result<(u16, String), ProviderError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
    Ok((status, text))
}

async fn refresh_loop(inner: Arc<Inner>, expires_in: Duration) {
    let mut delay = refresh_delay(expires_in);
    loop {
        tokio::time::sleep(delay).await;
        let Some(refresh_token) = inner.refresh_token() else {
            return;
        };
        match inner.refresh(&refresh_token).await {
            Ok(tokens) => {
                debug!(expires_in = ?tokens.expires_in, "firebase id token refreshed");
                delay = refresh_delay(tokens.expires_in);
                inner.set_tokens(Some(tokens));
            }
            Err(e) if e.is_transport() => {
                warn!(error = %e, "firebase token refresh failed; retrying");
                delay = REFRESH_RETRY_BACKOFF;
            }
            Err(e) => {
                info!(error = %e, "firebase token refresh rejected; ending session");
                inner.set_tokens(None);
                inner.state.send_replace(FeedState::Ready(None));
                return;
            }
        }
    }
}

/// One visitor's Firebase Authentication client.
pub struct FirebaseProvider {
    inner: Arc<Inner>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl FirebaseProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, config: Arc<FirebaseConfig>) -> Self {
        let (state, _) = watch::channel(FeedState::Ready(None));
        Self {
            inner: Arc::new(Inner { http, config, state, tokens: Mutex::new(None) }),
            refresher: Mutex::new(None),
        }
    }

    /// Current ID token, for calls to services that verify Firebase tokens.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.inner
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.id_token.clone())
    }

    fn replace_refresher(&self, next: Option<JoinHandle<()>>) {
        let mut slot = self.refresher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, next) {
            previous.abort();
        }
    }

    fn establish(&self, identity: &Identity, tokens: TokenSet) {
        let expires_in = tokens.expires_in;
        self.inner.set_tokens(Some(tokens));
        self.inner.state.send_replace(FeedState::Ready(Some(identity.clone())));
        let handle = tokio::spawn(refresh_loop(Arc::clone(&self.inner), expires_in));
        self.replace_refresher(Some(handle));
    }
}

impl Drop for FirebaseProvider {
    fn drop(&mut self) {
        self.replace_refresher(None);
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseProvider {
    fn subscribe(&self) -> SessionFeed {
        spawn_feed(self.inner.state.subscribe())
    }

    async fn sign_in_with_credential(&self, credentials: &Credentials) -> Result<Identity, ProviderError> {
        let (identity, tokens) = self.inner.authenticate("signInWithPassword", credentials).await?;
        self.establish(&identity, tokens);
        Ok(identity)
    }

    async fn create_account_with_credential(&self, credentials: &Credentials) -> Result<Identity, ProviderError> {
        let (identity, tokens) = self.inner.authenticate("signUp", credentials).await?;
        self.establish(&identity, tokens);
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.replace_refresher(None);
        self.inner.set_tokens(None);
        self.inner.state.send_replace(FeedState::Ready(None));
        Ok(())
    }
}

#[cfg(test)]
#[path = "firebase_test.rs"]
mod tests;
