//! Sign-in and sign-up form flow.
//!
//! Validates the form, delegates to the session store, then waits until the
//! store's subscription has actually observed the new identity before
//! handing back a destination. Redirecting earlier would race the gate on
//! the destination page, which would still see `SignedOut` and bounce the
//! visitor straight back to sign-in.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::AuthError;
use crate::gate::Navigator;
use crate::identity::{Credentials, normalize_email};
use crate::redirect::{RedirectIntent, resolve_destination};
use crate::session::SessionStore;

/// Shortest password accepted by the sign-up form.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

impl AuthMode {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::SignIn => "Sign in",
            Self::SignUp => "Create account",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password required")]
    MissingPassword,
    #[error("password shorter than {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The provider accepted the credential but the store never reported it.
    #[error("sign-in not observed within {0:?}")]
    NotObserved(Duration),
}

impl FormError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "Enter a valid email address.",
            Self::MissingPassword => "Enter your password.",
            Self::PasswordTooShort => "Password must be at least 8 characters.",
            Self::Auth(e) => e.user_message(),
            Self::NotObserved(_) => "We couldn't confirm your sign-in. Please try again.",
        }
    }
}

/// Check the form before any provider call. Returns credentials with a normalized email.
///
/// # Errors
///
/// The first validation failure.
pub fn validate(mode: AuthMode, credentials: &Credentials) -> Result<Credentials, FormError> {
    let email = normalize_email(&credentials.email).ok_or(FormError::InvalidEmail)?;
    match mode {
        AuthMode::SignIn if credentials.password.is_empty() => return Err(FormError::MissingPassword),
        AuthMode::SignUp if credentials.password.chars().count() < MIN_PASSWORD_LEN => {
            return Err(FormError::PasswordTooShort);
        }
        _ => {}
    }
    Ok(Credentials::new(email, credentials.password.clone()))
}

pub struct AuthFlow {
    store: Arc<SessionStore>,
    default_landing: String,
    observe_timeout: Duration,
}

impl AuthFlow {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, default_landing: impl Into<String>, observe_timeout: Duration) -> Self {
        Self { store, default_landing: default_landing.into(), observe_timeout }
    }

    /// Run the form and return where to send the visitor.
    ///
    /// # Errors
    ///
    /// Validation failures, provider rejections, or `NotObserved` if the
    /// store never reports the new identity.
    pub async fn submit(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
        intent: Option<&RedirectIntent>,
    ) -> Result<String, FormError> {
        let credentials = validate(mode, credentials)?;
        let identity = match mode {
            AuthMode::SignIn => self.store.sign_in(&credentials).await?,
            AuthMode::SignUp => self.store.sign_up(&credentials).await?,
        };

        // Wait for this uid specifically; a previous account may still be signed in.
        let observed = self
            .store
            .wait_until(|s| s.identity().is_some_and(|i| i.uid == identity.uid), self.observe_timeout)
            .await;
        if observed.is_none() {
            return Err(FormError::NotObserved(self.observe_timeout));
        }

        let destination = resolve_destination(intent, &self.default_landing);
        info!(?mode, %destination, "auth flow complete");
        Ok(destination)
    }

    /// [`submit`](Self::submit), reading the intent from the navigator's
    /// location and replace-navigating on success.
    ///
    /// # Errors
    ///
    /// As `submit`; the navigator is untouched on error.
    pub async fn submit_and_navigate(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
        navigator: &dyn Navigator,
    ) -> Result<String, FormError> {
        let intent = RedirectIntent::from_location(&navigator.current_path());
        let destination = self.submit(mode, credentials, intent.as_ref()).await?;
        navigator.replace(&destination);
        Ok(destination)
    }

    /// Destination for a visitor who opens the form while already signed in.
    pub async fn bounce_if_signed_in(&self, intent: Option<&RedirectIntent>) -> Option<String> {
        match self.store.ready().await {
            Ok(Some(identity)) => {
                debug!(uid = %identity.uid, "already signed in; skipping form");
                Some(resolve_destination(intent, &self.default_landing))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "signin_test.rs"]
mod tests;
