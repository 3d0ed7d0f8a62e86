//! User-facing authentication error taxonomy.
//!
//! Provider rejections are classified by the operation that triggered them:
//! a rejected sign-in is an `Authentication` error, a rejected sign-up a
//! `Registration` error. Transport failures are `ProviderUnavailable`
//! regardless of the operation. Nothing here is retried.

use crate::identity::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Sign-in rejected: bad credential, unknown or disabled account.
    #[error("sign-in rejected: {0}")]
    Authentication(ProviderError),

    /// Sign-up rejected: duplicate account, weak credential.
    #[error("sign-up rejected: {0}")]
    Registration(ProviderError),

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl AuthError {
    #[must_use]
    pub fn from_sign_in(e: ProviderError) -> Self {
        if e.is_transport() { Self::unavailable(e) } else { Self::Authentication(e) }
    }

    #[must_use]
    pub fn from_sign_up(e: ProviderError) -> Self {
        if e.is_transport() { Self::unavailable(e) } else { Self::Registration(e) }
    }

    #[must_use]
    pub fn from_sign_out(e: ProviderError) -> Self {
        Self::unavailable(e)
    }

    fn unavailable(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable(reason) | ProviderError::Stream(reason) => Self::ProviderUnavailable(reason),
            other => Self::ProviderUnavailable(other.to_string()),
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "E_AUTHENTICATION",
            Self::Registration(_) => "E_REGISTRATION",
            Self::ProviderUnavailable(_) => "E_PROVIDER_UNAVAILABLE",
        }
    }

    /// Message shown next to the form that triggered the error.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Authentication(ProviderError::AccountDisabled) => {
                "This account has been disabled. Contact your administrator."
            }
            Self::Authentication(_) => "Unable to sign in with those credentials. Please try again.",
            Self::Registration(ProviderError::AccountExists) => {
                "An account with that email already exists. Try signing in instead."
            }
            Self::Registration(ProviderError::WeakCredential(_)) => {
                "Choose a stronger password (at least 8 characters)."
            }
            Self::Registration(ProviderError::InvalidEmail) => "Enter a valid email address.",
            Self::Registration(_) => "We couldn't create your account. Please try again.",
            Self::ProviderUnavailable(_) => "We couldn't reach the sign-in service. Please try again shortly.",
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
