//! Application configuration parsed from environment variables.
//!
//! `main` loads `.env` (if present) before calling [`AppConfig::from_env`].
//! Parsing goes through a lookup closure so tests can supply values
//! without touching the process environment.

use std::time::Duration;

use crate::identity::firebase::FirebaseConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SIGN_IN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/analysis";
pub const DEFAULT_SESSION_INIT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SIGN_IN_OBSERVE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_VISITOR_IDLE_TTL_SECS: u64 = 3600;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {var}")]
    MissingVar { var: String },
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },
}

// =============================================================================
// TYPES
// =============================================================================

/// Which identity provider backs visitor sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// In-process account table, optionally seeded with a demo account.
    Memory { demo_account: Option<(String, String)> },
    Firebase(FirebaseConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub provider: ProviderKind,
    pub sign_in_path: String,
    pub default_landing: String,
    pub session_init_timeout: Duration,
    pub sign_in_observe_timeout: Duration,
    pub visitor_idle_ttl: Duration,
    pub cookie_secure: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            provider: ProviderKind::Memory { demo_account: None },
            sign_in_path: DEFAULT_SIGN_IN_PATH.into(),
            default_landing: DEFAULT_LANDING_PATH.into(),
            session_init_timeout: Duration::from_secs(DEFAULT_SESSION_INIT_TIMEOUT_SECS),
            sign_in_observe_timeout: Duration::from_millis(DEFAULT_SIGN_IN_OBSERVE_TIMEOUT_MS),
            visitor_idle_ttl: Duration::from_secs(DEFAULT_VISITOR_IDLE_TTL_SECS),
            cookie_secure: false,
        }
    }
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// Optional:
    /// - `PORT` (default 3000)
    /// - `IDENTITY_PROVIDER`: `memory` (default) or `firebase`
    /// - `SIGN_IN_PATH` (default `/login`), `DEFAULT_LANDING_PATH` (default `/analysis`)
    /// - `SESSION_INIT_TIMEOUT_SECS`, `SIGN_IN_OBSERVE_TIMEOUT_MS`, `VISITOR_IDLE_TTL_SECS`
    /// - `COOKIE_SECURE`
    /// - `DEMO_ACCOUNT_EMAIL` + `DEMO_ACCOUNT_PASSWORD` (memory provider only)
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable values or missing Firebase settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider = match lookup("IDENTITY_PROVIDER").as_deref().map(str::trim) {
            None | Some("" | "memory") => {
                let demo_account = lookup("DEMO_ACCOUNT_EMAIL").zip(lookup("DEMO_ACCOUNT_PASSWORD"));
                ProviderKind::Memory { demo_account }
            }
            Some("firebase") => ProviderKind::Firebase(FirebaseConfig::from_lookup(&lookup)?),
            Some(other) => {
                return Err(ConfigError::Invalid { var: "IDENTITY_PROVIDER".into(), value: other.into() });
            }
        };

        Ok(Self {
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            provider,
            sign_in_path: parse_sign_in_path(&lookup)?,
            default_landing: parse_path(&lookup, "DEFAULT_LANDING_PATH", DEFAULT_LANDING_PATH)?,
            session_init_timeout: Duration::from_secs(parse_var(
                &lookup,
                "SESSION_INIT_TIMEOUT_SECS",
                DEFAULT_SESSION_INIT_TIMEOUT_SECS,
            )?),
            sign_in_observe_timeout: Duration::from_millis(parse_var(
                &lookup,
                "SIGN_IN_OBSERVE_TIMEOUT_MS",
                DEFAULT_SIGN_IN_OBSERVE_TIMEOUT_MS,
            )?),
            visitor_idle_ttl: Duration::from_secs(parse_var(
                &lookup,
                "VISITOR_IDLE_TTL_SECS",
                DEFAULT_VISITOR_IDLE_TTL_SECS,
            )?),
            cookie_secure: match lookup("COOKIE_SECURE") {
                None => false,
                Some(raw) => match parse_bool(&raw) {
                    Some(value) => value,
                    None => return Err(ConfigError::Invalid { var: "COOKIE_SECURE".into(), value: raw }),
                },
            },
        })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var: key.into(), value: raw }),
    }
}

fn parse_path(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<String, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(default.to_string());
    };
    let path = raw.trim();
    if path.is_ascii() && crate::redirect::is_local_path(path) {
        Ok(path.to_string())
    } else {
        Err(ConfigError::Invalid { var: key.into(), value: raw })
    }
}

/// Paths the router already owns; the sign-in route may not shadow them.
const RESERVED_PATHS: &[&str] =
    &["/", "/signup", "/logout", "/analysis", "/history", "/dashboard", "/api/analysis", "/api/auth/me", "/healthz"];

fn parse_sign_in_path(lookup: &impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    let path = parse_path(lookup, "SIGN_IN_PATH", DEFAULT_SIGN_IN_PATH)?;
    if RESERVED_PATHS.contains(&path.as_str()) {
        return Err(ConfigError::Invalid { var: "SIGN_IN_PATH".into(), value: path });
    }
    Ok(path)
}

/// Fetch a required variable, treating blank values as missing.
pub(crate) fn require_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingVar { var: key.into() })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
