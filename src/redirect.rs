//! Redirect intent — where to send a visitor after sign-in.
//!
//! The intent travels as a single `redirectTo` query parameter on the
//! sign-in URL. It is not stored anywhere else, so it survives exactly one
//! round trip. Only local paths are honoured; anything else resolves to the
//! default landing page.

/// Query parameter carrying the requested destination.
pub const REDIRECT_PARAM: &str = "redirectTo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectIntent {
    destination_path: String,
}

impl RedirectIntent {
    /// Capture a destination. Non-local input is replaced by `/`.
    #[must_use]
    pub fn new(destination_path: impl Into<String>) -> Self {
        let destination_path = destination_path.into();
        Self::from_param(&destination_path).unwrap_or_else(|| Self { destination_path: "/".into() })
    }

    /// Decode an already percent-decoded parameter value.
    #[must_use]
    pub fn from_param(value: &str) -> Option<Self> {
        let value = value.trim();
        is_local_path(value).then(|| Self { destination_path: encode_non_ascii(value) })
    }

    /// Extract the intent from a raw (still encoded) query string.
    #[must_use]
    pub fn from_query(query: &str) -> Option<Self> {
        query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == REDIRECT_PARAM)
            .and_then(|(_, raw)| urlencoding::decode(&raw.replace('+', " ")).ok().map(|v| v.into_owned()))
            .and_then(|value| Self::from_param(&value))
    }

    /// Extract the intent from a location such as `/login?redirectTo=%2Fanalysis`.
    #[must_use]
    pub fn from_location(location: &str) -> Option<Self> {
        location.split_once('?').and_then(|(_, query)| Self::from_query(query))
    }

    #[must_use]
    pub fn destination_path(&self) -> &str {
        &self.destination_path
    }

    /// Sign-in entry point carrying this intent, e.g. `/login?redirectTo=%2Fanalysis`.
    #[must_use]
    pub fn sign_in_url(&self, sign_in_path: &str) -> String {
        format!("{sign_in_path}?{REDIRECT_PARAM}={}", urlencoding::encode(&self.destination_path))
    }
}

/// Pick the post-sign-in destination: the intent's path, or the default landing page.
#[must_use]
pub fn resolve_destination(intent: Option<&RedirectIntent>, default_landing: &str) -> String {
    intent.map_or_else(|| default_landing.to_string(), |i| i.destination_path.clone())
}

/// A same-origin absolute path: starts with one `/`, no scheme-relative `//`, no backslashes.
#[must_use]
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') && !path.chars().any(char::is_control)
}

/// Percent-encode non-ASCII characters so the path is safe in a `Location` header.
fn encode_non_ascii(path: &str) -> String {
    if path.is_ascii() {
        return path.to_string();
    }
    let mut encoded = String::with_capacity(path.len() * 3);
    let mut buf = [0u8; 4];
    for ch in path.chars() {
        if ch.is_ascii() {
            encoded.push(ch);
        } else {
            encoded.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    encoded
}

#[cfg(test)]
#[path = "redirect_test.rs"]
mod tests;
