//! Server-rendered pages.
//!
//! Markup is intentionally plain: a shared layout, the sign-in and sign-up
//! forms, and the protected workspace pages. All interpolated text goes
//! through [`escape_html`].

use axum::extract::State;
use axum::response::{Html, Redirect, Response};

use super::auth::Protected;
use crate::identity::Identity;
use crate::redirect::{REDIRECT_PARAM, RedirectIntent};
use crate::signin::{AuthMode, MIN_PASSWORD_LEN};
use crate::state::AppState;

const APP_NAME: &str = "CareAlign";

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, identity: Option<&Identity>, body: &str) -> String {
    let nav = match identity {
        Some(identity) => format!(
            r#"<nav><a href="/analysis">Analysis</a> <a href="/history">History</a> <a href="/dashboard">Dashboard</a>
<span class="who">{name}</span>
<form method="post" action="/logout"><button type="submit">Sign out</button></form></nav>"#,
            name = escape_html(&identity.display_name),
        ),
        None => String::new(),
    };
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} | {APP_NAME}</title></head>
<body>
<header><strong>{APP_NAME}</strong>{nav}</header>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape_html(title),
    )
}

/// Sign-in or sign-up form, carrying the redirect intent through the POST.
pub(crate) fn auth_page(
    mode: AuthMode,
    sign_in_path: &str,
    intent: Option<&RedirectIntent>,
    email: &str,
    error: Option<&str>,
) -> String {
    let (action, other_path, other_label, password_hint) = match mode {
        AuthMode::SignIn => (sign_in_path, "/signup", "Create an account", String::new()),
        AuthMode::SignUp => (
            "/signup",
            sign_in_path,
            "Already have an account? Sign in",
            format!(r#" minlength="{MIN_PASSWORD_LEN}""#),
        ),
    };
    let other_href = match intent {
        Some(intent) => intent.sign_in_url(other_path),
        None => other_path.to_string(),
    };
    let hidden = intent.map_or_else(String::new, |intent| {
        format!(
            r#"<input type="hidden" name="{REDIRECT_PARAM}" value="{}">"#,
            escape_html(intent.destination_path())
        )
    });
    let error = error.map_or_else(String::new, |message| {
        format!(r#"<p class="error" role="alert">{}</p>"#, escape_html(message))
    });
    let body = format!(
        r#"<h1>{title}</h1>
{error}
<form method="post" action="{action}">
{hidden}
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Password <input type="password" name="password" required{password_hint}></label>
<button type="submit">{title}</button>
</form>
<p><a href="{other_href}">{other_label}</a></p>"#,
        title = mode.title(),
        action = escape_html(action),
        email = escape_html(email),
        other_href = escape_html(&other_href),
    );
    layout(mode.title(), None, &body)
}

pub(crate) fn unavailable_page(message: &str) -> String {
    let body = format!(
        r#"<h1>Sign-in unavailable</h1>
<p class="error">{}</p>
<p><a href="/">Try again</a></p>"#,
        escape_html(message)
    );
    layout("Unavailable", None, &body)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /` — send visitors to the default landing page (gated there).
pub async fn root(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.config.default_landing)
}

/// `GET /analysis`
pub async fn analysis(user: Protected) -> Response {
    let body = r#"<h1>Note analysis</h1>
<p>Paste the visit note below. Suggestions cover chronic condition specificity, missing HCCs, and RAF impact.</p>
<textarea id="note" name="note" rows="16" cols="80" placeholder="Paste clinical note"></textarea>
<p><button type="button" data-endpoint="/api/analysis">Analyze note</button></p>
<p><small>Draft recommendations only. Confirm diagnoses through clinical judgment.</small></p>"#;
    let page = layout("Analysis", Some(&user.identity), body);
    user.visitor.respond(Html(page))
}

/// `GET /history`
pub async fn history(user: Protected) -> Response {
    let body = "<h1>History</h1>\n<p>Previously analyzed notes will appear here.</p>";
    let page = layout("History", Some(&user.identity), body);
    user.visitor.respond(Html(page))
}

/// `GET /dashboard`
pub async fn dashboard(user: Protected) -> Response {
    let body = "<h1>Dashboard</h1>\n<p>Key metrics, trends, and RAF impact insights will live here soon.</p>";
    let page = layout("Dashboard", Some(&user.identity), body);
    user.visitor.respond(Html(page))
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;
