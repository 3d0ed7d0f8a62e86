//! Auth routes — visitor cookie, access-gate extractors, sign-in forms.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::warn;
use uuid::Uuid;

use super::pages;
use crate::error::AuthError;
use crate::gate::{GateState, GateView};
use crate::identity::{Credentials, Identity};
use crate::redirect::RedirectIntent;
use crate::services::visitors;
use crate::session::{Session, SessionStore};
use crate::signin::{self, AuthMode, FormError};
use crate::state::AppState;

pub const VISITOR_COOKIE: &str = "carealign_visitor";

/// Visitor cookies outlive any single sign-in; the store behind them is swept when idle.
const VISITOR_COOKIE_MAX_AGE: Duration = Duration::days(30);

fn visitor_cookie(id: Uuid, secure: bool) -> Cookie<'static> {
    Cookie::build((VISITOR_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(VISITOR_COOKIE_MAX_AGE)
        .build()
}

// =============================================================================
// VISITOR EXTRACTOR
// =============================================================================

/// The browser making the request.
///
/// `store` is `None` until the visitor submits a sign-in form; a browser
/// with no registered store is signed out. Handlers must return `jar`.
pub struct Visitor {
    pub id: Uuid,
    pub store: Option<Arc<SessionStore>>,
    pub jar: CookieJar,
}

impl Visitor {
    /// Attach any newly issued cookie to `response`.
    pub fn respond(self, response: impl IntoResponse) -> Response {
        (self.jar, response).into_response()
    }

    /// Session store for this visitor, registering one (and issuing the cookie) if needed.
    pub async fn register(&mut self, state: &AppState) -> Arc<SessionStore> {
        if let Some(store) = &self.store {
            return Arc::clone(store);
        }
        if cookie_visitor_id(&self.jar) != Some(self.id) {
            self.jar = self.jar.clone().add(visitor_cookie(self.id, state.config.cookie_secure));
        }
        let store = visitors::session_for(state, self.id).await;
        self.store = Some(Arc::clone(&store));
        store
    }
}

fn cookie_visitor_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(VISITOR_COOKIE).and_then(|c| Uuid::parse_str(c.value()).ok())
}

impl<S> FromRequestParts<S> for Visitor
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let (id, store) = match cookie_visitor_id(&jar) {
            Some(id) => (id, visitors::existing(&app_state, id).await),
            None => (Uuid::new_v4(), None),
        };
        Ok(Self { id, store, jar })
    }
}

/// Gate decision for the visitor's current session.
async fn evaluate(visitor: &Visitor, path: &str) -> GateState {
    let session = match &visitor.store {
        None => Session::SignedOut,
        Some(store) => match store.ready().await {
            Ok(Some(identity)) => Session::SignedIn(identity),
            Ok(None) => Session::SignedOut,
            Err(failure) => Session::Failed(failure),
        },
    };
    GateState::Checking.next(&session, path)
}

/// 503 for a visitor whose store failed. The store is evicted so the next request starts over.
async fn unavailable(app_state: &AppState, visitor: Visitor, gate: &GateState, json: bool) -> Response {
    warn!(visitor_id = %visitor.id, ?gate, "session unavailable; evicting visitor");
    visitors::evict(app_state, visitor.id).await;
    let message = match gate.view() {
        GateView::Error(message) => message,
        _ => AuthError::ProviderUnavailable(String::new()).user_message().to_string(),
    };
    if json {
        let body = Json(serde_json::json!({ "error": "E_PROVIDER_UNAVAILABLE", "message": message }));
        visitor.respond((StatusCode::SERVICE_UNAVAILABLE, body))
    } else {
        visitor.respond((StatusCode::SERVICE_UNAVAILABLE, Html(pages::unavailable_page(&message))))
    }
}

fn path_and_query(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string())
}

// =============================================================================
// PROTECTED EXTRACTOR
// =============================================================================

/// Signed-in visitor for protected pages. Anyone else is redirected to sign in.
pub struct Protected {
    pub visitor: Visitor,
    pub identity: Identity,
}

impl<S> FromRequestParts<S> for Protected
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Ok(visitor) = Visitor::from_request_parts(parts, state).await;
        let path = path_and_query(parts);
        match evaluate(&visitor, &path).await {
            GateState::Granted(identity) => Ok(Self { visitor, identity }),
            GateState::Denied(intent) => {
                let target = intent.sign_in_url(&app_state.config.sign_in_path);
                Err(visitor.respond(Redirect::temporary(&target)))
            }
            gate => Err(unavailable(&app_state, visitor, &gate, false).await),
        }
    }
}

/// Signed-in visitor for JSON endpoints. Anyone else gets `401`.
pub struct ApiUser {
    pub visitor: Visitor,
    pub identity: Identity,
}

impl<S> FromRequestParts<S> for ApiUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let Ok(visitor) = Visitor::from_request_parts(parts, state).await;
        let path = path_and_query(parts);
        match evaluate(&visitor, &path).await {
            GateState::Granted(identity) => Ok(Self { visitor, identity }),
            GateState::Denied(_) => {
                let body = Json(serde_json::json!({ "error": "E_UNAUTHENTICATED", "message": "Sign in required." }));
                Err(visitor.respond((StatusCode::UNAUTHORIZED, body)))
            }
            gate => Err(unavailable(&app_state, visitor, &gate, true).await),
        }
    }
}

// =============================================================================
// FORMS
// =============================================================================

#[derive(Deserialize)]
pub struct AuthQuery {
    #[serde(rename = "redirectTo")]
    redirect_to: Option<String>,
}

#[derive(Deserialize)]
pub struct AuthForm {
    email: String,
    password: String,
    #[serde(rename = "redirectTo", default)]
    redirect_to: Option<String>,
}

pub(crate) fn form_error_status(e: &FormError) -> StatusCode {
    match e {
        FormError::InvalidEmail | FormError::MissingPassword | FormError::PasswordTooShort => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FormError::Auth(AuthError::Authentication(_)) => StatusCode::UNAUTHORIZED,
        FormError::Auth(AuthError::Registration(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        FormError::Auth(AuthError::ProviderUnavailable(_)) | FormError::NotObserved(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn form_page(state: AppState, visitor: Visitor, mode: AuthMode, query: AuthQuery) -> Response {
    let intent = query.redirect_to.as_deref().and_then(RedirectIntent::from_param);
    if let Some(store) = visitor.store.clone() {
        let flow = state.auth_flow(store);
        if let Some(destination) = flow.bounce_if_signed_in(intent.as_ref()).await {
            return visitor.respond(Redirect::to(&destination));
        }
    }
    let page = pages::auth_page(mode, &state.config.sign_in_path, intent.as_ref(), "", None);
    visitor.respond(Html(page))
}

fn form_error_page(
    state: &AppState,
    mode: AuthMode,
    intent: Option<&RedirectIntent>,
    email: &str,
    e: &FormError,
) -> Response {
    let page = pages::auth_page(mode, &state.config.sign_in_path, intent, email, Some(e.user_message()));
    (form_error_status(e), Html(page)).into_response()
}

async fn form_submit(state: AppState, mut visitor: Visitor, mode: AuthMode, form: AuthForm) -> Response {
    let intent = form.redirect_to.as_deref().and_then(RedirectIntent::from_param);
    let credentials = Credentials::new(form.email.trim(), form.password);
    // Malformed forms never reach the provider, so they don't need a store either.
    if let Err(e) = signin::validate(mode, &credentials) {
        return visitor.respond(form_error_page(&state, mode, intent.as_ref(), &credentials.email, &e));
    }

    let store = visitor.register(&state).await;
    match state.auth_flow(store).submit(mode, &credentials, intent.as_ref()).await {
        Ok(destination) => visitor.respond(Redirect::to(&destination)),
        Err(e) => visitor.respond(form_error_page(&state, mode, intent.as_ref(), &credentials.email, &e)),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /login` — sign-in form, or straight to the destination if already signed in.
pub async fn login_page(State(state): State<AppState>, visitor: Visitor, Query(query): Query<AuthQuery>) -> Response {
    form_page(state, visitor, AuthMode::SignIn, query).await
}

/// `POST /login`
pub async fn login_submit(State(state): State<AppState>, visitor: Visitor, Form(form): Form<AuthForm>) -> Response {
    form_submit(state, visitor, AuthMode::SignIn, form).await
}

/// `GET /signup`
pub async fn signup_page(State(state): State<AppState>, visitor: Visitor, Query(query): Query<AuthQuery>) -> Response {
    form_page(state, visitor, AuthMode::SignUp, query).await
}

/// `POST /signup`
pub async fn signup_submit(State(state): State<AppState>, visitor: Visitor, Form(form): Form<AuthForm>) -> Response {
    form_submit(state, visitor, AuthMode::SignUp, form).await
}

/// `POST /logout` — end the provider session and return to sign-in.
pub async fn logout(State(state): State<AppState>, visitor: Visitor) -> Response {
    let Some(store) = visitor.store.clone() else {
        return visitor.respond(Redirect::to(&state.config.sign_in_path));
    };
    if store.sign_out().await.is_ok() {
        let observed = store
            .wait_until(|s| !s.is_signed_in(), state.config.sign_in_observe_timeout)
            .await;
        if observed.is_none() {
            warn!(visitor_id = %visitor.id, "sign-out not observed in time");
        }
    }
    visitor.respond(Redirect::to(&state.config.sign_in_path))
}

/// `GET /api/auth/me` — current identity.
pub async fn me(user: ApiUser) -> Response {
    user.visitor.respond(Json(user.identity))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
