//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Server-rendered sign-in forms and protected pages, plus a small JSON
//! API, under a single Axum router. Every protected route goes through the
//! `Protected` or `ApiUser` extractor, which applies the access gate to the
//! visitor's session store.

pub mod analysis;
pub mod auth;
pub mod pages;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let sign_in_path = state.config.sign_in_path.clone();
    Router::new()
        .route("/", get(pages::root))
        .route(&sign_in_path, get(auth::login_page).post(auth::login_submit))
        .route("/signup", get(auth::signup_page).post(auth::signup_submit))
        .route("/logout", post(auth::logout))
        .route("/analysis", get(pages::analysis))
        .route("/history", get(pages::history))
        .route("/dashboard", get(pages::dashboard))
        .route("/api/analysis", post(analysis::analyze_note))
        .route("/api/auth/me", get(auth::me))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
