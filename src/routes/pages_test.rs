use std::sync::Arc;

use super::*;
use axum::http::{StatusCode, header};

use crate::routes::auth::Visitor;
use crate::state::test_helpers;

#[test]
fn escape_html_escapes_markup() {
    assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    assert_eq!(escape_html("plain"), "plain");
}

#[test]
fn sign_in_page_links_to_sign_up_with_intent() {
    let intent = RedirectIntent::new("/analysis");
    let html = auth_page(AuthMode::SignIn, "/login", Some(&intent), "", None);
    assert!(html.contains(r#"action="/login""#));
    assert!(html.contains(r#"href="/signup?redirectTo=%2Fanalysis""#));
    assert!(html.contains(r#"name="redirectTo" value="/analysis""#));
}

#[test]
fn sign_up_page_requires_min_length() {
    let html = auth_page(AuthMode::SignUp, "/login", None, "", None);
    assert!(html.contains(r#"action="/signup""#));
    assert!(html.contains(r#"minlength="8""#));
    assert!(!html.contains("redirectTo"));
}

#[test]
fn auth_page_escapes_email_and_error() {
    let html = auth_page(AuthMode::SignIn, "/login", None, "<script>@x.com", Some("bad & worse"));
    assert!(html.contains("&lt;script&gt;@x.com"));
    assert!(html.contains("bad &amp; worse"));
    assert!(!html.contains("<script>"));
}

#[test]
fn layout_shows_signed_in_name() {
    let identity = Identity { uid: "u".into(), display_name: "lee".into(), email: None };
    let html = layout("Analysis", Some(&identity), "<p>x</p>");
    assert!(html.contains("<title>Analysis | CareAlign</title>"));
    assert!(html.contains(r#"<span class="who">lee</span>"#));
    assert!(html.contains(r#"action="/logout""#));
}

#[tokio::test]
async fn root_redirects_to_default_landing() {
    let state = test_helpers::test_app_state();
    let resp = axum::response::IntoResponse::into_response(root(State(state)).await);
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/analysis");
}

#[tokio::test]
async fn protected_pages_render_for_signed_in_visitor() {
    let state = test_helpers::test_app_state();
    let id = test_helpers::seed_signed_in_visitor(&state).await;
    let store = Arc::clone(&state.visitors.read().await[&id].store);
    let identity = store.snapshot().identity().cloned().unwrap();
    let make = || Protected {
        visitor: Visitor { id, store: Some(Arc::clone(&store)), jar: axum_extra::extract::cookie::CookieJar::new() },
        identity: identity.clone(),
    };

    for resp in [analysis(make()).await, history(make()).await, dashboard(make()).await] {
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains(r#"<span class="who">lee</span>"#));
    }
}
