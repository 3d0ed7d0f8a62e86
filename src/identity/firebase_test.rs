use super::*;
use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;

// =============================================================================
// map_error_message
// =============================================================================

#[test]
fn maps_known_error_codes() {
    assert_eq!(map_error_message("EMAIL_NOT_FOUND"), ProviderError::UnknownAccount);
    assert_eq!(map_error_message("INVALID_PASSWORD"), ProviderError::InvalidCredential);
    assert_eq!(map_error_message("INVALID_LOGIN_CREDENTIALS"), ProviderError::InvalidCredential);
    assert_eq!(map_error_message("USER_DISABLED"), ProviderError::AccountDisabled);
    assert_eq!(map_error_message("EMAIL_EXISTS"), ProviderError::AccountExists);
    assert_eq!(map_error_message("INVALID_EMAIL"), ProviderError::InvalidEmail);
}

#[test]
fn weak_password_keeps_reason() {
    assert_eq!(
        map_error_message("WEAK_PASSWORD : Password should be at least 6 characters"),
        ProviderError::WeakCredential("Password should be at least 6 characters".into())
    );
}

#[test]
fn throttling_is_transport() {
    assert!(map_error_message("TOO_MANY_ATTEMPTS_TRY_LATER").is_transport());
}

#[test]
fn unknown_code_is_rejected() {
    assert_eq!(map_error_message("OPERATION_NOT_ALLOWED"), ProviderError::Rejected("OPERATION_NOT_ALLOWED".into()));
}

// =============================================================================
// parse_auth_response / parse_refresh_response
// =============================================================================

#[test]
fn parse_auth_success() {
    let body = r#"{"kind":"identitytoolkit#VerifyPasswordResponse","localId":"uid-1","email":"lee@clinic.com","displayName":"Dr. Lee","idToken":"id-abc","registered":true,"refreshToken":"rt-abc","expiresIn":"3600"}"#;
    let (identity, tokens) = parse_auth_response(200, body).unwrap();
    assert_eq!(identity.uid, "uid-1");
    assert_eq!(identity.display_name, "Dr. Lee");
    assert_eq!(identity.email.as_deref(), Some("lee@clinic.com"));
    assert_eq!(tokens.id_token, "id-abc");
    assert_eq!(tokens.refresh_token, "rt-abc");
    assert_eq!(tokens.expires_in, Duration::from_secs(3600));
}

#[test]
fn parse_auth_falls_back_to_email_name() {
    let body = r#"{"localId":"uid-2","email":"new@clinic.com","displayName":"","idToken":"i","refreshToken":"r","expiresIn":"3600"}"#;
    let (identity, _) = parse_auth_response(200, body).unwrap();
    assert_eq!(identity.display_name, "new");
}

#[test]
fn parse_auth_error_envelope() {
    let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[{"message":"EMAIL_EXISTS","domain":"global","reason":"invalid"}]}}"#;
    assert_eq!(parse_auth_response(400, body).unwrap_err(), ProviderError::AccountExists);
}

#[test]
fn parse_auth_server_error_is_unavailable() {
    assert!(parse_auth_response(503, "upstream down").unwrap_err().is_transport());
}

#[test]
fn parse_auth_garbage_body() {
    assert!(matches!(parse_auth_response(400, "<html>"), Err(ProviderError::Rejected(_))));
    assert!(matches!(parse_auth_response(200, "{}"), Err(ProviderError::Unavailable(_))));
}

#[test]
fn parse_refresh_success() {
    let body = r#"{"expires_in":"1800","token_type":"Bearer","refresh_token":"rt-2","id_token":"id-2","user_id":"uid-1","project_id":"123"}"#;
    let tokens = parse_refresh_response(200, body).unwrap();
    assert_eq!(tokens.refresh_token, "rt-2");
    assert_eq!(tokens.expires_in, Duration::from_secs(1800));
}

#[test]
fn parse_refresh_rejection() {
    let body = r#"{"error":{"code":400,"message":"TOKEN_EXPIRED","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(parse_refresh_response(400, body).unwrap_err(), ProviderError::Rejected("TOKEN_EXPIRED".into()));
}

#[test]
fn refresh_delay_subtracts_margin_with_floor() {
    assert_eq!(refresh_delay(Duration::from_secs(3600)), Duration::from_secs(3540));
    assert_eq!(refresh_delay(Duration::from_secs(30)), Duration::from_secs(1));
}

// =============================================================================
// FirebaseConfig
// =============================================================================

#[test]
fn config_urls_strip_trailing_slash() {
    let lookup = |key: &str| match key {
        "FIREBASE_API_KEY" => Some("k".to_string()),
        "FIREBASE_AUTH_DOMAIN" => Some("d".to_string()),
        "FIREBASE_PROJECT_ID" => Some("p".to_string()),
        "FIREBASE_IDENTITY_TOOLKIT_URL" => Some("http://localhost:9099/identitytoolkit.googleapis.com/v1/".to_string()),
        _ => None,
    };
    let config = FirebaseConfig::from_lookup(&lookup).unwrap();
    assert_eq!(
        config.accounts_url("signUp"),
        "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp?key=k"
    );
    assert_eq!(config.token_url(), "https://securetoken.googleapis.com/v1/token?key=k");
}

#[test]
fn config_blank_value_counts_as_missing() {
    let lookup = |key: &str| match key {
        "FIREBASE_API_KEY" => Some("k".to_string()),
        "FIREBASE_AUTH_DOMAIN" => Some("   ".to_string()),
        _ => None,
    };
    assert_eq!(
        FirebaseConfig::from_lookup(&lookup).unwrap_err(),
        ConfigError::MissingVar { var: "FIREBASE_AUTH_DOMAIN".into() }
    );
}

// =============================================================================
// FirebaseProvider against a local fake Identity Toolkit
// =============================================================================

async fn fake_sign_in(Json(body): Json<serde_json::Value>) -> (StatusCode, Json<serde_json::Value>) {
    if body["email"] == "lee@clinic.com" && body["password"] == "correct-horse" {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "localId": "uid-lee",
                "email": "lee@clinic.com",
                "displayName": "Dr. Lee",
                "idToken": "id-1",
                "refreshToken": "rt-1",
                "expiresIn": "1",
            })),
        )
    } else {
        (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": { "code": 400, "message": "EMAIL_NOT_FOUND" } })))
    }
}

async fn fake_refresh() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": { "code": 400, "message": "TOKEN_EXPIRED" } })))
}

async fn spawn_fake_toolkit() -> Arc<FirebaseConfig> {
    let app = Router::new()
        .route("/accounts:signInWithPassword", post(fake_sign_in))
        .route("/token", post(fake_refresh));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Arc::new(FirebaseConfig {
        api_key: "test-key".into(),
        auth_domain: "carealign.test".into(),
        project_id: "carealign".into(),
        identity_toolkit_url: format!("http://{addr}"),
        secure_token_url: format!("http://{addr}"),
    })
}

#[tokio::test]
async fn sign_in_publishes_identity_and_rejected_refresh_signs_out() {
    let config = spawn_fake_toolkit().await;
    let provider = FirebaseProvider::new(build_http_client().unwrap(), config);
    let mut feed = provider.subscribe();
    assert_eq!(feed.recv().await, Some(Ok(None)));

    let identity = provider
        .sign_in_with_credential(&Credentials::new("lee@clinic.com", "correct-horse"))
        .await
        .unwrap();
    assert_eq!(identity.uid, "uid-lee");
    assert_eq!(provider.id_token().as_deref(), Some("id-1"));
    assert_eq!(feed.recv().await, Some(Ok(Some(identity))));

    // expiresIn is one second, so the refresh runs and is rejected.
    let next = tokio::time::timeout(Duration::from_secs(5), feed.recv()).await.unwrap();
    assert_eq!(next, Some(Ok(None)));
    assert_eq!(provider.id_token(), None);
}

#[tokio::test]
async fn sign_in_rejection_is_mapped() {
    let config = spawn_fake_toolkit().await;
    let provider = FirebaseProvider::new(build_http_client().unwrap(), config);

    let err = provider
        .sign_in_with_credential(&Credentials::new("ghost@clinic.com", "whatever"))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::UnknownAccount);
    assert_eq!(provider.id_token(), None);
}

#[tokio::test]
async fn unreachable_toolkit_is_unavailable() {
    let config = Arc::new(FirebaseConfig {
        api_key: "k".into(),
        auth_domain: "d".into(),
        project_id: "p".into(),
        identity_toolkit_url: "http://127.0.0.1:1".into(),
        secure_token_url: "http://127.0.0.1:1".into(),
    });
    let provider = FirebaseProvider::new(build_http_client().unwrap(), config);
    let err = provider
        .sign_in_with_credential(&Credentials::new("lee@clinic.com", "correct-horse"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn sign_out_clears_tokens() {
    let config = spawn_fake_toolkit().await;
    let provider = FirebaseProvider::new(build_http_client().unwrap(), config);
    let mut feed = provider.subscribe();
    assert_eq!(feed.recv().await, Some(Ok(None)));

    provider
        .sign_in_with_credential(&Credentials::new("lee@clinic.com", "correct-horse"))
        .await
        .unwrap();
    assert!(matches!(feed.recv().await, Some(Ok(Some(_)))));

    provider.sign_out().await.unwrap();
    assert_eq!(feed.recv().await, Some(Ok(None)));
    assert_eq!(provider.id_token(), None);
}
