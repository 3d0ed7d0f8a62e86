use std::sync::Mutex;

use super::*;
use crate::identity::ProviderError;
use crate::identity::memory::MemoryDirectory;
use crate::session::Session;

const OBSERVE: Duration = Duration::from_secs(1);

struct RecordingNavigator {
    path: Mutex<String>,
    replaced: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn at(path: &str) -> Self {
        Self { path: Mutex::new(path.to_string()), replaced: Mutex::new(Vec::new()) }
    }

    fn replaced(&self) -> Vec<String> {
        self.replaced.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap().clone()
    }

    fn replace(&self, path: &str) {
        self.replaced.lock().unwrap().push(path.to_string());
        *self.path.lock().unwrap() = path.to_string();
    }
}

fn lee() -> Credentials {
    Credentials::new("lee@clinic.com", "correct-horse")
}

async fn flow_with_lee() -> (AuthFlow, Arc<SessionStore>) {
    let dir = MemoryDirectory::new();
    dir.register(&lee()).unwrap();
    let store = Arc::new(SessionStore::new(Arc::new(dir.client()), OBSERVE));
    store.initialize();
    store.ready().await.unwrap();
    (AuthFlow::new(Arc::clone(&store), "/analysis", OBSERVE), store)
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn validate_normalizes_email() {
    let creds = validate(AuthMode::SignIn, &Credentials::new("  Lee@Clinic.COM ", "x")).unwrap();
    assert_eq!(creds.email, "lee@clinic.com");
}

#[test]
fn validate_rejects_bad_email() {
    let err = validate(AuthMode::SignIn, &Credentials::new("not-an-email", "secret")).unwrap_err();
    assert_eq!(err, FormError::InvalidEmail);
    assert_eq!(err.user_message(), "Enter a valid email address.");
}

#[test]
fn validate_sign_in_requires_password() {
    let err = validate(AuthMode::SignIn, &Credentials::new("lee@clinic.com", "")).unwrap_err();
    assert_eq!(err, FormError::MissingPassword);
}

#[test]
fn validate_sign_up_password_length() {
    assert_eq!(
        validate(AuthMode::SignUp, &Credentials::new("lee@clinic.com", "1234567")).unwrap_err(),
        FormError::PasswordTooShort
    );
    assert!(validate(AuthMode::SignUp, &Credentials::new("lee@clinic.com", "12345678")).is_ok());
}

#[test]
fn password_length_message_names_minimum() {
    let message = FormError::PasswordTooShort.user_message();
    assert!(message.contains(&format!("at least {MIN_PASSWORD_LEN} characters")), "{message}");
}

#[test]
fn validate_sign_in_accepts_short_password() {
    assert!(validate(AuthMode::SignIn, &Credentials::new("lee@clinic.com", "abc")).is_ok());
}

// =============================================================================
// submit
// =============================================================================

#[tokio::test]
async fn sign_in_without_intent_lands_on_default() {
    let (flow, store) = flow_with_lee().await;
    assert_eq!(flow.submit(AuthMode::SignIn, &lee(), None).await.unwrap(), "/analysis");
    assert!(store.snapshot().is_signed_in());
}

#[tokio::test]
async fn sign_in_honours_intent() {
    let (flow, _store) = flow_with_lee().await;
    let intent = RedirectIntent::new("/history?page=2");
    assert_eq!(flow.submit(AuthMode::SignIn, &lee(), Some(&intent)).await.unwrap(), "/history?page=2");
}

#[tokio::test]
async fn rejected_credentials_show_message_and_keep_session() {
    let (flow, store) = flow_with_lee().await;
    let err = flow
        .submit(AuthMode::SignIn, &Credentials::new("lee@clinic.com", "wrong"), None)
        .await
        .unwrap_err();
    assert_eq!(err, FormError::Auth(AuthError::Authentication(ProviderError::InvalidCredential)));
    assert_eq!(err.user_message(), "Unable to sign in with those credentials. Please try again.");
    assert_eq!(store.snapshot(), Session::SignedOut);
}

#[tokio::test]
async fn sign_up_creates_and_signs_in() {
    let (flow, store) = flow_with_lee().await;
    let dest = flow
        .submit(AuthMode::SignUp, &Credentials::new("new@clinic.com", "long-enough"), None)
        .await
        .unwrap();
    assert_eq!(dest, "/analysis");
    assert_eq!(store.snapshot().identity().and_then(|i| i.email.clone()), Some("new@clinic.com".into()));
}

#[tokio::test]
async fn sign_up_duplicate_message() {
    let (flow, _store) = flow_with_lee().await;
    let err = flow.submit(AuthMode::SignUp, &lee(), None).await.unwrap_err();
    assert_eq!(err.user_message(), "An account with that email already exists. Try signing in instead.");
}

#[tokio::test]
async fn switching_accounts_waits_for_new_identity() {
    let dir = MemoryDirectory::new();
    dir.register(&lee()).unwrap();
    let sam = Credentials::new("sam@clinic.com", "battery-staple");
    dir.register(&sam).unwrap();
    let store = Arc::new(SessionStore::new(Arc::new(dir.client()), OBSERVE));
    store.initialize();
    store.ready().await.unwrap();
    let flow = AuthFlow::new(Arc::clone(&store), "/analysis", OBSERVE);

    flow.submit(AuthMode::SignIn, &lee(), None).await.unwrap();
    flow.submit(AuthMode::SignIn, &sam, None).await.unwrap();
    assert_eq!(store.snapshot().identity().and_then(|i| i.email.clone()), Some("sam@clinic.com".into()));
}

#[tokio::test]
async fn unobserved_sign_in_is_an_error() {
    let (flow, store) = flow_with_lee().await;
    store.shutdown();
    let err = flow.submit(AuthMode::SignIn, &lee(), None).await.unwrap_err();
    assert_eq!(err, FormError::NotObserved(OBSERVE));
}

// =============================================================================
// submit_and_navigate / bounce_if_signed_in
// =============================================================================

#[tokio::test]
async fn login_round_trip_returns_to_requested_destination() {
    let (flow, _store) = flow_with_lee().await;
    let intent = RedirectIntent::new("/analysis");
    let nav = RecordingNavigator::at(&intent.sign_in_url("/login"));
    assert_eq!(nav.current_path(), "/login?redirectTo=%2Fanalysis");

    let dest = flow.submit_and_navigate(AuthMode::SignIn, &lee(), &nav).await.unwrap();
    assert_eq!(dest, "/analysis");
    assert_eq!(nav.replaced(), vec!["/analysis".to_string()]);
}

#[tokio::test]
async fn failed_submit_does_not_navigate() {
    let (flow, _store) = flow_with_lee().await;
    let nav = RecordingNavigator::at("/login?redirectTo=%2Fdashboard");
    let result = flow
        .submit_and_navigate(AuthMode::SignIn, &Credentials::new("lee@clinic.com", "nope"), &nav)
        .await;
    assert!(result.is_err());
    assert!(nav.replaced().is_empty());
}

#[tokio::test]
async fn bounce_only_when_signed_in() {
    let (flow, _store) = flow_with_lee().await;
    assert_eq!(flow.bounce_if_signed_in(None).await, None);

    flow.submit(AuthMode::SignIn, &lee(), None).await.unwrap();
    let intent = RedirectIntent::new("/dashboard");
    assert_eq!(flow.bounce_if_signed_in(Some(&intent)).await, Some("/dashboard".into()));
}
