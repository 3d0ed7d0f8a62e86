use super::*;
use crate::session::Session;

#[tokio::test]
async fn memory_factory_seeds_demo_account() {
    let state = test_helpers::test_app_state();
    let ProviderFactory::Memory(directory) = &state.providers else {
        panic!("expected memory provider");
    };
    assert_eq!(directory.len(), 1);
    assert!(directory.verify(&test_helpers::demo_credentials()).is_ok());
}

#[tokio::test]
async fn memory_factory_without_demo_account_is_empty() {
    let factory = ProviderFactory::from_config(&ProviderKind::Memory { demo_account: None }).unwrap();
    let ProviderFactory::Memory(directory) = factory else {
        panic!("expected memory provider");
    };
    assert!(directory.is_empty());
}

#[tokio::test]
async fn invalid_demo_account_is_skipped() {
    let kind = ProviderKind::Memory { demo_account: Some(("not-an-email".into(), "whatever-long".into())) };
    let ProviderFactory::Memory(directory) = ProviderFactory::from_config(&kind).unwrap() else {
        panic!("expected memory provider");
    };
    assert!(directory.is_empty());
}

#[tokio::test]
async fn firebase_factory_builds() {
    let kind = ProviderKind::Firebase(FirebaseConfig {
        api_key: "key".into(),
        auth_domain: "carealign.firebaseapp.com".into(),
        project_id: "carealign".into(),
        identity_toolkit_url: "http://127.0.0.1:1".into(),
        secure_token_url: "http://127.0.0.1:1".into(),
    });
    assert!(matches!(ProviderFactory::from_config(&kind).unwrap(), ProviderFactory::Firebase { .. }));
}

#[tokio::test]
async fn each_store_has_its_own_session() {
    let state = test_helpers::test_app_state();
    let first = state.new_session_store();
    let second = state.new_session_store();
    assert_eq!(first.ready().await, Ok(None));
    assert_eq!(second.ready().await, Ok(None));

    first.sign_in(&test_helpers::demo_credentials()).await.unwrap();
    assert!(first.wait_until(Session::is_signed_in, std::time::Duration::from_secs(1)).await.is_some());
    assert_eq!(second.snapshot(), Session::SignedOut);
}

#[tokio::test]
async fn auth_flow_uses_configured_landing() {
    let mut state = test_helpers::test_app_state();
    let mut config = (*state.config).clone();
    config.default_landing = "/dashboard".into();
    state.config = Arc::new(config);

    let store = Arc::new(state.new_session_store());
    let flow = state.auth_flow(store);
    let dest = flow
        .submit(crate::signin::AuthMode::SignIn, &test_helpers::demo_credentials(), None)
        .await
        .unwrap();
    assert_eq!(dest, "/dashboard");
}
