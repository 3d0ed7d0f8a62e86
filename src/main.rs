use carealign::config::AppConfig;
use carealign::{routes, services, state};

#[tokio::main]
async fn main() {
    // A missing .env file is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let state = state::AppState::from_config(config).expect("identity provider init failed");
    match &state.providers {
        state::ProviderFactory::Memory(_) => tracing::info!("using in-memory identity provider"),
        state::ProviderFactory::Firebase { config, .. } => {
            tracing::info!(project_id = %config.project_id, "using firebase identity provider");
        }
    }

    // Spawn background visitor sweep.
    let _sweep = services::visitors::spawn_sweep_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "carealign listening");
    axum::serve(listener, app).await.expect("server failed");
}
