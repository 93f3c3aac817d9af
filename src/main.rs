mod access;
mod app;
mod auth;
mod backend;
mod config;
mod db;
mod envelope;
mod error;
mod state;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tiergate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error; shutting down");
            return Err(e.into());
        }
    };
    let app_state = AppState::init(config).await?;
    let addr = app_state.config.listen_addr()?;
    tracing::info!(backend = %app_state.config.backend.base_url, "upstream configured");
    app::serve(app::build_app(app_state), addr).await
}
