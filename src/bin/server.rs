//! Planning API server entry point.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use vwp_rust::db;
use vwp_rust::http::{build_router, AppState};
use vwp_rust::settings::SolverSettings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    db::init_repository()?;
    let repo = db::get_repository()?.clone();
    let settings = SolverSettings::from_env();
    let state = AppState::new(repo, settings);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "planning server listening");

    axum::serve(listener, build_router(state)).await.context("server error")?;
    Ok(())
}
