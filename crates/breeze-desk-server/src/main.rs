use anyhow::{Context, Result};
use breeze_desk_server::config::Config;
use breeze_desk_server::{AppState, app_router, init_tracing};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(&config);

    let state = AppState::from_config(&config);
    let router = app_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!("Listening on {}", config.listen);
    axum::serve(listener, router).await?;
    Ok(())
}
