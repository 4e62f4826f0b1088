pub mod routes;

use crate::config::Config;
use crate::db::Database;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn run_server(config: Arc<Config>) -> Result<()> {
    let timestamps = Database::open(&config.db_path)?.timestamp_range()?;
    info!(
        first = ?timestamps.first_timestamp,
        last = ?timestamps.last_timestamp,
        "timestamps fetched"
    );

    let addr: SocketAddr = format!("{}:{}", config.api_host, config.api_port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid API bind address: {}:{}",
                config.api_host, config.api_port
            )
        })?;

    let state = routes::ApiState {
        config,
        timestamps: Arc::new(timestamps),
    };
    let app: Router = routes::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "trackload API server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}
