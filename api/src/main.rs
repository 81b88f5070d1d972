use anyhow::Context;
use clap::Parser;
use std::future::IntoFuture;
use templog_api::{config::Config, db::Database, rest};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Variables already set in the process environment win over `.env`.
    let env_file = dotenvy::dotenv().ok();
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Temperature Logger API");
    if let Some(path) = &env_file {
        info!("Loaded variables from {}", path.display());
    }
    info!("HTTP server: {}", config.http_addr);
    info!("Database: {}", config.database_label());
    match config.ssl_ca() {
        Some(ca) => info!("Database TLS enabled with CA bundle {}", ca.display()),
        None => info!("Database TLS not configured"),
    }

    let app = rest::create_router(Database::new(config.connect_options()));

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.http_addr))?;

    info!("HTTP server listening on {}", config.http_addr);

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result.context("HTTP server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}
