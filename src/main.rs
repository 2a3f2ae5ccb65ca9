//! Agua Bot - citizen water assistant
//!
//! A Rust backend running one scripted conversation state machine per
//! session: order water deliveries, report incidents, consult prices.

mod api;
mod config;
mod db;
mod runtime;
mod state_machine;
mod transcript;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agua_bot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    if config.seed_providers {
        let seeded = db.seed_demo_providers()?;
        if seeded > 0 {
            tracing::info!(count = seeded, "Seeded demo providers");
        }
    }

    tracing::info!(
        pacing = ?config.pacing,
        order_liters = config.order_liters,
        subsidy_percent = config.subsidy_percent,
        "Session settings loaded"
    );
    let state = AppState::new(db, config.session_settings());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Agua Bot server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
