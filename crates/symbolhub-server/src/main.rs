//! # symbolhub-server
//!
//! HTTP API for the SymbolHub catalog.
//!
//! This binary provides:
//! - **Catalog API** (axum) for listing, reading, searching, creating and
//!   editing symbol art posts
//! - **Object storage** on the local filesystem for uploaded assets and
//!   their previews, with signed, expiring download URLs
//! - **Accounts** with argon2 password hashes and Ed25519-signed session
//!   tokens; requests without a token act as the anonymous user

mod api;
mod auth;
mod config;
mod db;
mod error;
mod object_store;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::auth::SessionKeys;
use crate::config::ServerConfig;
use crate::db::Db;
use crate::object_store::ObjectStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,symbolhub_server=debug,symbolhub_store=debug")
        }))
        .init();

    info!("Starting SymbolHub server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Catalog database (migrations run, ranking function registered)
    let db = Db::open(&config.database_path)?;

    // Object store (creates directories if missing)
    let objects = Arc::new(
        ObjectStore::new(
            config.object_storage_path.clone(),
            config.max_upload_size,
            config.url_signing_key,
            config.public_base_url.clone(),
        )
        .await?,
    );

    let sessions = Arc::new(SessionKeys::new(
        &config.session_signing_key,
        config.session_ttl_secs,
    ));

    let http_addr = config.http_addr;
    let app_state = AppState {
        db: db.clone(),
        objects,
        sessions,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server until it fails or Ctrl+C arrives
    // -----------------------------------------------------------------------
    let outcome = tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = &result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    // -----------------------------------------------------------------------
    // 5. Tear down
    // -----------------------------------------------------------------------
    // Waits for in-flight store calls to release the connection.
    db.close().await?;

    outcome
}
