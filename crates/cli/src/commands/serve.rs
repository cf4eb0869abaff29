use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use warden_core::config::WardenConfig;
use warden_core::models::mapping::GroupMappings;
use warden_core::roster::rows::parse_mappings;
use warden_scim::service::ScimService;
use warden_server::AppState;
use warden_sync::client::DirectoryClient;
use warden_sync::engine::SyncEngine;
use warden_sync::store::ResultStore;

/// Run the `serve` command: start the sync and SCIM web service.
pub async fn run(config_path: &str, port: Option<u16>) -> anyhow::Result<()> {
    let config = WardenConfig::load(Path::new(config_path))?;
    config.validate()?;

    let client = DirectoryClient::new(&config.directory);
    let engine = Arc::new(SyncEngine::new(client));

    let store = if config.storage.enabled {
        Some(Arc::new(ResultStore::from_config(&config.storage)?))
    } else {
        None
    };

    // The SCIM Groups surface mirrors the group-mapping table, loaded once at
    // startup from the configured mapping key.
    let mappings = match &store {
        Some(store) => match store.fetch_mapping().await {
            Ok(bytes) => parse_mappings(&bytes)?,
            Err(e) => {
                warn!(error = %e, "could not load group mappings; SCIM Groups will be empty");
                GroupMappings::new()
            }
        },
        None => GroupMappings::new(),
    };
    info!(groups = mappings.len(), "loaded group mappings for SCIM");

    let scim = Arc::new(ScimService::new(engine.clone(), mappings));
    let state = Arc::new(AppState {
        config: config.clone(),
        engine,
        store,
    });

    // Add security headers
    let app = warden_server::router(state, scim)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    let port = port.unwrap_or(config.warden.listen_port);
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    println!("Warden listening on http://{}", addr);
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
