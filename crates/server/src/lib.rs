//! Nexus server library.
//!
//! Provides a reusable server function to serve Nexus either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod auth;
mod error;
mod health;
mod logger;
mod responses;
mod tracing;

use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use auth::AuthLayer;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use orchestrator::OrchestratorService;
use responses::AppState;
use telemetry::TelemetryGuard;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::tracing::TracingLayer;

/// Configuration for serving Nexus.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Nexus TOML configuration.
    pub config: Config,
    /// The orchestrator service backing the Responses API surface.
    pub orchestrator: Arc<OrchestratorService>,
    /// The model registry backing `/v1/models`.
    pub resolver: Arc<orchestrator::Resolver>,
    /// Cancellation token for graceful shutdown
    pub shutdown_signal: CancellationToken,
    /// Log filter string (e.g., "info" or "server=debug,orchestrator=debug")
    pub log_filter: String,
    /// The version string to log on startup
    pub version: String,
    /// Optional oneshot sender to send back the bound address (useful if port 0 was specified)
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Starts and runs the Nexus server with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        orchestrator,
        resolver,
        shutdown_signal,
        log_filter,
        version,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    let _telemetry_guard = init_otel(&config, log_filter).await;

    // Log the version as the first message after logger initialization
    log::info!("Nexus {version}");

    let state = AppState {
        orchestrator,
        resolver,
        shutdown_signal: shutdown_signal.clone(),
    };

    let cors = CorsLayer::permissive();
    let auth_layer = AuthLayer::new(config.server.api_keys.clone());
    let tracing_layer = TracingLayer::with_config(Arc::new(config.telemetry.clone()));

    let protected = responses::protected_router()
        .layer(tower::ServiceBuilder::new().layer(auth_layer).layer(tracing_layer.clone()));

    let public = responses::public_router().layer(tower::ServiceBuilder::new().layer(tracing_layer));

    let mut app = Router::new().merge(protected).merge(public).layer(cors.clone()).with_state(state);

    if config.server.health.enabled && config.server.health.listen.is_none() {
        let health_router = Router::new()
            .route(&config.server.health.path, axum::routing::get(health::health))
            .layer(cors);

        app = app.merge(health_router);
    }

    if let Some(listen) = config.server.health.listen {
        let path = config.server.health.path.clone();
        let tls = config.server.tls.clone();
        tokio::spawn(async move {
            if let Err(e) = health::bind_health_endpoint(listen, tls, path).await {
                log::error!("health endpoint failed: {e}");
            }
        });
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    if let Some(sender) = bound_addr_sender {
        sender
            .send(listener.local_addr()?)
            .expect("Failed to send back bound address.");
    }

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Responses API endpoint: https://{listen_address}/v1/responses");

            let server = axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());

            tokio::select! {
                result = server => {
                    result.map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                    // The TelemetryGuard will be dropped when this function returns
                }
            }
        }
        None => {
            log::info!("Responses API endpoint: http://{listen_address}/v1/responses");

            tokio::select! {
                result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
                    result.map_err(|e| anyhow!("Failed to start HTTP server: {}", e))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                    // The TelemetryGuard will be dropped when this function returns
                }
            }
        }
    }

    Ok(())
}

async fn init_otel(config: &Config, log_filter: String) -> Option<TelemetryGuard> {
    // Don't let telemetry code log during initialization to avoid recursion
    match telemetry::init(&config.telemetry).await {
        Ok(guard) => {
            // Initialize logger with OTEL appender if logs are enabled
            let otel_appender = guard.logs_appender().cloned();
            logger::init(&log_filter, otel_appender);

            Some(guard)
        }
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {e}");
            // Initialize logger without OTEL
            logger::init(&log_filter, None);

            None
        }
    }
}
