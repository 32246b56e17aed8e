//! Liveness endpoint, optionally served on a separate listener from the main API.

use std::net::SocketAddr;

use anyhow::anyhow;
use axum::{Router, http::StatusCode, routing::get};
use config::TlsServerConfig;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Binds and serves the health endpoint on its own listener, for deployments that want liveness
/// checks reachable without going through the main authenticated router.
pub async fn bind_health_endpoint(listen: SocketAddr, tls: Option<TlsServerConfig>, path: String) -> anyhow::Result<()> {
    let router = Router::new().route(&path, get(health));

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| anyhow!("failed to bind health endpoint to {listen}: {e}"))?;

    match tls {
        Some(tls) => {
            let rustls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.certificate, &tls.key)
                .await
                .map_err(|e| anyhow!("failed to load TLS certificate and key for health endpoint: {e}"))?;

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(router.into_make_service())
                .await
                .map_err(|e| anyhow!("health endpoint server error: {e}"))
        }
        None => axum::serve(listener, router.into_make_service())
            .await
            .map_err(|e| anyhow!("health endpoint server error: {e}")),
    }
}
