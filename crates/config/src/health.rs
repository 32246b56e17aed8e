//! Health endpoint configuration.

use std::net::SocketAddr;

use serde::Deserialize;

/// Health check endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    pub enabled: bool,
    /// Optional separate listen address for the health endpoint.
    /// When unset, the health endpoint is mounted on the main server.
    pub listen: Option<SocketAddr>,
    /// Path at which the health endpoint is mounted.
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: None,
            path: "/health".to_string(),
        }
    }
}
