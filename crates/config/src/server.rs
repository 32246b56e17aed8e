//! HTTP server configuration settings.

use std::net::SocketAddr;

use secrecy::SecretString;
use serde::Deserialize;

use crate::{HealthConfig, TlsServerConfig};

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// TLS configuration for secure connections.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    pub health: HealthConfig,
    /// Bearer tokens accepted on the `Authorization` header.
    ///
    /// Empty means the server is unauthenticated; this should only be used behind a trusted
    /// network boundary.
    pub api_keys: Vec<SecretString>,
}
