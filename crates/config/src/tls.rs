//! TLS configuration for the server's listening socket.

use serde::Deserialize;

/// TLS configuration for secure connections.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Path to the PEM-encoded certificate chain.
    pub certificate: String,
    /// Path to the PEM-encoded private key.
    pub key: String,
}
