//! Persistence configuration for stored responses.

use serde::Deserialize;

/// Configuration for the `ResponseStore` backing the orchestrator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Connection string for the sqlite-backed store, e.g. `sqlite://nexus.db`. Absence is
    /// tolerated at startup: the store is connected lazily on the first call that actually needs
    /// it, and a connection failure at that point surfaces as a `server_error` instead of aborting
    /// the process.
    pub database_url: Option<String>,
}
