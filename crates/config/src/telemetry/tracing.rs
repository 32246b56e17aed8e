use serde::Deserialize;

use super::ExportersConfig;

/// Distributed tracing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// Fraction of requests sampled, between 0.0 and 1.0.
    pub sampling: f64,
    /// Whether to respect the parent span's sampling decision when present.
    pub parent_based_sampler: bool,
    /// Exporters to use for traces. Falls back to the global exporters when unset.
    pub exporters: Option<ExportersConfig>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            sampling: 0.15,
            parent_based_sampler: false,
            exporters: None,
        }
    }
}

impl TracingConfig {
    /// The configured exporters, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
