use serde::Deserialize;

use super::ExportersConfig;

/// Metrics export configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Exporters to use for metrics. Falls back to the global exporters when unset.
    pub exporters: Option<ExportersConfig>,
}

impl MetricsConfig {
    /// The configured exporters, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
