use serde::Deserialize;

use super::ExportersConfig;

/// Log export configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LogsConfig {
    /// Exporters to use for logs. Falls back to the global exporters when unset.
    pub exporters: Option<ExportersConfig>,
}

impl LogsConfig {
    /// The configured exporters, if any.
    pub fn exporters(&self) -> Option<&ExportersConfig> {
        self.exporters.as_ref()
    }
}
