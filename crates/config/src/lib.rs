//! Nexus configuration structures to map the nexus.toml configuration.

#![deny(missing_docs)]

mod error;
mod health;
mod http_types;
mod loader;
mod providers;
mod server;
mod store;
mod telemetry;
mod tls;

use std::path::Path;

pub use error::Error;
pub use health::HealthConfig;
pub use http_types::{HeaderName, HeaderValue};
pub use providers::{AnthropicProviderConfig, OpenAiCompatibleProviderConfig, ProviderConfig, ProvidersConfig};
use serde::Deserialize;
pub use server::ServerConfig;
pub use store::StoreConfig;
pub use telemetry::TelemetryConfig;
pub use telemetry::exporters::{
    ExportersConfig, GrpcHeaders, HttpHeaders, OtlpExporterConfig, OtlpGrpcConfig, OtlpHttpConfig, OtlpProtocol,
};
pub use telemetry::logs::LogsConfig;
pub use telemetry::metrics::MetricsConfig;
pub use telemetry::tracing::TracingConfig;
pub use tls::TlsServerConfig;

/// Main configuration structure for the Nexus Responses API proxy.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// Persistence configuration for the response store.
    pub store: StoreConfig,
    /// Backend provider configuration, keyed by provider id.
    pub providers: ProvidersConfig,
    /// Telemetry configuration settings.
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates that the configuration has at least one functional backend provider.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate_has_providers(self)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                listen_address: None,
                tls: None,
                health: HealthConfig {
                    enabled: true,
                    listen: None,
                    path: "/health",
                },
                api_keys: [],
            },
            store: StoreConfig {
                database_url: None,
            },
            providers: {},
            telemetry: TelemetryConfig {
                service_name: None,
                resource_attributes: {},
                exporters: ExportersConfig {
                    otlp: OtlpExporterConfig {
                        enabled: false,
                        endpoint: Url {
                            scheme: "http",
                            cannot_be_a_base: false,
                            username: "",
                            password: None,
                            host: Some(
                                Domain(
                                    "localhost",
                                ),
                            ),
                            port: Some(
                                4317,
                            ),
                            path: "/",
                            query: None,
                            fragment: None,
                        },
                        protocol: Grpc,
                        timeout: 60s,
                        batch_export: BatchExportConfig {
                            scheduled_delay: 5s,
                            max_queue_size: 2048,
                            max_export_batch_size: 512,
                            max_concurrent_exports: 1,
                        },
                        grpc: None,
                        http: None,
                    },
                },
                tracing: TracingConfig {
                    sampling: 0.15,
                    parent_based_sampler: false,
                    exporters: None,
                },
                metrics: MetricsConfig {
                    exporters: None,
                },
                logs: LogsConfig {
                    exporters: None,
                },
            },
        }
        "#);
    }
}
