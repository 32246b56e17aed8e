mod args;

use std::{net::SocketAddr, sync::Arc};

use args::Args;
use clap::Parser;
use config::{Config, ProviderConfig};
use orchestrator::{registrations_from_models, ModelRegistration, Resolver};
use providers::{AnthropicAdapter, OpenAiAdapter, ProviderAdapter};
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to load configuration from {}: {error}", args.config.display());
            std::process::exit(1);
        }
    };

    if let Err(error) = config.validate() {
        eprintln!("Invalid configuration: {error}");
        std::process::exit(1);
    }

    let registrations = build_registrations(&config).await?;
    eprintln!("registered {} model(s) across {} provider(s)", registrations.len(), config.providers.len());
    let resolver = Arc::new(Resolver::new(registrations, now()));

    let store_provider: Arc<dyn orchestrator::StoreProvider> = Arc::new(store::LazyStore::new(config.store.database_url.clone()));
    let service = Arc::new(orchestrator::OrchestratorService::new(resolver.clone(), Some(store_provider)));

    let listen_address = config.server.listen_address.unwrap_or_else(|| {
        DEFAULT_LISTEN_ADDRESS
            .parse::<SocketAddr>()
            .expect("default listen address is valid")
    });

    let shutdown_signal = CancellationToken::new();
    let shutdown_signal_for_ctrlc = shutdown_signal.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_signal_for_ctrlc.cancel();
        }
    });

    server::serve(ServeConfig {
        listen_address,
        config,
        orchestrator: service,
        resolver,
        shutdown_signal,
        log_filter: args.log_filter,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await?;

    fastrace::flush();

    Ok(())
}

/// Builds the model registry from every configured provider by constructing its adapter and
/// asking it for the models it exposes.
async fn build_registrations(config: &Config) -> anyhow::Result<Vec<ModelRegistration>> {
    let mut registrations = Vec::new();

    for (id, provider_config) in &config.providers {
        let adapter: Arc<dyn ProviderAdapter> = match provider_config {
            ProviderConfig::Anthropic(anthropic) => Arc::new(AnthropicAdapter::new(id.clone(), anthropic.clone())),
            ProviderConfig::OpenAiCompatible(openai) => Arc::new(OpenAiAdapter::new(id.clone(), openai.clone())),
        };

        let models = adapter.list_models().await.map_err(|e| anyhow::anyhow!("provider `{id}` failed to list models: {e}"))?;

        registrations.extend(registrations_from_models(models, adapter, "-responses"));
    }

    Ok(registrations)
}

fn now() -> i64 {
    jiff::Timestamp::now().as_second()
}
