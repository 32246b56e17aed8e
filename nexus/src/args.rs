use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the Nexus Responses API proxy.
#[derive(Debug, Parser)]
#[command(name = "nexus", version, about = "OpenAI Responses API proxy")]
pub struct Args {
    /// Path to the configuration TOML file.
    #[arg(short, long, env = "NEXUS_CONFIG", default_value = "nexus.toml")]
    pub config: PathBuf,

    /// Log filter string, e.g. "info" or "server=debug,orchestrator=debug".
    #[arg(long, env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}
