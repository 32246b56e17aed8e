//! Backend provider configuration.
//!
//! Each entry under `[providers.<id>]` resolves a model identifier used in a Responses API
//! request (`<id>/<model>`, following the convention set by the orchestrator's resolver) to a
//! concrete upstream adapter and connection details.

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// The full table of configured backend providers, keyed by provider id.
pub type ProvidersConfig = IndexMap<String, ProviderConfig>;

/// Configuration for a single backend provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProviderConfig {
    /// An Anthropic Messages API-compatible backend.
    Anthropic(AnthropicProviderConfig),
    /// A generic OpenAI chat-completions-compatible backend.
    OpenAiCompatible(OpenAiCompatibleProviderConfig),
}

impl ProviderConfig {
    /// The base URL this provider should be reached at.
    pub fn base_url(&self) -> &Url {
        match self {
            ProviderConfig::Anthropic(config) => &config.base_url,
            ProviderConfig::OpenAiCompatible(config) => &config.base_url,
        }
    }

    /// The API key used to authenticate against the upstream, if any.
    pub fn api_key(&self) -> Option<&SecretString> {
        match self {
            ProviderConfig::Anthropic(config) => config.api_key.as_ref(),
            ProviderConfig::OpenAiCompatible(config) => config.api_key.as_ref(),
        }
    }
}

/// Configuration for an Anthropic Messages API backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnthropicProviderConfig {
    /// Base URL of the Anthropic API, e.g. `https://api.anthropic.com`.
    pub base_url: Url,
    /// API key sent as `x-api-key`.
    pub api_key: Option<SecretString>,
    /// `anthropic-version` header value.
    pub api_version: String,
}

impl Default for AnthropicProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.anthropic.com").expect("default URL should be valid"),
            api_key: None,
            api_version: "2023-06-01".to_string(),
        }
    }
}

/// Configuration for an OpenAI-compatible chat-completions backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiCompatibleProviderConfig {
    /// Base URL of the chat-completions API, e.g. `https://api.openai.com/v1`.
    pub base_url: Url,
    /// API key sent as a `Bearer` token.
    pub api_key: Option<SecretString>,
}

impl Default for OpenAiCompatibleProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.openai.com/v1").expect("default URL should be valid"),
            api_key: None,
        }
    }
}
