//! End-to-end harness: boots a real Nexus server, backed by a fake upstream Anthropic server, and
//! drives it over HTTP exactly as a client would.
//!
//! Mirrors the shape of a production integration-test crate: a `TestServer` that owns a live
//! listener and a background task, plus small request-building helpers on top of `reqwest`. There
//! is no MCP, rate-limiting, or multi-service orchestration here — this crate only proves out the
//! Responses API surface the orchestrator implements.

mod fake_anthropic;

pub use fake_anthropic::{FakeAnthropicServer, Script, complete_text_response, text_stream, tool_call_stream};

use std::{net::SocketAddr, sync::Arc};

use config::{AnthropicProviderConfig, Config};
use orchestrator::{ConnectedStore, ModelRegistration, OrchestratorService, Resolver, registrations_from_models};
use providers::{AnthropicAdapter, ProviderAdapter};
use secrecy::SecretString;
use serde_json::Value;
use server::ServeConfig;
use store::SqliteStore;
use tokio_util::sync::CancellationToken;

/// A running Nexus server wired to a [`FakeAnthropicServer`], reachable over real HTTP.
///
/// Dropping this stops the server task and the fake upstream.
pub struct TestServer {
    address: SocketAddr,
    client: reqwest::Client,
    api_key: Option<String>,
    shutdown: CancellationToken,
    _upstream: FakeAnthropicServer,
    _db_dir: tempfile::TempDir,
}

impl TestServer {
    /// Starts a server with a single registered model, `claude-sonnet-4-responses`, backed by a
    /// fresh [`FakeAnthropicServer`]. No API key is required unless `with_api_key` is used first.
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder { api_keys: Vec::new() }
    }

    /// The server's bound socket address, for tests that need to build their own requests.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Queues the next reply the fake upstream will give to `POST /v1/messages`.
    pub fn push_script(&self, script: Script) {
        self._upstream.push(script);
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// `POST /v1/responses`.
    pub async fn create_response(&self, body: Value) -> reqwest::Response {
        self.request(self.client.post(self.url("/v1/responses")).json(&body))
            .send()
            .await
            .expect("request should reach the server")
    }

    /// `POST /v1/responses/compact`.
    pub async fn compact_response(&self, body: Value) -> reqwest::Response {
        self.request(self.client.post(self.url("/v1/responses/compact")).json(&body))
            .send()
            .await
            .expect("request should reach the server")
    }

    /// `GET /v1/responses/{id}`.
    pub async fn get_response(&self, id: &str) -> reqwest::Response {
        self.request(self.client.get(self.url(&format!("/v1/responses/{id}"))))
            .send()
            .await
            .expect("request should reach the server")
    }

    /// `DELETE /v1/responses/{id}`.
    pub async fn delete_response(&self, id: &str) -> reqwest::Response {
        self.request(self.client.delete(self.url(&format!("/v1/responses/{id}"))))
            .send()
            .await
            .expect("request should reach the server")
    }

    /// `POST /v1/responses/{id}/cancel`.
    pub async fn cancel_response(&self, id: &str) -> reqwest::Response {
        self.request(self.client.post(self.url(&format!("/v1/responses/{id}/cancel"))))
            .send()
            .await
            .expect("request should reach the server")
    }

    /// `GET /v1/models`.
    pub async fn list_models(&self) -> reqwest::Response {
        self.request(self.client.get(self.url("/v1/models")))
            .send()
            .await
            .expect("request should reach the server")
    }

    /// Reads an SSE response body and splits it into `(event name, data payload)` frames,
    /// stopping at the literal `[DONE]` sentinel.
    pub async fn parse_sse(response: reqwest::Response) -> Vec<(String, Value)> {
        let body = response.text().await.expect("response body should be readable");

        let mut frames = Vec::new();

        for frame in body.split("\n\n") {
            let frame = frame.trim();
            if frame.is_empty() {
                continue;
            }

            let mut event_name = None;
            let mut data = None;

            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    event_name = Some(rest.to_string());
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    data = Some(rest.to_string());
                }
            }

            match (event_name, data) {
                (Some(name), Some(data)) => {
                    let value: Value = serde_json::from_str(&data).unwrap_or_else(|_| Value::String(data));
                    frames.push((name, value));
                }
                (None, Some(data)) if data.trim() == "[DONE]" => break,
                _ => {}
            }
        }

        frames
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Builds a [`TestServer`], letting tests opt into bearer-token authentication before starting
/// the server.
pub struct TestServerBuilder {
    api_keys: Vec<String>,
}

impl TestServerBuilder {
    /// Requires the given bearer token on every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.push(key.into());
        self
    }

    /// Starts the fake upstream and the Nexus server, and waits for the server to become
    /// reachable.
    pub async fn start(self) -> TestServer {
        let upstream = FakeAnthropicServer::start().await;

        let db_dir = tempfile::tempdir().expect("should create a temp dir for the response store");
        let db_path = db_dir.path().join("responses.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let store = SqliteStore::connect(&database_url)
            .await
            .expect("sqlite store should connect");

        let anthropic_config = AnthropicProviderConfig {
            base_url: upstream.base_url.clone(),
            api_key: Some(SecretString::from("fake-upstream-key".to_string())),
            api_version: "2023-06-01".to_string(),
        };

        let adapter: Arc<dyn ProviderAdapter> = Arc::new(AnthropicAdapter::new("anthropic".to_string(), anthropic_config));

        let models = adapter
            .list_models()
            .await
            .expect("fake upstream should answer GET /v1/models");

        let registrations: Vec<ModelRegistration> = registrations_from_models(models, adapter, "-responses");

        let resolver = Arc::new(Resolver::new(registrations, 0));
        let store_provider: Arc<dyn orchestrator::StoreProvider> = Arc::new(ConnectedStore::new(Arc::new(store)));
        let orchestrator = Arc::new(OrchestratorService::new(resolver.clone(), Some(store_provider)));

        let mut config = Config::default();
        config.server.api_keys = self.api_keys.iter().map(|key| SecretString::from(key.clone())).collect();
        config.store.database_url = Some(database_url);

        let shutdown = CancellationToken::new();
        let (bound_addr_tx, bound_addr_rx) = tokio::sync::oneshot::channel();

        let serve_config = ServeConfig {
            listen_address: "127.0.0.1:0".parse().unwrap(),
            config,
            orchestrator,
            resolver,
            shutdown_signal: shutdown.clone(),
            log_filter: "info".to_string(),
            version: "test".to_string(),
            bound_addr_sender: Some(bound_addr_tx),
        };

        tokio::spawn(async move {
            if let Err(error) = server::serve(serve_config).await {
                log::error!("test server exited with an error: {error}");
            }
        });

        let address = bound_addr_rx.await.expect("server should report its bound address");

        let client = reqwest::Client::new();

        for _ in 0..50 {
            let ready = client
                .get(format!("http://{address}/health"))
                .send()
                .await
                .map(|response| response.status().is_success())
                .unwrap_or(false);

            if ready {
                break;
            }

            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        TestServer {
            address,
            client,
            api_key: self.api_keys.first().cloned(),
            shutdown,
            _upstream: upstream,
            _db_dir: db_dir,
        }
    }
}
