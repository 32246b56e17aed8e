//! Maps a public Responses API model id to a cached adapter instance and the underlying
//! provider-side model name.
//!
//! Built once at startup from the provider table in configuration and held for the process
//! lifetime: read-mostly state in the same spirit as a pattern-route table, just keyed by the
//! full `<id>-responses` public name rather than a `provider/model` split, since the Responses
//! API surface has no multi-protocol prefix convention.

use std::{collections::BTreeMap, sync::Arc};

use providers::{ModelInfo, ProviderAdapter};

use crate::error::OrchestratorError;

/// One entry of the resolver's registry: a cached adapter plus the model name it should be
/// asked to run as.
#[derive(Clone)]
pub struct ResolvedModel {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub underlying_model: String,
}

/// A single row in the registry, built from configuration at startup.
pub struct ModelRegistration {
    /// Public model id clients address, e.g. `claude-sonnet-4-responses`.
    pub public_id: String,
    /// The model name sent to the upstream provider, e.g. `claude-sonnet-4-20250514`.
    pub underlying_model: String,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub owned_by: String,
}

/// `{id, object:"model", created, owned_by}` as returned by `GET /v1/models`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: String,
}

/// The process-wide model registry. Adapter instances are cached here for the lifetime of the
/// server; new models are added only by restarting with updated configuration.
pub struct Resolver {
    models: BTreeMap<String, ResolvedModel>,
    summaries: Vec<ModelSummary>,
}

impl Resolver {
    /// Builds a registry from a flat list of registrations gathered from configured providers.
    /// `created_at` stamps every summary (the registry has no per-model creation time of its
    /// own, so the process start time is used for all entries).
    pub fn new(registrations: Vec<ModelRegistration>, created_at: i64) -> Self {
        let mut models = BTreeMap::new();
        let mut summaries = Vec::with_capacity(registrations.len());

        for reg in registrations {
            summaries.push(ModelSummary {
                id: reg.public_id.clone(),
                object: "model",
                created: created_at,
                owned_by: reg.owned_by,
            });

            models.insert(
                reg.public_id,
                ResolvedModel {
                    adapter: reg.adapter,
                    underlying_model: reg.underlying_model,
                },
            );
        }

        Self { models, summaries }
    }

    /// Looks up a public model id. Fails with `invalid_request_error` naming the supported
    /// models when the id is unknown.
    pub fn resolve(&self, model_id: &str) -> Result<ResolvedModel, OrchestratorError> {
        self.models.get(model_id).cloned().ok_or_else(|| {
            let supported = self.summaries.iter().map(|m| m.id.as_str()).collect::<Vec<_>>().join(", ");

            OrchestratorError::InvalidRequest(format!(
                "unknown model `{model_id}`; supported models: [{supported}]"
            ))
        })
    }

    /// Emits a summary for every registered model, for `GET /v1/models`.
    pub fn list(&self) -> &[ModelSummary] {
        &self.summaries
    }

    /// Looks up a single model summary, for `GET /v1/models/{id}`.
    pub fn get_summary(&self, model_id: &str) -> Option<&ModelSummary> {
        self.summaries.iter().find(|m| m.id == model_id)
    }
}

impl Clone for ResolvedModel {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            underlying_model: self.underlying_model.clone(),
        }
    }
}

/// Adapts a provider's native `list_models` result into registry rows, for providers that are
/// configured to expose every model they report rather than a fixed alias table.
pub fn registrations_from_models(
    models: Vec<ModelInfo>,
    adapter: Arc<dyn ProviderAdapter>,
    public_suffix: &str,
) -> Vec<ModelRegistration> {
    models
        .into_iter()
        .map(|model| ModelRegistration {
            public_id: format!("{}{public_suffix}", model.id),
            underlying_model: model.id,
            adapter: adapter.clone(),
            owned_by: model.owned_by,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use providers::{ProviderEvent, ProviderRequest, ProviderResult};

    use super::*;

    struct DummyAdapter;

    #[async_trait]
    impl ProviderAdapter for DummyAdapter {
        fn name(&self) -> &str {
            "dummy"
        }

        async fn complete(&self, _request: ProviderRequest) -> providers::Result<ProviderResult> {
            unimplemented!()
        }

        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> providers::Result<BoxStream<'static, providers::Result<ProviderEvent>>> {
            unimplemented!()
        }

        async fn list_models(&self) -> providers::Result<Vec<ModelInfo>> {
            unimplemented!()
        }
    }

    fn registry() -> Resolver {
        let adapter: Arc<dyn ProviderAdapter> = Arc::new(DummyAdapter);

        Resolver::new(
            vec![ModelRegistration {
                public_id: "claude-sonnet-4-responses".to_string(),
                underlying_model: "claude-sonnet-4-20250514".to_string(),
                adapter,
                owned_by: "anthropic".to_string(),
            }],
            1_700_000_000,
        )
    }

    #[test]
    fn resolve_known_model() {
        let resolver = registry();
        let resolved = resolver.resolve("claude-sonnet-4-responses").unwrap();
        assert_eq!(resolved.underlying_model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn resolve_unknown_model_names_supported_models() {
        let resolver = registry();
        let err = resolver.resolve("gpt-5-responses").unwrap_err();
        assert_eq!(err.error_type(), "invalid_request_error");
        assert!(err.to_string().contains("claude-sonnet-4-responses"));
    }

    #[test]
    fn list_emits_every_registered_model() {
        let resolver = registry();
        let list = resolver.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "claude-sonnet-4-responses");
        assert_eq!(list[0].object, "model");
    }
}
