use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    ModelInfo, ProviderEvent, ProviderRequest, ProviderResult,
    error::Result,
};

/// A backend the orchestrator can send normalized requests to.
///
/// Implementations translate [`ProviderRequest`] into an upstream's own wire format and project
/// the response back into this crate's normalized types. The orchestrator never inspects an
/// upstream's native shapes directly.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// A short identifier for this adapter instance, used in logs and error messages.
    fn name(&self) -> &str;

    /// Performs a single non-streaming completion.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResult>;

    /// Performs a streaming completion, yielding normalized events as they arrive.
    async fn stream(&self, request: ProviderRequest) -> Result<BoxStream<'static, Result<ProviderEvent>>>;

    /// Lists the models this provider currently exposes.
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}
