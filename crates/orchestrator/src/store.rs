//! The persistence gateway contract. The orchestrator depends only on this trait; the concrete
//! sqlite-backed implementation lives in `crates/store` and is swappable.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::response::{OutputItem, StoredResponse};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Abstracts the response persistence gateway described in the component design.
///
/// Implementations must honor the status-guarded semantics of [`ResponseStore::partial_update`]
/// and [`ResponseStore::cancel`]: a row that has already reached a terminal status is never
/// moved to a different status by either operation.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Inserts a new row, or fully overwrites an existing one regardless of its current status.
    /// Used for the initial streaming row and for every terminal write.
    async fn upsert(&self, response: StoredResponse) -> Result<()>;

    /// Overwrites `output_items` (and nothing else) only if the row is still `in_progress`.
    /// Returns whether the write was applied.
    async fn partial_update(&self, id: &str, output_items: Vec<OutputItem>) -> Result<bool>;

    /// Transitions a `queued`/`in_progress` row to `cancelled` with `cancelled_at = now`. Returns
    /// whether the transition was applied; `false` means the row was already terminal or absent.
    async fn cancel(&self, id: &str, cancelled_at: i64) -> Result<bool>;

    /// Reads a row by id.
    async fn get(&self, id: &str) -> Result<Option<StoredResponse>>;

    /// Deletes a row by id. Returns whether a row was actually removed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Lazily resolves a [`ResponseStore`], connecting (or otherwise becoming available) on first
/// use. Lets the orchestrator hold configuration that doesn't yet know whether persistence will
/// ever be needed — e.g. no configured `DATABASE_URL` — without failing at startup: per the
/// configuration contract, absence is tolerated until the first call that actually needs the
/// store (`store=true` or `previous_response_id`).
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn get_or_connect(&self) -> Result<Arc<dyn ResponseStore>>;
}

/// Wraps a store that is already connected, so it can be handed anywhere a [`StoreProvider`] is
/// expected (tests and callers that construct their store eagerly).
pub struct ConnectedStore(Arc<dyn ResponseStore>);

impl ConnectedStore {
    pub fn new(store: Arc<dyn ResponseStore>) -> Self {
        Self(store)
    }
}

#[async_trait]
impl StoreProvider for ConnectedStore {
    async fn get_or_connect(&self) -> Result<Arc<dyn ResponseStore>> {
        Ok(self.0.clone())
    }
}
