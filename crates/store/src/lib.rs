//! SQLite-backed implementation of `orchestrator::ResponseStore`.
//!
//! Mirrors the teacher's pattern of a single pooled client shared across the process (there, a
//! `reqwest::Client`; here, a `sqlx::SqlitePool`) behind a thin wrapper that owns no business
//! logic of its own — every invariant (status-guarded partial updates, cancel monotonicity) is
//! enforced by the SQL itself rather than by locking in Rust.

use std::sync::Arc;

use async_trait::async_trait;
use orchestrator::{ErrorPayload, IncompleteDetails, OutputItem, ResponseStatus, ResponseStore, StoreError, StoreProvider, StoredResponse, Usage};
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};
use tokio::sync::Mutex as AsyncMutex;

type Result<T> = std::result::Result<T, StoreError>;

fn backend_error(error: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// A `sqlx::SqlitePool`-backed `ResponseStore`. Construct once at startup and share behind an
/// `Arc` — the pool itself already manages concurrent access to the underlying connection(s).
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to `database_url`, creating the database file if it doesn't exist, and runs
    /// embedded migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options: sqlx::sqlite::SqliteConnectOptions = database_url.parse::<sqlx::sqlite::SqliteConnectOptions>()?.create_if_missing(true);

        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        log::info!("connected to response store at {database_url}");

        Ok(Self { pool })
    }

    #[cfg(test)]
    async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite connection should succeed");

        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations should apply");

        Self { pool }
    }
}

/// A [`StoreProvider`] that holds a `DATABASE_URL` (if any) without connecting until the first
/// call that actually needs persistence. Absence of a configured url, or a connection failure
/// once it's finally attempted, both surface as a [`StoreError`] for the orchestrator to map to
/// `server_error`; neither aborts process startup.
pub struct LazyStore {
    database_url: Option<String>,
    connected: AsyncMutex<Option<Arc<dyn ResponseStore>>>,
}

impl LazyStore {
    pub fn new(database_url: Option<String>) -> Self {
        Self {
            database_url,
            connected: AsyncMutex::new(None),
        }
    }
}

#[async_trait]
impl StoreProvider for LazyStore {
    async fn get_or_connect(&self) -> Result<Arc<dyn ResponseStore>> {
        let mut connected = self.connected.lock().await;

        if let Some(store) = &*connected {
            return Ok(store.clone());
        }

        let database_url = self
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("no DATABASE_URL configured".to_string()))?;

        let store: Arc<dyn ResponseStore> = Arc::new(SqliteStore::connect(database_url).await.map_err(backend_error)?);
        *connected = Some(store.clone());

        Ok(store)
    }
}

fn status_str(status: ResponseStatus) -> &'static str {
    match status {
        ResponseStatus::Queued => "queued",
        ResponseStatus::InProgress => "in_progress",
        ResponseStatus::Completed => "completed",
        ResponseStatus::Failed => "failed",
        ResponseStatus::Cancelled => "cancelled",
        ResponseStatus::Incomplete => "incomplete",
    }
}

fn parse_status(value: &str) -> Result<ResponseStatus> {
    match value {
        "queued" => Ok(ResponseStatus::Queued),
        "in_progress" => Ok(ResponseStatus::InProgress),
        "completed" => Ok(ResponseStatus::Completed),
        "failed" => Ok(ResponseStatus::Failed),
        "cancelled" => Ok(ResponseStatus::Cancelled),
        "incomplete" => Ok(ResponseStatus::Incomplete),
        other => Err(StoreError::Backend(format!("unknown response status `{other}` in store"))),
    }
}

fn row_to_stored(row: sqlx::sqlite::SqliteRow) -> Result<StoredResponse> {
    let status: String = row.try_get("status").map_err(backend_error)?;
    let input_items: String = row.try_get("input_items").map_err(backend_error)?;
    let output_items: String = row.try_get("output_items").map_err(backend_error)?;
    let usage: Option<String> = row.try_get("usage").map_err(backend_error)?;
    let error: Option<String> = row.try_get("error").map_err(backend_error)?;
    let incomplete_details: Option<String> = row.try_get("incomplete_details").map_err(backend_error)?;
    let metadata: String = row.try_get("metadata").map_err(backend_error)?;
    let parallel_tool_calls: Option<i64> = row.try_get("parallel_tool_calls").map_err(backend_error)?;

    Ok(StoredResponse {
        id: row.try_get("id").map_err(backend_error)?,
        status: parse_status(&status)?,
        model: row.try_get("model").map_err(backend_error)?,
        store: true,
        created_at: row.try_get("created_at").map_err(backend_error)?,
        completed_at: row.try_get("completed_at").map_err(backend_error)?,
        cancelled_at: row.try_get("cancelled_at").map_err(backend_error)?,
        input_items: serde_json::from_str(&input_items).map_err(backend_error)?,
        output_items: serde_json::from_str(&output_items).map_err(backend_error)?,
        usage: usage.as_deref().map(serde_json::from_str::<Usage>).transpose().map_err(backend_error)?,
        error: error.as_deref().map(serde_json::from_str::<ErrorPayload>).transpose().map_err(backend_error)?,
        incomplete_details: incomplete_details
            .as_deref()
            .map(serde_json::from_str::<IncompleteDetails>)
            .transpose()
            .map_err(backend_error)?,
        metadata: serde_json::from_str(&metadata).map_err(backend_error)?,
        parallel_tool_calls: parallel_tool_calls.map(|v| v != 0),
    })
}

#[async_trait]
impl ResponseStore for SqliteStore {
    async fn upsert(&self, response: StoredResponse) -> Result<()> {
        let input_items = serde_json::to_string(&response.input_items).map_err(backend_error)?;
        let output_items = serde_json::to_string(&response.output_items).map_err(backend_error)?;
        let usage = response.usage.map(|u| serde_json::to_string(&u)).transpose().map_err(backend_error)?;
        let error = response.error.map(|e| serde_json::to_string(&e)).transpose().map_err(backend_error)?;
        let incomplete_details = response
            .incomplete_details
            .map(|d| serde_json::to_string(&d))
            .transpose()
            .map_err(backend_error)?;
        let metadata = serde_json::to_string(&response.metadata).map_err(backend_error)?;

        sqlx::query(
            r#"
            INSERT INTO responses (
                id, status, model, created_at, completed_at, cancelled_at,
                input_items, output_items, usage, error, incomplete_details, metadata, parallel_tool_calls
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                model = excluded.model,
                created_at = excluded.created_at,
                completed_at = excluded.completed_at,
                cancelled_at = excluded.cancelled_at,
                input_items = excluded.input_items,
                output_items = excluded.output_items,
                usage = excluded.usage,
                error = excluded.error,
                incomplete_details = excluded.incomplete_details,
                metadata = excluded.metadata,
                parallel_tool_calls = excluded.parallel_tool_calls
            "#,
        )
        .bind(&response.id)
        .bind(status_str(response.status))
        .bind(&response.model)
        .bind(response.created_at)
        .bind(response.completed_at)
        .bind(response.cancelled_at)
        .bind(input_items)
        .bind(output_items)
        .bind(usage)
        .bind(error)
        .bind(incomplete_details)
        .bind(metadata)
        .bind(response.parallel_tool_calls.map(|v| v as i64))
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn partial_update(&self, id: &str, output_items: Vec<OutputItem>) -> Result<bool> {
        let output_items = serde_json::to_string(&output_items).map_err(backend_error)?;

        let result = sqlx::query(
            r#"UPDATE responses SET output_items = $1 WHERE id = $2 AND status = 'in_progress'"#,
        )
        .bind(output_items)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel(&self, id: &str, cancelled_at: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE responses
            SET status = 'cancelled', cancelled_at = $1
            WHERE id = $2 AND status IN ('queued', 'in_progress')
            "#,
        )
        .bind(cancelled_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredResponse>> {
        let row = sqlx::query("SELECT * FROM responses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;

        row.map(row_to_stored).transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM responses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use orchestrator::{AssistantRole, ItemStatus, OutputContent};

    use super::*;

    fn sample(id: &str, status: ResponseStatus) -> StoredResponse {
        StoredResponse {
            id: id.to_string(),
            status,
            model: "claude-sonnet-4-responses".to_string(),
            store: true,
            created_at: 1_700_000_000,
            completed_at: None,
            cancelled_at: None,
            input_items: Vec::new(),
            output_items: Vec::new(),
            usage: None,
            error: None,
            incomplete_details: None,
            metadata: HashMap::new(),
            parallel_tool_calls: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = SqliteStore::in_memory().await;
        store.upsert(sample("resp_1", ResponseStatus::InProgress)).await.unwrap();

        let row = store.get("resp_1").await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::InProgress);
        assert_eq!(row.model, "claude-sonnet-4-responses");
    }

    #[tokio::test]
    async fn get_missing_row_is_none() {
        let store = SqliteStore::in_memory().await;
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_update_applies_while_in_progress() {
        let store = SqliteStore::in_memory().await;
        store.upsert(sample("resp_1", ResponseStatus::InProgress)).await.unwrap();

        let items = vec![OutputItem::Message {
            id: "msg_1".to_string(),
            status: ItemStatus::InProgress,
            role: AssistantRole::Assistant,
            content: vec![OutputContent::text("partial".to_string())],
        }];

        let applied = store.partial_update("resp_1", items.clone()).await.unwrap();
        assert!(applied);

        let row = store.get("resp_1").await.unwrap().unwrap();
        assert_eq!(row.output_items.len(), 1);
    }

    /// Testable property 10: once a row reaches a terminal status, a later partial update is a
    /// silent no-op rather than reviving it.
    #[tokio::test]
    async fn partial_update_is_a_no_op_once_terminal() {
        let store = SqliteStore::in_memory().await;
        store.upsert(sample("resp_1", ResponseStatus::Completed)).await.unwrap();

        let applied = store.partial_update("resp_1", Vec::new()).await.unwrap();
        assert!(!applied);

        let row = store.get("resp_1").await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::Completed);
    }

    /// Testable property 11: cancel only ever moves a row forward from an in-flight status; a
    /// second cancel call (or one against an already-terminal row) is a no-op.
    #[tokio::test]
    async fn cancel_is_monotonic() {
        let store = SqliteStore::in_memory().await;
        store.upsert(sample("resp_1", ResponseStatus::InProgress)).await.unwrap();

        assert!(store.cancel("resp_1", 1_700_000_100).await.unwrap());
        assert!(!store.cancel("resp_1", 1_700_000_200).await.unwrap());

        let row = store.get("resp_1").await.unwrap().unwrap();
        assert_eq!(row.status, ResponseStatus::Cancelled);
        assert_eq!(row.cancelled_at, Some(1_700_000_100));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_existed() {
        let store = SqliteStore::in_memory().await;
        store.upsert(sample("resp_1", ResponseStatus::Completed)).await.unwrap();

        assert!(store.delete("resp_1").await.unwrap());
        assert!(!store.delete("resp_1").await.unwrap());
    }
}
