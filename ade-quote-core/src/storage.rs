//! Durable keyed storage for session contexts, with in-memory and Postgres
//! implementations. One context row per chat session; the upsert applies a
//! sparse update set in one write. Contexts are never deleted here.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::Arc;
use tracing::debug;

use crate::context::{ContextUpdate, SessionContext};
use crate::error::{QuoteError, Result};

#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get(&self, session_key: &str) -> Result<Option<SessionContext>>;

    /// Create the context lazily when absent, then apply the update set.
    /// Returns the stored state after the write.
    async fn upsert(&self, session_key: &str, update: &ContextUpdate) -> Result<SessionContext>;
}

/// In-memory implementation, used in tests and when no database is
/// configured.
pub struct InMemoryContextStore {
    contexts: Arc<DashMap<String, SessionContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get(&self, session_key: &str) -> Result<Option<SessionContext>> {
        Ok(self.contexts.get(session_key).map(|entry| entry.clone()))
    }

    async fn upsert(&self, session_key: &str, update: &ContextUpdate) -> Result<SessionContext> {
        let mut context = self
            .contexts
            .get(session_key)
            .map(|entry| entry.clone())
            .unwrap_or_default();
        context.apply(update);
        self.contexts
            .insert(session_key.to_string(), context.clone());
        Ok(context)
    }
}

/// Postgres implementation: one JSONB row per session. The table is created
/// on connect so the service can start against an empty database.
pub struct PostgresContextStore {
    pool: PgPool,
}

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS quote_contexts (
    session_key TEXT PRIMARY KEY,
    context JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

impl PostgresContextStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
        debug!("quote context table ready");
        Ok(Self { pool })
    }

    async fn fetch(&self, session_key: &str) -> Result<Option<SessionContext>> {
        let row = sqlx::query("SELECT context FROM quote_contexts WHERE session_key = $1")
            .bind(session_key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: serde_json::Value = row.try_get("context")?;
                let context = serde_json::from_value(value)
                    .map_err(|e| QuoteError::Storage(format!("corrupt context row: {e}")))?;
                Ok(Some(context))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ContextStore for PostgresContextStore {
    async fn get(&self, session_key: &str) -> Result<Option<SessionContext>> {
        self.fetch(session_key).await
    }

    async fn upsert(&self, session_key: &str, update: &ContextUpdate) -> Result<SessionContext> {
        // Single writer per session per turn: the chat transport is strictly
        // sequential, so read-modify-write without a row lock is safe.
        let mut context = self.fetch(session_key).await?.unwrap_or_default();
        context.apply(update);

        let value = serde_json::to_value(&context)?;
        sqlx::query(
            r#"
            INSERT INTO quote_contexts (session_key, context, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (session_key)
            DO UPDATE SET context = EXCLUDED.context, updated_at = now()
            "#,
        )
        .bind(session_key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        debug!(session_key = %session_key, "context upserted");

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{merge_context, ExtractedFields};

    #[tokio::test]
    async fn upsert_creates_the_context_lazily() {
        let store = InMemoryContextStore::new();
        assert!(store.get("s1").await.unwrap().is_none());

        let update = merge_context(
            None,
            &ExtractedFields {
                nom_complet: Some("Alice Martin".into()),
                ..Default::default()
            },
        );
        let context = store.upsert("s1", &update).await.unwrap();
        assert_eq!(context.full_name.as_deref(), Some("Alice Martin"));
        assert!(store.get("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn successive_upserts_accumulate_fields() {
        let store = InMemoryContextStore::new();
        let first = merge_context(
            None,
            &ExtractedFields {
                nom_complet: Some("Alice Martin".into()),
                montant_pret: Some(200_000.0),
                ..Default::default()
            },
        );
        store.upsert("s1", &first).await.unwrap();

        let existing = store.get("s1").await.unwrap();
        let second = merge_context(
            existing.as_ref(),
            &ExtractedFields {
                fumeur: Some(false),
                ..Default::default()
            },
        );
        let context = store.upsert("s1", &second).await.unwrap();

        assert_eq!(context.full_name.as_deref(), Some("Alice Martin"));
        assert_eq!(context.loan_amount, Some(200_000.0));
        assert_eq!(context.smoker, crate::context::TriState::No);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryContextStore::new();
        let update = merge_context(
            None,
            &ExtractedFields {
                nom_complet: Some("Alice Martin".into()),
                ..Default::default()
            },
        );
        store.upsert("s1", &update).await.unwrap();
        assert!(store.get("s2").await.unwrap().is_none());
    }
}
