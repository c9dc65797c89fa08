//! Interaction audit persistence — an external collaborator seam.
//!
//! After each completed (or partially completed) exchange the orchestrator
//! hands the full interaction to an [`InteractionRecorder`]. Recorder
//! failures are logged by the caller and never fail a finished pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::formatting::ContentBlock;
use crate::types::{IdGenerator, RagError};

/// One audited question/answer exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub session_id: String,
    pub question: String,
    pub response_blocks: Vec<ContentBlock>,
    pub query_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
}

/// Records completed interactions for audit purposes.
#[async_trait]
pub trait InteractionRecorder: Send + Sync {
    async fn record_interaction(&self, record: &InteractionRecord) -> Result<(), RagError>;
}

/// Discards interactions. Default when no audit sink is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

#[async_trait]
impl InteractionRecorder for NoopRecorder {
    async fn record_interaction(&self, _record: &InteractionRecord) -> Result<(), RagError> {
        Ok(())
    }
}

/// SQLite-backed recorder writing to the `interactions` table.
#[derive(Clone)]
pub struct SqliteInteractionRecorder {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteInteractionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteInteractionRecorder").finish()
    }
}

impl SqliteInteractionRecorder {
    /// Reuses a pool whose database carries the embedded migrations.
    #[must_use]
    pub fn from_pool(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InteractionRecorder for SqliteInteractionRecorder {
    #[instrument(skip(self, record), fields(session_id = %record.session_id), err)]
    async fn record_interaction(&self, record: &InteractionRecord) -> Result<(), RagError> {
        let blocks_json = serde_json::to_string(&record.response_blocks)?;
        sqlx::query(
            "INSERT INTO interactions \
                (id, user_id, session_id, question, response_blocks, query_timestamp, response_timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.session_id)
        .bind(&record.question)
        .bind(blocks_json)
        .bind(record.query_timestamp.to_rfc3339())
        .bind(record.response_timestamp.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| RagError::Storage(format!("insert interaction: {e}")))?;
        Ok(())
    }
}

impl InteractionRecord {
    /// Builds a record with a fresh id.
    #[must_use]
    pub fn new(
        session_id: &str,
        user_id: Option<&str>,
        question: &str,
        response_blocks: Vec<ContentBlock>,
        query_timestamp: DateTime<Utc>,
        response_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: IdGenerator::new().interaction_id(),
            user_id: user_id.map(str::to_string),
            session_id: session_id.to_string(),
            question: question.to_string(),
            response_blocks,
            query_timestamp,
            response_timestamp,
        }
    }
}
