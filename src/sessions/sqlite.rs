//! SQLite-backed [`HistoryBackend`] via sqlx.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::{HistoryBackend, SessionTurn};
use crate::types::RagError;

/// Durable session-turn storage on a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteHistoryBackend {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteHistoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHistoryBackend").finish()
    }
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> RagError {
    RagError::Storage(format!("{context}: {err}"))
}

impl SqliteHistoryBackend {
    /// Connect (or create) a SQLite database at `database_url` and run the
    /// embedded migrations.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, RagError> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| storage_err("connect", e))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| storage_err("migration failure", e))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Reuses an existing pool, for co-locating history with the chunk
    /// store in one database file.
    #[must_use]
    pub fn from_pool(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryBackend for SqliteHistoryBackend {
    async fn load_turns(&self, session_id: &str) -> Result<Vec<SessionTurn>, RagError> {
        let rows = sqlx::query(
            "SELECT session_id, turn_index, role, content, created_at \
             FROM session_turns WHERE session_id = ?1 ORDER BY turn_index ASC",
        )
        .bind(session_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage_err("select turns", e))?;

        rows.into_iter()
            .map(|row| {
                let turn_index: i64 = row
                    .try_get("turn_index")
                    .map_err(|e| storage_err("turn_index", e))?;
                let created_at: String = row
                    .try_get("created_at")
                    .map_err(|e| storage_err("created_at", e))?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| storage_err("created_at parse", e))?
                    .with_timezone(&Utc);
                Ok(SessionTurn {
                    session_id: row
                        .try_get("session_id")
                        .map_err(|e| storage_err("session_id", e))?,
                    turn_index: turn_index as u64,
                    role: row.try_get("role").map_err(|e| storage_err("role", e))?,
                    content: row
                        .try_get("content")
                        .map_err(|e| storage_err("content", e))?,
                    created_at,
                })
            })
            .collect()
    }

    #[instrument(skip(self, turn), fields(session_id = %turn.session_id, turn_index = turn.turn_index), err)]
    async fn append_turn(&self, turn: &SessionTurn) -> Result<(), RagError> {
        sqlx::query(
            "INSERT INTO session_turns (session_id, turn_index, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&turn.session_id)
        .bind(turn.turn_index as i64)
        .bind(&turn.role)
        .bind(&turn.content)
        .bind(turn.created_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| storage_err("insert turn", e))?;
        Ok(())
    }

    async fn clear_session(&self, session_id: &str) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM session_turns WHERE session_id = ?1")
            .bind(session_id)
            .execute(&*self.pool)
            .await
            .map_err(|e| storage_err("delete turns", e))?;
        Ok(result.rows_affected() as usize)
    }

    async fn session_ids(&self) -> Result<Vec<String>, RagError> {
        let rows = sqlx::query(
            "SELECT DISTINCT session_id FROM session_turns ORDER BY session_id ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage_err("select sessions", e))?;
        rows.into_iter()
            .map(|row| {
                row.try_get("session_id")
                    .map_err(|e| storage_err("session_id", e))
            })
            .collect()
    }
}
