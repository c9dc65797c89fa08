//! SQLite-backed [`ChunkStore`] via sqlx.
//!
//! Embedded migrations (`migrations/`) run on connect, so pointing the
//! store at a fresh file yields a ready schema. Child vectors are not
//! persisted here: the vector index is process-local and rebuilt from
//! source on ingestion.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use super::{ChunkStore, DocumentRecord, ParentChunk};
use crate::types::RagError;

/// Durable parent-chunk store backed by a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteChunkStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteChunkStore").finish()
    }
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> RagError {
    RagError::Storage(format!("{context}: {err}"))
}

fn parent_from_row(row: &SqliteRow) -> Result<ParentChunk, RagError> {
    let order_index: i64 = row.try_get("order_index").map_err(|e| storage_err("order_index", e))?;
    Ok(ParentChunk {
        parent_id: row.try_get("parent_id").map_err(|e| storage_err("parent_id", e))?,
        document_id: row
            .try_get("document_id")
            .map_err(|e| storage_err("document_id", e))?,
        order_index: order_index as usize,
        source: row.try_get("source").map_err(|e| storage_err("source", e))?,
        text: row.try_get("content").map_err(|e| storage_err("content", e))?,
    })
}

impl SqliteChunkStore {
    /// Connect (or create) a SQLite database at `database_url` and run the
    /// embedded migrations. Example URL: `"sqlite://ragweave.db"`.
    #[must_use = "store must be used to persist chunks"]
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

    /// Shares the underlying pool, for callers co-locating other tables
    /// (session turns, interactions) in the same database file.
    #[must_use]
    pub fn pool(&self) -> Arc<SqlitePool> {
        self.pool.clone()
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    #[instrument(skip(self, document, parents), fields(document_id = %document.id, parents = parents.len()), err)]
    async fn put_parents(
        &self,
        document: &DocumentRecord,
        parents: &[ParentChunk],
    ) -> Result<(), RagError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("tx begin", e))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents (id, source, content_hash, loaded_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&document.id)
        .bind(&document.source)
        .bind(&document.content_hash)
        .bind(document.loaded_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| storage_err("insert document", e))?;

        for parent in parents {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO parent_chunks
                    (parent_id, document_id, order_index, source, content)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&parent.parent_id)
            .bind(&parent.document_id)
            .bind(parent.order_index as i64)
            .bind(&parent.source)
            .bind(&parent.text)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("insert parent", e))?;
        }

        tx.commit().await.map_err(|e| storage_err("tx commit", e))
    }

    async fn get(&self, parent_id: &str) -> Result<Option<ParentChunk>, RagError> {
        let row = sqlx::query(
            "SELECT parent_id, document_id, order_index, source, content \
             FROM parent_chunks WHERE parent_id = ?1",
        )
        .bind(parent_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| storage_err("select parent", e))?;
        row.as_ref().map(parent_from_row).transpose()
    }

    async fn delete(&self, parent_id: &str) -> Result<(), RagError> {
        sqlx::query("DELETE FROM parent_chunks WHERE parent_id = ?1")
            .bind(parent_id)
            .execute(&*self.pool)
            .await
            .map_err(|e| storage_err("delete parent", e))?;
        Ok(())
    }

    async fn document_by_source(&self, source: &str) -> Result<Option<DocumentRecord>, RagError> {
        let row = sqlx::query(
            "SELECT id, source, content_hash, loaded_at FROM documents WHERE source = ?1",
        )
        .bind(source)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| storage_err("select document", e))?;

        row.map(|row| {
            let loaded_at: String = row
                .try_get("loaded_at")
                .map_err(|e| storage_err("loaded_at", e))?;
            let loaded_at = DateTime::parse_from_rfc3339(&loaded_at)
                .map_err(|e| storage_err("loaded_at parse", e))?
                .with_timezone(&Utc);
            Ok(DocumentRecord {
                id: row.try_get("id").map_err(|e| storage_err("id", e))?,
                source: row.try_get("source").map_err(|e| storage_err("source", e))?,
                content_hash: row
                    .try_get("content_hash")
                    .map_err(|e| storage_err("content_hash", e))?,
                loaded_at,
            })
        })
        .transpose()
    }

    async fn parents_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<ParentChunk>, RagError> {
        let rows = sqlx::query(
            "SELECT parent_id, document_id, order_index, source, content \
             FROM parent_chunks WHERE document_id = ?1 ORDER BY order_index ASC",
        )
        .bind(document_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage_err("select parents", e))?;
        rows.iter().map(parent_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn retire_document(&self, document_id: &str) -> Result<usize, RagError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_err("tx begin", e))?;
        let deleted = sqlx::query("DELETE FROM parent_chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("delete parents", e))?
            .rows_affected();
        sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_err("delete document", e))?;
        tx.commit().await.map_err(|e| storage_err("tx commit", e))?;
        Ok(deleted as usize)
    }

    async fn count(&self) -> Result<usize, RagError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM parent_chunks")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| storage_err("count parents", e))?;
        let n: i64 = row.try_get("n").map_err(|e| storage_err("count", e))?;
        Ok(n as usize)
    }
}
