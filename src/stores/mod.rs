//! Storage layer: parent chunk store, child vector index, and the
//! consistency pair that keeps them honest.
//!
//! # Architecture
//!
//! ```text
//!                   ┌──────────────────┐
//!                   │      Corpus      │  write-order contract +
//!                   │ (consistency pair│  orphan reconciliation
//!                   └───┬──────────┬───┘
//!                       │          │
//!             ┌─────────▼──┐   ┌───▼─────────┐
//!             │ ChunkStore │   │ VectorIndex │
//!             │  (parents) │   │ (children)  │
//!             └─────┬──────┘   └──────┬──────┘
//!                   │                 │
//!             SQLite / memory    in-memory brute force
//! ```
//!
//! The contract: writers add to the chunk store **before** the vector
//! index, and deletions remove from the vector index **before** the chunk
//! store. Any vector visible to a searcher therefore resolves to stored
//! content, modulo a crash window that [`Corpus::reconcile`] self-heals.

pub mod corpus;
pub mod memory;
pub mod sqlite;

pub use corpus::Corpus;
pub use memory::{MemoryChunkStore, MemoryVectorIndex};
pub use sqlite::SqliteChunkStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::RagError;

/// An ingested source document. Created only by the ingestor, immutable
/// thereafter; re-ingestion replaces rather than mutates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    /// Source path the document was loaded from.
    pub source: String,
    /// SHA-256 of the extracted text, used for idempotent re-ingestion.
    pub content_hash: String,
    pub loaded_at: DateTime<Utc>,
}

/// Coarse-grained stored unit of a document, returned as retrieval context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentChunk {
    pub parent_id: String,
    pub document_id: String,
    /// Zero-based position of this chunk within its document.
    pub order_index: usize,
    /// Source path, carried for display alongside retrieved excerpts.
    pub source: String,
    pub text: String,
}

/// Small overlapping fragment of a parent chunk, embedded for similarity
/// search. Holds a non-owning back-reference to its parent.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildChunk {
    pub child_id: String,
    pub parent_id: String,
    pub text: String,
    /// Character offset of this fragment within the parent text.
    pub offset: usize,
    pub embedding: Vec<f32>,
}

/// One similarity-search result from the vector index.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    pub child_id: String,
    pub parent_id: String,
    /// Cosine distance to the query; lower is closer.
    pub distance: f32,
}

/// Durable key→value store of parent chunks plus document bookkeeping.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Store a document record together with its parent chunks.
    async fn put_parents(
        &self,
        document: &DocumentRecord,
        parents: &[ParentChunk],
    ) -> Result<(), RagError>;

    /// Fetch one parent chunk by id.
    async fn get(&self, parent_id: &str) -> Result<Option<ParentChunk>, RagError>;

    /// Delete one parent chunk by id.
    async fn delete(&self, parent_id: &str) -> Result<(), RagError>;

    /// Look up the document record previously ingested from `source`.
    async fn document_by_source(&self, source: &str) -> Result<Option<DocumentRecord>, RagError>;

    /// All parent chunks belonging to `document_id`, ordered by `order_index`.
    async fn parents_for_document(&self, document_id: &str)
        -> Result<Vec<ParentChunk>, RagError>;

    /// Remove a document record and all of its parent chunks.
    /// Returns the number of parents removed.
    async fn retire_document(&self, document_id: &str) -> Result<usize, RagError>;

    /// Total number of stored parent chunks.
    async fn count(&self) -> Result<usize, RagError>;
}

/// Similarity-searchable store of child-chunk vectors.
///
/// All vectors in one index share one fixed dimension `D`; adds with a
/// mismatched dimension are rejected. `search` returns hits in ascending
/// distance order with ties broken by insertion order.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Fixed embedding dimension enforced by this index.
    fn dimension(&self) -> usize;

    /// Insert one child chunk with its embedding.
    async fn add(&self, child: ChildChunk) -> Result<(), RagError>;

    /// `k` nearest children to `query`, ascending by distance.
    /// An empty index yields an empty result, not an error.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, RagError>;

    /// Remove every child belonging to `parent_id`.
    /// Returns the number of children removed.
    async fn remove_parent(&self, parent_id: &str) -> Result<usize, RagError>;

    /// Number of indexed child vectors.
    async fn len(&self) -> Result<usize, RagError>;

    /// Distinct parent ids currently referenced by indexed vectors.
    /// Used by the reconciliation pass.
    async fn referenced_parents(&self) -> Result<Vec<String>, RagError>;
}
