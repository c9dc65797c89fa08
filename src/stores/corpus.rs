//! The chunk-store / vector-index consistency pair.
//!
//! The two stores are not jointly transactional, so ordering carries the
//! invariant instead: inserts hit the chunk store first and the index
//! second; deletions run in the opposite order. A reader that can see a
//! vector can therefore resolve its parent, except in the narrow window
//! where an insert crashed between the two writes — [`Corpus::reconcile`]
//! sweeps those orphans out.

use std::sync::Arc;

use tracing::instrument;

use super::{ChildChunk, ChunkStore, DocumentRecord, ParentChunk, VectorIndex};
use crate::types::RagError;

/// Paired access to one [`ChunkStore`] and one [`VectorIndex`] that
/// enforces the write-order contract.
#[derive(Clone)]
pub struct Corpus {
    chunks: Arc<dyn ChunkStore>,
    vectors: Arc<dyn VectorIndex>,
}

impl Corpus {
    #[must_use]
    pub fn new(chunks: Arc<dyn ChunkStore>, vectors: Arc<dyn VectorIndex>) -> Self {
        Self { chunks, vectors }
    }

    /// The parent-chunk side of the pair.
    #[must_use]
    pub fn chunks(&self) -> &Arc<dyn ChunkStore> {
        &self.chunks
    }

    /// The vector side of the pair.
    #[must_use]
    pub fn vectors(&self) -> &Arc<dyn VectorIndex> {
        &self.vectors
    }

    /// Inserts a document with its parents and children, chunk store first.
    ///
    /// Children become searchable only after every parent they reference is
    /// durably stored.
    #[instrument(skip_all, fields(document_id = %document.id, parents = parents.len(), children = children.len()), err)]
    pub async fn insert_document(
        &self,
        document: &DocumentRecord,
        parents: &[ParentChunk],
        children: Vec<ChildChunk>,
    ) -> Result<(), RagError> {
        self.chunks.put_parents(document, parents).await?;
        for child in children {
            self.vectors.add(child).await?;
        }
        Ok(())
    }

    /// Removes a document: vectors first, then parents, so no searchable
    /// vector ever points at missing content.
    #[instrument(skip(self), err)]
    pub async fn remove_document(&self, document_id: &str) -> Result<usize, RagError> {
        let parents = self.chunks.parents_for_document(document_id).await?;
        for parent in &parents {
            self.vectors.remove_parent(&parent.parent_id).await?;
        }
        self.chunks.retire_document(document_id).await
    }

    /// Deletes a single parent chunk, children first.
    pub async fn remove_parent(&self, parent_id: &str) -> Result<(), RagError> {
        self.vectors.remove_parent(parent_id).await?;
        self.chunks.delete(parent_id).await
    }

    /// Evicts vectors whose parent no longer resolves in the chunk store.
    ///
    /// Safe to run concurrently with retrieval and ingestion; intended as a
    /// periodic background pass. Returns the number of orphaned vectors
    /// removed.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<usize, RagError> {
        let mut evicted = 0;
        for parent_id in self.vectors.referenced_parents().await? {
            if self.chunks.get(&parent_id).await?.is_none() {
                let removed = self.vectors.remove_parent(&parent_id).await?;
                tracing::warn!(
                    parent_id = %parent_id,
                    removed,
                    "evicted orphaned vectors during reconciliation"
                );
                evicted += removed;
            }
        }
        Ok(evicted)
    }
}
