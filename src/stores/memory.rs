//! In-memory store implementations.
//!
//! `MemoryChunkStore` backs tests and database-less deployments.
//! `MemoryVectorIndex` is the crate's similarity index: brute-force cosine
//! distance over an insertion-ordered list. The approximate-nearest-
//! neighbor structure behind a production index is deliberately out of
//! scope; anything implementing [`VectorIndex`] slots in here.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use super::{ChildChunk, ChunkStore, DocumentRecord, ParentChunk, SearchHit, VectorIndex};
use crate::types::RagError;

/// Process-local [`ChunkStore`].
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    inner: RwLock<ChunkState>,
}

#[derive(Debug, Default)]
struct ChunkState {
    documents: FxHashMap<String, DocumentRecord>,
    parents: FxHashMap<String, ParentChunk>,
}

impl MemoryChunkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn put_parents(
        &self,
        document: &DocumentRecord,
        parents: &[ParentChunk],
    ) -> Result<(), RagError> {
        let mut state = self.inner.write().await;
        state.documents.insert(document.id.clone(), document.clone());
        for parent in parents {
            state.parents.insert(parent.parent_id.clone(), parent.clone());
        }
        Ok(())
    }

    async fn get(&self, parent_id: &str) -> Result<Option<ParentChunk>, RagError> {
        Ok(self.inner.read().await.parents.get(parent_id).cloned())
    }

    async fn delete(&self, parent_id: &str) -> Result<(), RagError> {
        self.inner.write().await.parents.remove(parent_id);
        Ok(())
    }

    async fn document_by_source(&self, source: &str) -> Result<Option<DocumentRecord>, RagError> {
        Ok(self
            .inner
            .read()
            .await
            .documents
            .values()
            .find(|doc| doc.source == source)
            .cloned())
    }

    async fn parents_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<ParentChunk>, RagError> {
        let state = self.inner.read().await;
        let mut parents: Vec<ParentChunk> = state
            .parents
            .values()
            .filter(|parent| parent.document_id == document_id)
            .cloned()
            .collect();
        parents.sort_by_key(|parent| parent.order_index);
        Ok(parents)
    }

    async fn retire_document(&self, document_id: &str) -> Result<usize, RagError> {
        let mut state = self.inner.write().await;
        let before = state.parents.len();
        state.parents.retain(|_, parent| parent.document_id != document_id);
        state.documents.remove(document_id);
        Ok(before - state.parents.len())
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.inner.read().await.parents.len())
    }
}

/// Brute-force cosine-distance [`VectorIndex`] over an insertion-ordered
/// list. Ties in distance resolve to the earlier-inserted child, which
/// keeps search results deterministic.
#[derive(Debug)]
pub struct MemoryVectorIndex {
    dimension: usize,
    children: RwLock<Vec<ChildChunk>>,
}

impl MemoryVectorIndex {
    /// Creates an index accepting only `dimension`-sized vectors.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            children: RwLock::new(Vec::new()),
        }
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - dot / denom
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn add(&self, child: ChildChunk) -> Result<(), RagError> {
        if child.embedding.len() != self.dimension {
            return Err(RagError::Validation(format!(
                "embedding dimension {} does not match index dimension {}",
                child.embedding.len(),
                self.dimension
            )));
        }
        self.children.write().await.push(child);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, RagError> {
        if query.len() != self.dimension {
            return Err(RagError::Validation(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        let children = self.children.read().await;
        let mut hits: Vec<SearchHit> = children
            .iter()
            .map(|child| SearchHit {
                child_id: child.child_id.clone(),
                parent_id: child.parent_id.clone(),
                distance: cosine_distance(query, &child.embedding),
            })
            .collect();
        // Stable sort preserves insertion order among equal distances.
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn remove_parent(&self, parent_id: &str) -> Result<usize, RagError> {
        let mut children = self.children.write().await;
        let before = children.len();
        children.retain(|child| child.parent_id != parent_id);
        Ok(before - children.len())
    }

    async fn len(&self) -> Result<usize, RagError> {
        Ok(self.children.read().await.len())
    }

    async fn referenced_parents(&self) -> Result<Vec<String>, RagError> {
        let children = self.children.read().await;
        let mut seen = FxHashMap::default();
        let mut parents = Vec::new();
        for child in children.iter() {
            if seen.insert(child.parent_id.clone(), ()).is_none() {
                parents.push(child.parent_id.clone());
            }
        }
        Ok(parents)
    }
}
