//! Query-time retrieval: child-vector search mapped up to ranked,
//! distinct parent chunks.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::capabilities::{TextEmbedder, call_with_retry};
use crate::config::RagConfig;
use crate::stores::{Corpus, ParentChunk};
use crate::types::RagError;

/// A parent chunk with its best child-match distance.
#[derive(Clone, Debug)]
pub struct ScoredParent {
    pub parent: ParentChunk,
    /// Lowest distance among this parent's matching children.
    pub distance: f32,
}

/// Maps query text to ranked distinct parent chunks.
///
/// Children are matched for precision, parents are returned for context:
/// the engine over-fetches `top_k × fanout` child hits, keeps each
/// parent's best distance, and resolves the surviving parents through the
/// chunk store.
pub struct RetrievalEngine {
    embedder: Arc<dyn TextEmbedder>,
    corpus: Corpus,
    fanout: usize,
    embed_timeout: Duration,
    embed_retries: usize,
}

impl RetrievalEngine {
    #[must_use]
    pub fn new(embedder: Arc<dyn TextEmbedder>, corpus: Corpus, config: &RagConfig) -> Self {
        Self {
            embedder,
            corpus,
            fanout: config.fanout,
            embed_timeout: config.embed_timeout,
            embed_retries: config.embed_retries,
        }
    }

    /// Retrieves up to `top_k` distinct parents for `query_text`, ordered
    /// ascending by distance with first-seen rank breaking ties.
    ///
    /// An empty index yields an empty result. A child hit whose parent no
    /// longer resolves is logged and skipped — a stale reference is never a
    /// failure of the whole call. Embedder failures get one bounded retry
    /// and then surface as [`RagError::CapabilityUnavailable`].
    #[instrument(skip(self, query_text), err)]
    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredParent>, RagError> {
        if query_text.trim().is_empty() {
            return Err(RagError::Validation("query text is empty".into()));
        }

        let query_vector = call_with_retry(
            "embedder",
            self.embed_timeout,
            self.embed_retries,
            || self.embedder.embed(query_text),
        )
        .await?;

        let hits = self
            .corpus
            .vectors()
            .search(&query_vector, top_k * self.fanout)
            .await?;

        // Dedupe to each parent's best score. Hits arrive ascending by
        // distance, so first sight of a parent is its best distance and
        // the insertion order doubles as the stable first-seen rank.
        let mut best: FxHashMap<String, f32> = FxHashMap::default();
        let mut ranked_parents: Vec<String> = Vec::new();
        for hit in hits {
            if best.insert(hit.parent_id.clone(), hit.distance).is_none() {
                ranked_parents.push(hit.parent_id);
            }
            if ranked_parents.len() == top_k {
                break;
            }
        }

        let mut results = Vec::with_capacity(ranked_parents.len());
        for parent_id in ranked_parents {
            match self.corpus.chunks().get(&parent_id).await? {
                Some(parent) => results.push(ScoredParent {
                    distance: best[&parent.parent_id],
                    parent,
                }),
                None => {
                    tracing::warn!(
                        parent_id = %parent_id,
                        "child hit references missing parent; skipping stale candidate"
                    );
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{
        ChildChunk, DocumentRecord, MemoryChunkStore, MemoryVectorIndex, ParentChunk,
    };
    use async_trait::async_trait;
    use chrono::Utc;

    /// Embeds to a fixed one-hot axis per recognized keyword.
    struct KeywordEmbedder;

    #[async_trait]
    impl TextEmbedder for KeywordEmbedder {
        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            let axis = if text.contains("refund") {
                0
            } else if text.contains("shipping") {
                1
            } else {
                2
            };
            let mut v = vec![0.05f32; 3];
            v[axis] = 1.0;
            Ok(v)
        }
    }

    async fn seeded_corpus() -> Corpus {
        let corpus = Corpus::new(
            std::sync::Arc::new(MemoryChunkStore::new()),
            std::sync::Arc::new(MemoryVectorIndex::new(3)),
        );
        let document = DocumentRecord {
            id: "doc".into(),
            source: "policies.txt".into(),
            content_hash: "h".into(),
            loaded_at: Utc::now(),
        };
        let topics: [(&str, usize); 3] =
            [("refund", 0), ("shipping", 1), ("warranty", 2)];
        let mut parents = Vec::new();
        let mut children = Vec::new();
        for (topic, axis) in topics {
            let parent_id = format!("p-{topic}");
            parents.push(ParentChunk {
                parent_id: parent_id.clone(),
                document_id: "doc".into(),
                order_index: axis,
                source: "policies.txt".into(),
                text: format!("{topic} policy details"),
            });
            // Two children per parent so deduplication has work to do.
            for i in 0..2 {
                let mut v = vec![0.05f32; 3];
                v[axis] = 1.0 - (i as f32) * 0.1;
                children.push(ChildChunk {
                    child_id: format!("c-{topic}-{i}"),
                    parent_id: parent_id.clone(),
                    text: format!("{topic} child {i}"),
                    offset: i * 10,
                    embedding: v,
                });
            }
        }
        corpus
            .insert_document(&document, &parents, children)
            .await
            .unwrap();
        corpus
    }

    fn engine(corpus: Corpus) -> RetrievalEngine {
        RetrievalEngine::new(
            std::sync::Arc::new(KeywordEmbedder),
            corpus,
            &RagConfig::default(),
        )
    }

    #[tokio::test]
    async fn closest_parent_ranks_first_and_parents_are_distinct() {
        let engine = engine(seeded_corpus().await);
        let results = engine.retrieve("what is the refund policy", 2).await.unwrap();
        assert_eq!(results[0].parent.parent_id, "p-refund");
        let ids: Vec<_> = results.iter().map(|r| r.parent.parent_id.as_str()).collect();
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped, "parents must be distinct");
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn empty_index_is_empty_result() {
        let corpus = Corpus::new(
            std::sync::Arc::new(MemoryChunkStore::new()),
            std::sync::Arc::new(MemoryVectorIndex::new(3)),
        );
        let engine = engine(corpus);
        assert!(engine.retrieve("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_parent_reference_is_skipped_not_fatal() {
        let corpus = seeded_corpus().await;
        // Remove a parent behind the pair's back: its children stay indexed.
        corpus.chunks().delete("p-refund").await.unwrap();

        let engine = engine(corpus);
        let results = engine.retrieve("refund please", 3).await.unwrap();
        assert!(results.iter().all(|r| r.parent.parent_id != "p-refund"));
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_validation_error() {
        let engine = engine(seeded_corpus().await);
        assert!(matches!(
            engine.retrieve("   ", 5).await,
            Err(RagError::Validation(_))
        ));
    }
}
