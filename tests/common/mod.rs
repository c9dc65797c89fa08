//! Shared fixtures for integration tests: deterministic mock capabilities
//! and corpus seeding helpers.

#![allow(dead_code)]

pub mod capabilities;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ragweave::audit::{InteractionRecord, InteractionRecorder};
use ragweave::sessions::{MemoryHistoryBackend, SessionHistoryStore};
use ragweave::stores::{Corpus, MemoryChunkStore, MemoryVectorIndex};
use ragweave::types::RagError;

pub use capabilities::{GeneratorScript, MockGenerator, TopicEmbedder};

/// Audit recorder that keeps records in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingRecorder {
    records: std::sync::Mutex<Vec<InteractionRecord>>,
}

impl RecordingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractionRecorder for RecordingRecorder {
    async fn record_interaction(&self, record: &InteractionRecord) -> Result<(), RagError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Fresh in-memory corpus sized for the [`TopicEmbedder`].
pub fn memory_corpus() -> Corpus {
    Corpus::new(
        Arc::new(MemoryChunkStore::new()),
        Arc::new(MemoryVectorIndex::new(TopicEmbedder::DIMENSION)),
    )
}

/// Fresh in-memory session history store.
pub fn memory_history() -> Arc<SessionHistoryStore> {
    Arc::new(SessionHistoryStore::new(Arc::new(
        MemoryHistoryBackend::new(),
    )))
}

fn topic_paragraph(topic: &str, detail: &str, index: usize) -> String {
    format!(
        "Section {index}: our {topic} policy. {detail} Every {topic} request is \
handled by the support team within two business days. The {topic} policy applies \
to all product lines without exception, and customers can consult the {topic} \
policy summary in their account portal at any time."
    )
}

/// Writes three topic documents (refund, shipping, warranty) into `dir`,
/// each long enough to split into several parent chunks.
pub async fn seed_topic_documents(dir: &Path) {
    let topics = [
        (
            "refund",
            "Refunds are issued to the original payment method within 30 days of purchase.",
        ),
        (
            "shipping",
            "Shipping takes three to five business days for domestic orders.",
        ),
        (
            "warranty",
            "The warranty covers manufacturing defects for two full years.",
        ),
    ];
    for (topic, detail) in topics {
        let mut text = String::new();
        for index in 0..12 {
            text.push_str(&topic_paragraph(topic, detail, index));
            text.push_str("\n\n");
        }
        tokio::fs::write(dir.join(format!("{topic}.txt")), text)
            .await
            .expect("write fixture document");
    }
}
