//! Runtime configuration for the conversational pipeline.
//!
//! All tunables live in one [`RagConfig`] object that is passed into the
//! orchestrator's constructor, never read from ambient globals. The SQLite
//! database name is the only value resolved from the environment (via
//! `dotenvy`), matching how deployments point the crate at their database.

use std::time::Duration;

use crate::ingestion::SplitterConfig;

/// Configuration object injected into [`crate::pipeline::ConversationOrchestrator`].
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Number of distinct parent chunks returned by retrieval.
    pub top_k: usize,
    /// Over-fetch multiplier: `top_k * fanout` child hits are pulled from
    /// the vector index before parent deduplication.
    pub fanout: usize,
    /// Splitter profile for coarse parent chunks.
    pub parent_splitter: SplitterConfig,
    /// Splitter profile for fine-grained child chunks.
    pub child_splitter: SplitterConfig,
    /// Timeout for a single embedder call.
    pub embed_timeout: Duration,
    /// Timeout for the reformulation generator call (degrades on expiry).
    pub reformulate_timeout: Duration,
    /// Timeout for the answer generation stream (fails the pipeline on expiry).
    pub generate_timeout: Duration,
    /// Additional attempts after a failed embedder call.
    pub embed_retries: usize,
    /// SQLite database name, resolved from `RAGWEAVE_DB` when unset.
    pub sqlite_db_name: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            fanout: 4,
            parent_splitter: SplitterConfig::parents(),
            child_splitter: SplitterConfig::children(),
            embed_timeout: Duration::from_secs(10),
            reformulate_timeout: Duration::from_secs(15),
            generate_timeout: Duration::from_secs(120),
            embed_retries: 1,
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RagConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("RAGWEAVE_DB").unwrap_or_else(|_| "ragweave.db".to_string()))
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[must_use]
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout.max(1);
        self
    }

    #[must_use]
    pub fn with_sqlite_db_name(mut self, name: impl Into<String>) -> Self {
        self.sqlite_db_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reformulate_timeout(mut self, timeout: Duration) -> Self {
        self.reformulate_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }
}
