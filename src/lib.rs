//! # ragweave: retrieval-augmented conversational backend
//!
//! ragweave answers user questions by retrieving relevant excerpts from an
//! ingested document corpus and feeding them, together with conversation
//! history, to a text-generation capability.
//!
//! ```text
//! directory ──► DocumentIngestor ──► Corpus {ChunkStore, VectorIndex}
//!                                              ▲
//!                                              │
//! question ──► ConversationOrchestrator ──► RetrievalEngine
//!                  │        │  ▲
//!                  │        │  └── QueryReformulator ◄── SessionHistoryStore
//!                  │        └────► TextGenerator (streamed deltas)
//!                  ▼
//!           ResponseFormatter ──► ContentBlock[] ──► caller
//! ```
//!
//! ## Core concepts
//!
//! - **Parent chunks**: coarse stored units of a document, returned as
//!   answer context.
//! - **Child chunks**: small overlapping fragments of a parent, embedded
//!   and indexed for precise similarity matching.
//! - **Sessions**: durable, cached, per-session-serialized turn logs.
//! - **Capabilities**: the embedder, generator, and document loader are
//!   injected traits — no ambient singletons anywhere.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use ragweave::audit::NoopRecorder;
//! use ragweave::capabilities::{LoaderRegistry, TextEmbedder, TextGenerator};
//! use ragweave::config::RagConfig;
//! use ragweave::ingestion::DocumentIngestor;
//! use ragweave::pipeline::{ChatRequest, ConversationOrchestrator};
//! use ragweave::sessions::{MemoryHistoryBackend, SessionHistoryStore};
//! use ragweave::stores::{Corpus, MemoryChunkStore, MemoryVectorIndex};
//!
//! async fn run(
//!     embedder: Arc<dyn TextEmbedder>,
//!     generator: Arc<dyn TextGenerator>,
//! ) -> miette::Result<()> {
//!     let config = RagConfig::default();
//!     let corpus = Corpus::new(
//!         Arc::new(MemoryChunkStore::new()),
//!         Arc::new(MemoryVectorIndex::new(embedder.dimension())),
//!     );
//!
//!     let ingestor = DocumentIngestor::new(
//!         LoaderRegistry::new(),
//!         embedder.clone(),
//!         corpus.clone(),
//!         &config,
//!     );
//!     let report = ingestor.ingest(Path::new("corpus/")).await?;
//!     println!("ingested {} documents", report.documents_loaded);
//!
//!     let history = Arc::new(SessionHistoryStore::new(Arc::new(
//!         MemoryHistoryBackend::new(),
//!     )));
//!     let orchestrator = ConversationOrchestrator::new(
//!         embedder,
//!         generator,
//!         corpus,
//!         history,
//!         Arc::new(NoopRecorder),
//!         config,
//!     );
//!
//!     let response = orchestrator
//!         .ask_complete(ChatRequest::new("session-1", "What is the refund policy?"))
//!         .await;
//!     for block in response.blocks {
//!         println!("{:?}: {}", block.kind, block.content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module guide
//!
//! - [`capabilities`] - External capability seams (embedder, generator, loader)
//! - [`ingestion`] - Hierarchical splitting and corpus population
//! - [`stores`] - Chunk store, vector index, and their consistency pair
//! - [`retrieval`] - Query → ranked distinct parent chunks
//! - [`sessions`] - Durable + cached conversation history
//! - [`reformulate`] - Follow-up query rewriting
//! - [`pipeline`] - The orchestration state machine and answer stream
//! - [`formatting`] - Typed content-block segmentation and rendering
//! - [`audit`] - Interaction audit collaborator

pub mod audit;
pub mod capabilities;
pub mod config;
pub mod formatting;
pub mod ingestion;
pub mod message;
pub mod pipeline;
pub mod reformulate;
pub mod retrieval;
pub mod sessions;
pub mod stores;
pub mod types;
