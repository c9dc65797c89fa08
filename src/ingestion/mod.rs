//! Document ingestion: hierarchical splitting and corpus population.
//!
//! ```text
//! directory ──► LoaderRegistry ──► raw text ──► TextSplitter (parents)
//!                                                    │
//!                                                    ▼
//!                                    per-parent TextSplitter (children)
//!                                                    │
//!                                 embed_batch ──► Corpus::insert_document
//! ```

pub mod ingestor;
pub mod splitter;

pub use ingestor::{DocumentIngestor, IngestFileError, IngestReport};
pub use splitter::{Fragment, SplitterConfig, TextSplitter};
