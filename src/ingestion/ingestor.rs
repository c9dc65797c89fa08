//! Directory ingestion into the corpus.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::instrument;

use super::{SplitterConfig, TextSplitter};
use crate::capabilities::{LoaderRegistry, TextEmbedder, call_with_retry};
use crate::config::RagConfig;
use crate::stores::{ChildChunk, Corpus, DocumentRecord, ParentChunk};
use crate::types::{IdGenerator, RagError};

/// A single file that failed to ingest. The batch carries on without it.
#[derive(Clone, Debug)]
pub struct IngestFileError {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of one [`DocumentIngestor::ingest`] batch.
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    /// Files whose content was (re-)ingested this run.
    pub documents_loaded: usize,
    /// Files skipped because their content hash was unchanged.
    pub documents_unchanged: usize,
    /// Parent chunks written this run.
    pub parent_chunks: usize,
    /// Child chunks embedded and indexed this run.
    pub child_chunks: usize,
    /// Per-file failures; never aborts the batch.
    pub errors: Vec<IngestFileError>,
}

/// Loads raw documents, splits them hierarchically, and populates the
/// chunk store and vector index through the [`Corpus`] pair.
///
/// Ingestion is idempotent per source file: the extracted text is hashed
/// and an unchanged document is a no-op. A changed document is replaced
/// insert-new-then-retire-old, so concurrent retrieval never observes a
/// gap where the document has no chunks at all.
pub struct DocumentIngestor {
    loaders: LoaderRegistry,
    embedder: Arc<dyn TextEmbedder>,
    corpus: Corpus,
    parent_splitter: TextSplitter,
    child_splitter: TextSplitter,
    embed_timeout: Duration,
    embed_retries: usize,
    ids: IdGenerator,
}

impl DocumentIngestor {
    #[must_use]
    pub fn new(
        loaders: LoaderRegistry,
        embedder: Arc<dyn TextEmbedder>,
        corpus: Corpus,
        config: &RagConfig,
    ) -> Self {
        Self {
            loaders,
            embedder,
            corpus,
            parent_splitter: TextSplitter::new(config.parent_splitter),
            child_splitter: TextSplitter::new(config.child_splitter),
            embed_timeout: config.embed_timeout,
            embed_retries: config.embed_retries,
            ids: IdGenerator::new(),
        }
    }

    /// Overrides the splitter profiles, for corpora with unusual texture.
    #[must_use]
    pub fn with_splitters(mut self, parents: SplitterConfig, children: SplitterConfig) -> Self {
        self.parent_splitter = TextSplitter::new(parents);
        self.child_splitter = TextSplitter::new(children);
        self
    }

    /// Ingests every regular file in `directory`.
    ///
    /// Files are visited in name order for deterministic reports. A single
    /// file's load, split, or embed failure is recorded in the report and
    /// skipped; only a failure to read the directory itself is an error.
    #[instrument(skip(self), err)]
    pub async fn ingest(&self, directory: &Path) -> Result<IngestReport, RagError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();

        let mut report = IngestReport::default();
        for path in entries {
            match self.ingest_file(&path).await {
                Ok(FileOutcome::Unchanged) => report.documents_unchanged += 1,
                Ok(FileOutcome::Loaded { parents, children }) => {
                    report.documents_loaded += 1;
                    report.parent_chunks += parents;
                    report.child_chunks += children;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping file");
                    report.errors.push(IngestFileError {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            loaded = report.documents_loaded,
            unchanged = report.documents_unchanged,
            parents = report.parent_chunks,
            children = report.child_chunks,
            errors = report.errors.len(),
            "ingest batch finished"
        );
        Ok(report)
    }

    async fn ingest_file(&self, path: &Path) -> Result<FileOutcome, RagError> {
        let source = path.display().to_string();
        let text = self.loaders.load(path).await?;
        let content_hash = hex_digest(&text);

        let existing = self.corpus.chunks().document_by_source(&source).await?;
        if let Some(ref previous) = existing {
            if previous.content_hash == content_hash {
                return Ok(FileOutcome::Unchanged);
            }
        }

        let document = DocumentRecord {
            id: self.ids.document_id(),
            source: source.clone(),
            content_hash,
            loaded_at: Utc::now(),
        };

        let mut parents = Vec::new();
        let mut children = Vec::new();
        for (order_index, fragment) in self.parent_splitter.split(&text).into_iter().enumerate() {
            let parent_id = self.ids.parent_id();
            for piece in self.child_splitter.split(&fragment.text) {
                children.push((parent_id.clone(), piece));
            }
            parents.push(ParentChunk {
                parent_id,
                document_id: document.id.clone(),
                order_index,
                source: source.clone(),
                text: fragment.text,
            });
        }

        let child_texts: Vec<String> = children.iter().map(|(_, piece)| piece.text.clone()).collect();
        let embeddings = call_with_retry(
            "embedder",
            self.embed_timeout,
            self.embed_retries,
            || self.embedder.embed_batch(&child_texts),
        )
        .await?;
        if embeddings.len() != children.len() {
            return Err(RagError::capability(
                "embedder",
                format!(
                    "batch returned {} vectors for {} inputs",
                    embeddings.len(),
                    children.len()
                ),
            ));
        }

        let child_chunks: Vec<ChildChunk> = children
            .into_iter()
            .zip(embeddings)
            .map(|((parent_id, piece), embedding)| ChildChunk {
                child_id: self.ids.child_id(),
                parent_id,
                text: piece.text,
                offset: piece.offset,
                embedding,
            })
            .collect();

        let parent_count = parents.len();
        let child_count = child_chunks.len();

        // New content becomes visible before the old is retired, so a
        // concurrent query always finds the document represented.
        self.corpus
            .insert_document(&document, &parents, child_chunks)
            .await?;
        if let Some(previous) = existing {
            self.corpus.remove_document(&previous.id).await?;
        }

        Ok(FileOutcome::Loaded {
            parents: parent_count,
            children: child_count,
        })
    }
}

enum FileOutcome {
    Unchanged,
    Loaded { parents: usize, children: usize },
}

fn hex_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
