//! Conversation orchestration state machine.
//!
//! One request is one spawned task walking the stages
//! `Received → Reformulating → Retrieving → Generating → Persisting →
//! Complete`, with `Failed` reachable from any of them. Stage policies:
//!
//! - Reformulating can only degrade (raw query), never fail the pipeline.
//! - Retrieving degrades to empty excerpts if the engine is unavailable.
//! - Generating failing mid-stream persists the partial output, appends an
//!   error status block, and terminates the stream — no silent truncation.
//! - A client disconnect during Generating cancels the generator stream;
//!   the partial turn IS persisted (one consistent policy, tested).
//!
//! Requests for the same session are serialized through the history
//! store's per-session request gate; independent sessions run fully in
//! parallel.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::audit::{InteractionRecord, InteractionRecorder};
use crate::capabilities::{TextDelta, TextEmbedder, TextGenerator};
use crate::config::RagConfig;
use crate::formatting::{ContentBlock, segment};
use crate::pipeline::prompt::PromptBuilder;
use crate::pipeline::stream::{AnswerEvent, AnswerStream, PipelineFailure};
use crate::reformulate::QueryReformulator;
use crate::retrieval::{RetrievalEngine, ScoredParent};
use crate::sessions::SessionHistoryStore;
use crate::stores::Corpus;
use crate::types::RagError;

/// Pipeline stage identifiers, reported in failures and traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStage {
    Received,
    Reformulating,
    Retrieving,
    Generating,
    Persisting,
    Complete,
    Failed,
}

impl std::fmt::Display for ChatStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Received => "received",
            Self::Reformulating => "reformulating",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One caller question addressed to a session.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub session_id: String,
    /// Authenticated user, if any; carried through to the audit record.
    pub user_id: Option<String>,
    pub question: String,
    /// Overrides the configured `top_k` for this request.
    pub top_k: Option<usize>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            question: question.into(),
            top_k: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Collected outcome of a request, for non-streaming callers.
#[derive(Clone, Debug)]
pub struct ChatResponse {
    pub blocks: Vec<ContentBlock>,
    /// Present when the pipeline ended in `Failed`; `blocks` then holds
    /// whatever partial content was produced.
    pub failure: Option<PipelineFailure>,
}

struct Inner {
    reformulator: QueryReformulator,
    retrieval: RetrievalEngine,
    generator: Arc<dyn TextGenerator>,
    history: Arc<SessionHistoryStore>,
    recorder: Arc<dyn InteractionRecorder>,
    prompt: PromptBuilder,
    config: RagConfig,
}

/// Sequences one question through reformulation, retrieval, generation,
/// persistence, and formatting.
///
/// All collaborators are injected through the constructor; the
/// orchestrator holds no ambient global state and is cheap to clone.
#[derive(Clone)]
pub struct ConversationOrchestrator {
    inner: Arc<Inner>,
}

impl ConversationOrchestrator {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        generator: Arc<dyn TextGenerator>,
        corpus: Corpus,
        history: Arc<SessionHistoryStore>,
        recorder: Arc<dyn InteractionRecorder>,
        config: RagConfig,
    ) -> Self {
        let reformulator = QueryReformulator::new(
            generator.clone(),
            history.clone(),
            config.reformulate_timeout,
        );
        let retrieval = RetrievalEngine::new(embedder, corpus, &config);
        Self {
            inner: Arc::new(Inner {
                reformulator,
                retrieval,
                generator,
                history,
                recorder,
                prompt: PromptBuilder::new(),
                config,
            }),
        }
    }

    /// Starts the pipeline for `request` and returns the answer stream.
    ///
    /// The pipeline runs in its own task; dropping the returned stream
    /// signals a client disconnect and cancels generation.
    #[must_use]
    pub fn ask(&self, request: ChatRequest) -> AnswerStream {
        let (tx, stream) = AnswerStream::channel();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            run_pipeline(inner, request, tx).await;
        });
        stream
    }

    /// Runs the pipeline to completion and collects the outcome.
    pub async fn ask_complete(&self, request: ChatRequest) -> ChatResponse {
        match self.ask(request).into_final().await {
            Some(AnswerEvent::Completed(blocks)) => ChatResponse {
                blocks,
                failure: None,
            },
            Some(AnswerEvent::Failed { partial, failure }) => ChatResponse {
                blocks: partial,
                failure: Some(failure),
            },
            _ => ChatResponse {
                blocks: Vec::new(),
                failure: Some(PipelineFailure {
                    stage: ChatStage::Failed,
                    message: "pipeline task ended without a terminal event".into(),
                }),
            },
        }
    }

    /// The session history store backing this orchestrator, for the
    /// history read/delete surface.
    #[must_use]
    pub fn history(&self) -> Arc<SessionHistoryStore> {
        self.inner.history.clone()
    }
}

fn fail(tx: &flume::Sender<AnswerEvent>, stage: ChatStage, message: String, partial: Vec<ContentBlock>) {
    tracing::warn!(%stage, %message, "pipeline failed");
    let _ = tx.send(AnswerEvent::Failed {
        partial,
        failure: PipelineFailure { stage, message },
    });
}

async fn run_pipeline(
    inner: Arc<Inner>,
    request: ChatRequest,
    tx: flume::Sender<AnswerEvent>,
) {
    // RECEIVED: validate and timestamp before touching any collaborator.
    let t0 = Utc::now();
    let started = Instant::now();
    if request.question.trim().is_empty() {
        fail(
            &tx,
            ChatStage::Received,
            RagError::Validation("question must not be empty".into()).to_string(),
            Vec::new(),
        );
        return;
    }

    // Same-session requests are serialized for the whole pipeline so their
    // history reads and exchange appends cannot interleave.
    let gate = inner.history.request_gate(&request.session_id);
    let _serialized = gate.lock().await;

    // REFORMULATING: degrade-only stage.
    tracing::debug!(session_id = %request.session_id, stage = %ChatStage::Reformulating, "stage transition");
    let standalone = match inner
        .reformulator
        .reformulate(&request.session_id, &request.question)
        .await
    {
        Ok(standalone) => standalone,
        Err(err) => {
            tracing::warn!(error = %err, "reformulation unavailable; using raw query");
            request.question.clone()
        }
    };

    // RETRIEVING: empty results are valid; an unavailable engine degrades
    // to answering without excerpts.
    tracing::debug!(session_id = %request.session_id, stage = %ChatStage::Retrieving, "stage transition");
    let top_k = request.top_k.unwrap_or(inner.config.top_k);
    let excerpts: Vec<ScoredParent> = match inner.retrieval.retrieve(&standalone, top_k).await {
        Ok(excerpts) => excerpts,
        Err(err) => {
            tracing::warn!(error = %err, "retrieval unavailable; proceeding without excerpts");
            Vec::new()
        }
    };

    // GENERATING: stream deltas to the caller as they arrive.
    tracing::debug!(session_id = %request.session_id, stage = %ChatStage::Generating, "stage transition");
    let history_messages = match inner.history.history_as_messages(&request.session_id).await {
        Ok(messages) => messages,
        Err(err) => {
            tracing::warn!(error = %err, "history unavailable for prompt; using empty history");
            Vec::new()
        }
    };
    let prompt = inner
        .prompt
        .build(&excerpts, &history_messages, &request.question);

    let deadline = started + inner.config.generate_timeout;
    let mut stream = match tokio::time::timeout_at(deadline, inner.generator.generate_stream(&prompt))
        .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            fail(&tx, ChatStage::Generating, err.to_string(), Vec::new());
            return;
        }
        Err(_) => {
            fail(
                &tx,
                ChatStage::Generating,
                "generation timed out before producing output".into(),
                Vec::new(),
            );
            return;
        }
    };

    let mut raw_answer = String::new();
    let outcome = loop {
        match tokio::time::timeout_at(deadline, stream.next_delta()).await {
            Ok(Some(Ok(TextDelta::Chunk(chunk)))) => {
                raw_answer.push_str(&chunk);
                if tx.send(AnswerEvent::Delta(chunk)).is_err() {
                    // Receiver dropped: client disconnected. Cancel the
                    // generator stream by dropping it.
                    break GenerationOutcome::Cancelled;
                }
            }
            Ok(Some(Ok(TextDelta::Done))) => break GenerationOutcome::Finished,
            Ok(Some(Err(err))) => break GenerationOutcome::Errored(err.to_string()),
            Ok(None) => {
                break GenerationOutcome::Errored(
                    "generator stream ended without its end marker".into(),
                );
            }
            Err(_) => break GenerationOutcome::Errored("generation timed out mid-stream".into()),
        }
    };
    drop(stream);

    // PERSISTING: append the exchange and hand the interaction to the
    // audit recorder. The cancellation policy persists partial turns.
    tracing::debug!(session_id = %request.session_id, stage = %ChatStage::Persisting, "stage transition");
    let skip_persist =
        raw_answer.is_empty() && !matches!(outcome, GenerationOutcome::Finished);
    let persist_failure = if skip_persist {
        // Nothing was generated before the disconnect or error; an empty
        // assistant turn would add noise without information.
        None
    } else {
        persist_exchange(&inner, &request, &raw_answer).await.err()
    };
    if let Some(err) = persist_failure {
        let mut partial = segment(&raw_answer);
        partial.push(ContentBlock::status(format!(
            "Response could not be recorded: {err}"
        )));
        fail(&tx, ChatStage::Persisting, err.to_string(), partial);
        return;
    }

    let t1 = Utc::now();
    let elapsed = (t1 - t0).num_milliseconds() as f64 / 1000.0;
    let mut blocks = segment(&raw_answer);
    let failure = match &outcome {
        GenerationOutcome::Finished => {
            blocks.push(ContentBlock::status(format!(
                "Thought for {elapsed:.1} seconds"
            )));
            None
        }
        GenerationOutcome::Cancelled => {
            blocks.push(ContentBlock::status(
                "Generation cancelled by client; partial response recorded",
            ));
            Some(PipelineFailure {
                stage: ChatStage::Generating,
                message: "client disconnected during generation".into(),
            })
        }
        GenerationOutcome::Errored(message) => {
            blocks.push(ContentBlock::status(format!(
                "Generation failed: {message}"
            )));
            Some(PipelineFailure {
                stage: ChatStage::Generating,
                message: message.clone(),
            })
        }
    };

    let record = InteractionRecord::new(
        &request.session_id,
        request.user_id.as_deref(),
        &request.question,
        blocks.clone(),
        t0,
        t1,
    );
    if let Err(err) = inner.recorder.record_interaction(&record).await {
        tracing::warn!(error = %err, "interaction audit write failed");
    }

    // COMPLETE / FAILED terminal event.
    match failure {
        None => {
            tracing::debug!(session_id = %request.session_id, stage = %ChatStage::Complete, elapsed, "stage transition");
            let _ = tx.send(AnswerEvent::Completed(blocks));
        }
        Some(failure) => fail(&tx, failure.stage, failure.message, blocks),
    }
}

enum GenerationOutcome {
    Finished,
    Cancelled,
    Errored(String),
}

async fn persist_exchange(
    inner: &Inner,
    request: &ChatRequest,
    raw_answer: &str,
) -> Result<(), RagError> {
    inner
        .history
        .append_exchange(&request.session_id, &request.question, raw_answer)
        .await?;
    Ok(())
}
