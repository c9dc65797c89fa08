//! Follow-up query reformulation.
//!
//! Turns "what about for orders over 50 euros?" into a question that can
//! be embedded and searched without the chat history. This stage degrades,
//! never fails: any generator problem falls back to the raw query.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::capabilities::TextGenerator;
use crate::message::Message;
use crate::sessions::SessionHistoryStore;
use crate::types::RagError;

const CONTEXTUALIZE_INSTRUCTION: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, \
just reformulate it if needed and otherwise return it as is.";

/// Rewrites follow-up queries into standalone form using session history.
pub struct QueryReformulator {
    generator: Arc<dyn TextGenerator>,
    history: Arc<SessionHistoryStore>,
    timeout: Duration,
}

impl QueryReformulator {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        history: Arc<SessionHistoryStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            history,
            timeout,
        }
    }

    /// Returns the standalone form of `user_query`.
    ///
    /// With no prior turns the query is already standalone and comes back
    /// unchanged without a generator call. With history, the generator's
    /// output is taken verbatim; on timeout, error, or blank output the
    /// raw query is used instead.
    #[instrument(skip(self, user_query), err)]
    pub async fn reformulate(
        &self,
        session_id: &str,
        user_query: &str,
    ) -> Result<String, RagError> {
        let history = self.history.history_as_messages(session_id).await?;
        if history.is_empty() {
            return Ok(user_query.to_string());
        }

        let prompt = build_prompt(&history, user_query);
        match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(Ok(standalone)) if !standalone.trim().is_empty() => {
                Ok(standalone.trim().to_string())
            }
            Ok(Ok(_)) => {
                tracing::warn!(session_id, "reformulation produced empty output; using raw query");
                Ok(user_query.to_string())
            }
            Ok(Err(err)) => {
                tracing::warn!(session_id, error = %err, "reformulation failed; using raw query");
                Ok(user_query.to_string())
            }
            Err(_) => {
                tracing::warn!(session_id, "reformulation timed out; using raw query");
                Ok(user_query.to_string())
            }
        }
    }
}

fn build_prompt(history: &[Message], user_query: &str) -> String {
    format!(
        "{CONTEXTUALIZE_INSTRUCTION}\n\nChat history:\n{}\nuser: {user_query}",
        Message::render_transcript(history)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{TextDelta, TextStream};
    use crate::sessions::MemoryHistoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedGenerator {
        reply: String,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate_stream(&self, _prompt: &str) -> Result<TextStream, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (tx, stream) = TextStream::channel();
            tx.send(Ok(TextDelta::Chunk(self.reply.clone()))).ok();
            tx.send(Ok(TextDelta::Done)).ok();
            Ok(stream)
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate_stream(&self, _prompt: &str) -> Result<TextStream, RagError> {
            Err(RagError::capability("generator", "unreachable"))
        }
    }

    fn history_store() -> Arc<SessionHistoryStore> {
        Arc::new(SessionHistoryStore::new(Arc::new(
            MemoryHistoryBackend::new(),
        )))
    }

    #[tokio::test]
    async fn empty_history_skips_the_generator() {
        let generator = Arc::new(ScriptedGenerator::new("should not be used"));
        let reformulator = QueryReformulator::new(
            generator.clone(),
            history_store(),
            Duration::from_secs(5),
        );
        let out = reformulator
            .reformulate("fresh", "what is the refund policy?")
            .await
            .unwrap();
        assert_eq!(out, "what is the refund policy?");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_empty_history_uses_generator_output_verbatim() {
        let history = history_store();
        history
            .append_exchange("s1", "what is the refund policy?", "30 days.")
            .await
            .unwrap();

        let generator = Arc::new(ScriptedGenerator::new(
            "what is the refund policy for orders over 50 euros?",
        ));
        let reformulator =
            QueryReformulator::new(generator.clone(), history, Duration::from_secs(5));
        let out = reformulator
            .reformulate("s1", "what about orders over 50 euros?")
            .await
            .unwrap();
        assert_eq!(out, "what is the refund policy for orders over 50 euros?");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generator_failure_degrades_to_raw_query() {
        let history = history_store();
        history
            .append_exchange("s1", "first question", "first answer")
            .await
            .unwrap();

        let reformulator = QueryReformulator::new(
            Arc::new(FailingGenerator),
            history,
            Duration::from_secs(5),
        );
        let out = reformulator
            .reformulate("s1", "and a follow-up?")
            .await
            .unwrap();
        assert_eq!(out, "and a follow-up?");
    }
}
