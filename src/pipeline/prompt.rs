//! Prompt assembly for answer generation.

use crate::message::Message;
use crate::retrieval::ScoredParent;

const ANSWER_INSTRUCTION: &str = "You are an intelligent assistant for question answering. \
Use the retrieved context excerpts below to answer the question. \
Base your answer solely on the provided excerpts, ensuring accuracy and relevance. \
If the excerpts do not contain the information, say that you do not have it; \
do not speculate beyond the provided material.";

/// Builds the generation prompt from system instructions, labeled
/// retrieved excerpts, serialized history, and the user query.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptBuilder;

impl PromptBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Renders the full prompt.
    ///
    /// Excerpts are labeled `Document N` in rank order so the model can
    /// reference them; an empty retrieval result states so explicitly
    /// rather than leaving a dangling header.
    #[must_use]
    pub fn build(
        &self,
        excerpts: &[ScoredParent],
        history: &[Message],
        user_query: &str,
    ) -> String {
        let mut prompt = String::from(ANSWER_INSTRUCTION);
        prompt.push_str("\n\nContext:\n");
        if excerpts.is_empty() {
            prompt.push_str("(no relevant documents were found)\n");
        } else {
            for (rank, scored) in excerpts.iter().enumerate() {
                prompt.push_str(&format!(
                    "Document {} (source: {}):\n{}\n\n",
                    rank + 1,
                    scored.parent.source,
                    scored.parent.text
                ));
            }
        }
        if !history.is_empty() {
            prompt.push_str("\nChat history:\n");
            prompt.push_str(&Message::render_transcript(history));
        }
        prompt.push_str("\nuser: ");
        prompt.push_str(user_query);
        prompt
    }
}
