//! Deterministic mock capabilities.

use std::time::Duration;

use async_trait::async_trait;
use ragweave::capabilities::{TextDelta, TextEmbedder, TextGenerator, TextStream};
use ragweave::types::RagError;

/// Embeds text by counting topic keyword occurrences along fixed axes.
///
/// Deterministic and cheap, with the one property retrieval tests need:
/// text about a topic lands measurably closer to queries about that topic
/// than to anything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopicEmbedder;

impl TopicEmbedder {
    pub const DIMENSION: usize = 4;
    const TOPICS: [&'static str; 3] = ["refund", "shipping", "warranty"];
}

#[async_trait]
impl TextEmbedder for TopicEmbedder {
    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let lower = text.to_lowercase();
        let mut vector = vec![0.1f32; Self::DIMENSION];
        for (axis, topic) in Self::TOPICS.iter().enumerate() {
            vector[axis] += lower.matches(topic).count() as f32;
        }
        // Catch-all axis keyed to text length keeps off-topic texts from
        // collapsing onto one point.
        vector[Self::DIMENSION - 1] += (lower.len() % 7) as f32 * 0.01;
        Ok(vector)
    }
}

/// How the mock generator behaves when streaming.
#[derive(Clone, Debug)]
pub enum GeneratorScript {
    /// Stream `reply` in fixed-size chunks, then the end marker.
    Reply(String),
    /// Stream `reply` with a pause between chunks (for disconnect tests).
    SlowReply { reply: String, delay: Duration },
    /// Stream some chunks, then fail mid-stream.
    FailAfter { chunks: Vec<String>, error: String },
    /// Never produce anything (for timeout tests).
    Hang,
}

/// Scripted [`TextGenerator`].
///
/// When `stall_reformulation` is set, prompts that ask for a standalone
/// question hang instead of answering, so tests can drive the
/// degrade-to-raw-query path while the answer path keeps working.
/// Every prompt seen is recorded for assertions.
#[derive(Clone, Debug)]
pub struct MockGenerator {
    pub script: GeneratorScript,
    pub stall_reformulation: bool,
    pub seen_prompts: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn replying(reply: &str) -> Self {
        Self::scripted(GeneratorScript::Reply(reply.to_string()))
    }

    pub fn scripted(script: GeneratorScript) -> Self {
        Self {
            script,
            stall_reformulation: false,
            seen_prompts: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn with_stalled_reformulation(mut self) -> Self {
        self.stall_reformulation = true;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.seen_prompts.lock().unwrap().clone()
    }
}

fn chunked(reply: &str) -> Vec<String> {
    let chars: Vec<char> = reply.chars().collect();
    chars
        .chunks(8)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, RagError> {
        let (tx, stream) = TextStream::channel();
        self.seen_prompts.lock().unwrap().push(prompt.to_string());

        let is_reformulation = prompt.contains("formulate a standalone question");
        if self.stall_reformulation && is_reformulation {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let _ = tx.send(Ok(TextDelta::Done));
            });
            return Ok(stream);
        }

        let script = self.script.clone();
        tokio::spawn(async move {
            match script {
                GeneratorScript::Reply(reply) => {
                    for chunk in chunked(&reply) {
                        if tx.send(Ok(TextDelta::Chunk(chunk))).is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(Ok(TextDelta::Done));
                }
                GeneratorScript::SlowReply { reply, delay } => {
                    for chunk in chunked(&reply) {
                        if tx.send(Ok(TextDelta::Chunk(chunk))).is_err() {
                            return;
                        }
                        tokio::time::sleep(delay).await;
                    }
                    let _ = tx.send(Ok(TextDelta::Done));
                }
                GeneratorScript::FailAfter { chunks, error } => {
                    for chunk in chunks {
                        if tx.send(Ok(TextDelta::Chunk(chunk))).is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(Err(RagError::capability("generator", error)));
                }
                GeneratorScript::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    let _ = tx.send(Ok(TextDelta::Done));
                }
            }
        });
        Ok(stream)
    }
}
