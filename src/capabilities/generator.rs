//! Text generation capability with streaming support.

use async_trait::async_trait;

use crate::types::RagError;

/// One element of a generation stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextDelta {
    /// An incremental piece of generated text.
    Chunk(String),
    /// End marker: the generator finished cleanly.
    Done,
}

/// Pull-based lazy sequence of text deltas.
///
/// The producer side pushes [`TextDelta`]s into a flume channel; the
/// consumer awaits them one at a time with [`TextStream::next_delta`]. A
/// well-behaved generator terminates the sequence with [`TextDelta::Done`];
/// a disconnected channel without one signals a mid-stream producer death.
pub struct TextStream {
    receiver: flume::Receiver<Result<TextDelta, RagError>>,
}

impl TextStream {
    /// Creates a stream plus the sender half handed to the producer task.
    #[must_use]
    pub fn channel() -> (flume::Sender<Result<TextDelta, RagError>>, Self) {
        let (tx, rx) = flume::unbounded();
        (tx, Self { receiver: rx })
    }

    /// Awaits the next delta.
    ///
    /// Returns `None` once the stream is exhausted — either after
    /// [`TextDelta::Done`] has been yielded or when the producer went away.
    pub async fn next_delta(&mut self) -> Option<Result<TextDelta, RagError>> {
        match self.receiver.recv_async().await {
            Ok(item) => Some(item),
            Err(_) => None,
        }
    }

    /// Drains the whole stream into the concatenated text.
    ///
    /// Stops at the first error, returning it. Used by non-streaming
    /// callers and by the reformulator.
    pub async fn collect_text(mut self) -> Result<String, RagError> {
        let mut out = String::new();
        while let Some(item) = self.next_delta().await {
            match item? {
                TextDelta::Chunk(chunk) => out.push_str(&chunk),
                TextDelta::Done => break,
            }
        }
        Ok(out)
    }
}

/// Prompt-to-text generation capability.
///
/// Implementations wrap an external language model endpoint.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a complete response for `prompt`.
    ///
    /// The default implementation drains [`TextGenerator::generate_stream`].
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        self.generate_stream(prompt).await?.collect_text().await
    }

    /// Generate a streamed response for `prompt`.
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, RagError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_collects_until_done() {
        let (tx, stream) = TextStream::channel();
        tx.send(Ok(TextDelta::Chunk("Hello ".into()))).unwrap();
        tx.send(Ok(TextDelta::Chunk("world".into()))).unwrap();
        tx.send(Ok(TextDelta::Done)).unwrap();
        assert_eq!(stream.collect_text().await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn dropped_producer_ends_stream() {
        let (tx, mut stream) = TextStream::channel();
        tx.send(Ok(TextDelta::Chunk("partial".into()))).unwrap();
        drop(tx);
        assert!(matches!(
            stream.next_delta().await,
            Some(Ok(TextDelta::Chunk(_)))
        ));
        assert!(stream.next_delta().await.is_none());
    }

    #[tokio::test]
    async fn mid_stream_error_propagates() {
        let (tx, stream) = TextStream::channel();
        tx.send(Ok(TextDelta::Chunk("before ".into()))).unwrap();
        tx.send(Err(RagError::capability("generator", "connection reset")))
            .unwrap();
        assert!(stream.collect_text().await.is_err());
    }
}
