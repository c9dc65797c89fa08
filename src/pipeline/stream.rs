//! Pull-based answer streaming.
//!
//! The orchestrator task produces [`AnswerEvent`]s into a flume channel;
//! the caller consumes them one at a time. Dropping the [`AnswerStream`]
//! is how a client disconnect reaches the pipeline: the producer's next
//! send fails and the orchestrator runs its cancellation path.

use crate::formatting::ContentBlock;
use crate::pipeline::orchestrator::ChatStage;

/// Terminal failure description carried to the caller.
#[derive(Clone, Debug)]
pub struct PipelineFailure {
    /// Stage the pipeline was in when it failed.
    pub stage: ChatStage,
    pub message: String,
}

/// One element of the answer stream.
#[derive(Clone, Debug)]
pub enum AnswerEvent {
    /// Incremental generated text, forwarded as it arrives.
    Delta(String),
    /// Terminal: the finished, ordered block list (including the duration
    /// status block).
    Completed(Vec<ContentBlock>),
    /// Terminal: the pipeline failed; any blocks built before the failure
    /// are preserved alongside the error.
    Failed {
        partial: Vec<ContentBlock>,
        failure: PipelineFailure,
    },
}

/// Finite lazy sequence of [`AnswerEvent`]s, terminated by `Completed` or
/// `Failed`.
pub struct AnswerStream {
    receiver: flume::Receiver<AnswerEvent>,
}

impl AnswerStream {
    pub(crate) fn channel() -> (flume::Sender<AnswerEvent>, Self) {
        let (tx, rx) = flume::unbounded();
        (tx, Self { receiver: rx })
    }

    /// Awaits the next event; `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<AnswerEvent> {
        self.receiver.recv_async().await.ok()
    }

    /// Drains the stream, returning the terminal event.
    ///
    /// Deltas are discarded along the way; callers that want them should
    /// loop over [`AnswerStream::next_event`] instead.
    pub async fn into_final(mut self) -> Option<AnswerEvent> {
        let mut terminal = None;
        while let Some(event) = self.next_event().await {
            match event {
                AnswerEvent::Delta(_) => {}
                other => terminal = Some(other),
            }
        }
        terminal
    }
}
