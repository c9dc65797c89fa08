//! External capability seams: embedder, generator, and document loader.
//!
//! These traits are the crate's dependency-injection boundary. Production
//! wiring plugs in real model clients; tests plug in the deterministic
//! mocks from `tests/common`. Every capability call made through
//! [`call_with_retry`] carries a bounded timeout and maps failures to
//! [`RagError::CapabilityUnavailable`], so no pipeline stage can hang on a
//! slow external service.

pub mod embedder;
pub mod generator;
pub mod loader;

pub use embedder::TextEmbedder;
pub use generator::{TextDelta, TextGenerator, TextStream};
pub use loader::{DocumentLoader, LoaderRegistry, PlainTextLoader};

use std::future::Future;
use std::time::Duration;

use crate::types::RagError;

/// Runs `operation` under `timeout`, retrying up to `retries` additional
/// times on failure or expiry.
///
/// The factory is invoked fresh for every attempt. All failures collapse
/// into [`RagError::CapabilityUnavailable`] tagged with `capability` so
/// callers can apply their stage-specific degrade policy.
pub async fn call_with_retry<T, F, Fut>(
    capability: &'static str,
    timeout: Duration,
    retries: usize,
    mut operation: F,
) -> Result<T, RagError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RagError>>,
{
    let mut last_error = String::new();
    for attempt in 0..=retries {
        match tokio::time::timeout(timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                tracing::warn!(capability, attempt, error = %err, "capability call failed");
                last_error = err.to_string();
            }
            Err(_) => {
                tracing::warn!(capability, attempt, ?timeout, "capability call timed out");
                last_error = format!("timed out after {timeout:?}");
            }
        }
    }
    Err(RagError::capability(capability, last_error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retry_recovers_from_one_failure() {
        let attempts = AtomicUsize::new(0);
        let result = call_with_retry("embedder", Duration::from_secs(1), 1, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(RagError::Internal("transient".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_map_to_capability_unavailable() {
        let result: Result<(), _> = call_with_retry("generator", Duration::from_secs(1), 1, || {
            async { Err(RagError::Internal("still down".into())) }
        })
        .await;
        match result {
            Err(RagError::CapabilityUnavailable { capability, message }) => {
                assert_eq!(capability, "generator");
                assert!(message.contains("still down"));
            }
            other => panic!("expected CapabilityUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_bounded() {
        let result: Result<(), _> =
            call_with_retry("embedder", Duration::from_millis(20), 0, || {
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;
        match result {
            Err(RagError::CapabilityUnavailable { message, .. }) => {
                assert!(message.contains("timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
