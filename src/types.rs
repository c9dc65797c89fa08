//! Core identifiers and the error taxonomy shared across the crate.
//!
//! Every fallible operation in ragweave returns [`RagError`]. The variants
//! map onto how the pipeline reacts to a failure:
//!
//! - [`RagError::Validation`] — bad caller input, rejected up front.
//! - [`RagError::CapabilityUnavailable`] — an external capability
//!   (embedder, generator, loader) stayed unreachable after its bounded
//!   retry; callers degrade or fail depending on the stage.
//! - [`RagError::NotFound`] — an individually tolerable miss (one parent
//!   lookup, one session); logged and skipped by callers.
//! - [`RagError::Consistency`] — a vector resolved to no parent; logged
//!   and self-healed by the reconciliation pass.
//! - [`RagError::Storage`] / [`RagError::Io`] — backend failures.
//! - [`RagError::Internal`] — anything unexpected; the pipeline moves to
//!   its failed state preserving partial output.

use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for ragweave operations.
#[derive(Debug, Error, Diagnostic)]
pub enum RagError {
    /// Caller input failed validation.
    #[error("validation failed: {0}")]
    #[diagnostic(
        code(ragweave::validation),
        help("Check input data format and required fields.")
    )]
    Validation(String),

    /// An external capability could not be reached within its retry budget.
    #[error("capability unavailable ({capability}): {message}")]
    #[diagnostic(
        code(ragweave::capability_unavailable),
        help("The external service may be down or timing out. Verify connectivity and timeout settings.")
    )]
    CapabilityUnavailable {
        capability: &'static str,
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{what} not found: {id}")]
    #[diagnostic(code(ragweave::not_found))]
    NotFound { what: &'static str, id: String },

    /// A cross-store invariant was observed broken.
    #[error("consistency violation: {0}")]
    #[diagnostic(
        code(ragweave::consistency),
        help("Run Corpus::reconcile to evict orphaned vectors.")
    )]
    Consistency(String),

    /// Durable storage backend error.
    #[error("storage error: {0}")]
    #[diagnostic(code(ragweave::storage))]
    Storage(String),

    /// Filesystem error during ingestion.
    #[error("io error: {0}")]
    #[diagnostic(code(ragweave::io))]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error(transparent)]
    #[diagnostic(code(ragweave::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    #[diagnostic(code(ragweave::internal))]
    Internal(String),
}

impl RagError {
    /// Shorthand for a capability failure.
    pub fn capability(capability: &'static str, message: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            capability,
            message: message.into(),
        }
    }

    /// Returns `true` when the error represents an individually tolerable
    /// miss that callers log and skip rather than propagate.
    #[must_use]
    pub fn is_tolerable_miss(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Consistency(_))
    }
}

/// Generates collision-resistant identifiers for chunks and documents.
///
/// UUIDv4 everywhere, prefixed by entity kind so raw ids stay greppable in
/// logs and database dumps.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn document_id(&self) -> String {
        format!("doc-{}", uuid::Uuid::new_v4())
    }

    #[must_use]
    pub fn parent_id(&self) -> String {
        format!("parent-{}", uuid::Uuid::new_v4())
    }

    #[must_use]
    pub fn child_id(&self) -> String {
        format!("child-{}", uuid::Uuid::new_v4())
    }

    #[must_use]
    pub fn interaction_id(&self) -> String {
        format!("intx-{}", uuid::Uuid::new_v4())
    }
}
