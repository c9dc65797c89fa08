//! Session-scoped conversation history: durable turn log with a
//! process-wide, per-session cache.
//!
//! Reads hydrate lazily from the backend on first access per session and
//! are served from cache afterwards. Writes are write-then-cache: a turn
//! is durably recorded before the cache ever serves it. The cache has no
//! built-in eviction — long-lived deployments with unbounded session
//! counts should layer a retention policy on top (extension point).
//!
//! Concurrency: each session id owns one async lock, so appends for the
//! same session serialize while different sessions never contend. The
//! separate [`SessionHistoryStore::request_gate`] lock lets the
//! orchestrator serialize whole same-session requests without holding the
//! cache lock across generator calls.

pub mod sqlite;

pub use sqlite::SqliteHistoryBackend;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::types::RagError;

/// One append-only conversation turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTurn {
    pub session_id: String,
    /// Strictly increasing per session, matching append order.
    pub turn_index: u64,
    /// `Message::USER` or `Message::ASSISTANT`.
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SessionTurn {
    /// Converts the turn into its prompt-level message form.
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::new(&self.role, &self.content)
    }
}

/// Durable storage for session turns.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// All turns for `session_id`, ordered by `turn_index` ascending.
    async fn load_turns(&self, session_id: &str) -> Result<Vec<SessionTurn>, RagError>;

    /// Durably record one turn.
    async fn append_turn(&self, turn: &SessionTurn) -> Result<(), RagError>;

    /// Remove every turn of `session_id`, returning how many were removed.
    async fn clear_session(&self, session_id: &str) -> Result<usize, RagError>;

    /// Ids of all sessions with at least one recorded turn.
    async fn session_ids(&self) -> Result<Vec<String>, RagError>;
}

/// In-memory [`HistoryBackend`] for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryHistoryBackend {
    turns: Mutex<FxHashMap<String, Vec<SessionTurn>>>,
}

impl MemoryHistoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryBackend for MemoryHistoryBackend {
    async fn load_turns(&self, session_id: &str) -> Result<Vec<SessionTurn>, RagError> {
        Ok(self
            .turns
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_turn(&self, turn: &SessionTurn) -> Result<(), RagError> {
        self.turns
            .lock()
            .entry(turn.session_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn clear_session(&self, session_id: &str) -> Result<usize, RagError> {
        Ok(self
            .turns
            .lock()
            .remove(session_id)
            .map_or(0, |turns| turns.len()))
    }

    async fn session_ids(&self) -> Result<Vec<String>, RagError> {
        let mut ids: Vec<String> = self.turns.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Default)]
struct SessionEntry {
    hydrated: bool,
    turns: Vec<SessionTurn>,
}

/// Cached, per-session-serialized view over a [`HistoryBackend`].
pub struct SessionHistoryStore {
    backend: Arc<dyn HistoryBackend>,
    sessions: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<SessionEntry>>>>,
    request_gates: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionHistoryStore {
    #[must_use]
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self {
            backend,
            sessions: Mutex::new(FxHashMap::default()),
            request_gates: Mutex::new(FxHashMap::default()),
        }
    }

    fn entry(&self, session_id: &str) -> Arc<tokio::sync::Mutex<SessionEntry>> {
        self.sessions
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Per-session lock serializing whole pipeline requests.
    ///
    /// Distinct from the cache entry lock: callers hold this across long
    /// suspension points (generation), while the entry lock only spans
    /// individual history operations.
    #[must_use]
    pub fn request_gate(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.request_gates
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    async fn hydrate(
        &self,
        entry: &mut SessionEntry,
        session_id: &str,
    ) -> Result<(), RagError> {
        if !entry.hydrated {
            entry.turns = self.backend.load_turns(session_id).await?;
            entry.hydrated = true;
        }
        Ok(())
    }

    /// Ordered turn log for `session_id`; empty for unknown sessions.
    pub async fn history(&self, session_id: &str) -> Result<Vec<SessionTurn>, RagError> {
        let entry = self.entry(session_id);
        let mut guard = entry.lock().await;
        self.hydrate(&mut guard, session_id).await?;
        Ok(guard.turns.clone())
    }

    /// History converted to prompt messages.
    pub async fn history_as_messages(&self, session_id: &str) -> Result<Vec<Message>, RagError> {
        Ok(self
            .history(session_id)
            .await?
            .iter()
            .map(SessionTurn::to_message)
            .collect())
    }

    /// Appends one turn: durable write first, cache update second.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<SessionTurn, RagError> {
        let entry = self.entry(session_id);
        let mut guard = entry.lock().await;
        self.hydrate(&mut guard, session_id).await?;
        let turn = self.append_locked(&mut guard, session_id, role, content).await?;
        Ok(turn)
    }

    /// Appends a user/assistant pair under one lock acquisition, so
    /// concurrent requests for the same session can never interleave
    /// their exchanges.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user_content: &str,
        assistant_content: &str,
    ) -> Result<(SessionTurn, SessionTurn), RagError> {
        let entry = self.entry(session_id);
        let mut guard = entry.lock().await;
        self.hydrate(&mut guard, session_id).await?;
        let user_turn = self
            .append_locked(&mut guard, session_id, Message::USER, user_content)
            .await?;
        let assistant_turn = self
            .append_locked(&mut guard, session_id, Message::ASSISTANT, assistant_content)
            .await?;
        Ok((user_turn, assistant_turn))
    }

    async fn append_locked(
        &self,
        entry: &mut SessionEntry,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<SessionTurn, RagError> {
        let turn = SessionTurn {
            session_id: session_id.to_string(),
            turn_index: entry.turns.len() as u64,
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.backend.append_turn(&turn).await?;
        entry.turns.push(turn.clone());
        Ok(turn)
    }

    /// Removes a session's turns durably and from cache.
    pub async fn clear_session(&self, session_id: &str) -> Result<usize, RagError> {
        let entry = self.entry(session_id);
        let mut guard = entry.lock().await;
        let removed = self.backend.clear_session(session_id).await?;
        guard.turns.clear();
        guard.hydrated = true;
        Ok(removed)
    }

    /// All known session ids, from the durable backend.
    pub async fn session_ids(&self) -> Result<Vec<String>, RagError> {
        self.backend.session_ids().await
    }
}
