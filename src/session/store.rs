use crate::session::clock::Clock;
use crate::session::types::{Session, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Type alias for Results in this module
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Only user and assistant turns may be appended; the preamble is fixed.
    #[error("Cannot append a {role} turn to session {session_id}")]
    InvalidTurn { session_id: String, role: String },
}

/// Settings the store needs from configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub preamble: String,
}

impl SessionSettings {
    pub fn new(ttl: Duration, preamble: impl Into<String>) -> Self {
        Self {
            ttl,
            preamble: preamble.into(),
        }
    }
}

struct Entry {
    session: Session,
    turn_lock: Arc<Mutex<()>>,
}

/// In-memory map from session id to session state.
///
/// Every read or write of a single session happens under one acquisition of
/// the map lock, which makes each operation atomic with respect to the others
/// on the same id. Callers get cloned snapshots, never references into the map.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    settings: Arc<SessionSettings>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(settings: SessionSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(settings),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.settings.ttl
    }

    fn chrono_ttl(&self) -> chrono::Duration {
        // out-of-range TTLs behave as "never expires"
        chrono::Duration::from_std(self.settings.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100))
    }

    fn new_entry(&self, session_id: &str) -> Entry {
        Entry {
            session: Session::new(session_id, &self.settings.preamble, self.clock.now()),
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the existing session or creates one seeded with the preamble.
    pub async fn get_or_create(&self, session_id: &str) -> Session {
        {
            let guard = self.sessions.read().await;
            if let Some(entry) = guard.get(session_id) {
                return entry.session.clone();
            }
        }

        let mut guard = self.sessions.write().await;
        // Another task may have inserted between the two locks
        let entry = guard.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id = %session_id, "Creating session");
            self.new_entry(session_id)
        });
        entry.session.clone()
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        let guard = self.sessions.read().await;
        guard.get(session_id).map(|e| e.session.clone())
    }

    pub async fn exists(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Refreshes `last_active`. Missing ids are ignored.
    pub async fn touch(&self, session_id: &str) {
        let now = self.clock.now();
        let mut guard = self.sessions.write().await;
        if let Some(entry) = guard.get_mut(session_id) {
            entry.session.touch(now);
        }
    }

    /// Appends a user or assistant turn and returns the transcript after the append.
    pub async fn append(&self, session_id: &str, turn: Turn) -> Result<Vec<Turn>> {
        self.append_checked(session_id, None, turn).await
    }

    /// Like `append`, but only into the session instance that owns `turn_lock`.
    ///
    /// If the id was deleted and recreated since the lock was handed out, the
    /// current session is left alone and `SessionNotFound` is returned.
    pub async fn append_if_current(
        &self,
        session_id: &str,
        turn_lock: &Arc<Mutex<()>>,
        turn: Turn,
    ) -> Result<Vec<Turn>> {
        self.append_checked(session_id, Some(turn_lock), turn).await
    }

    async fn append_checked(
        &self,
        session_id: &str,
        turn_lock: Option<&Arc<Mutex<()>>>,
        turn: Turn,
    ) -> Result<Vec<Turn>> {
        if turn.is_system() {
            return Err(StoreError::InvalidTurn {
                session_id: session_id.to_string(),
                role: turn.role.to_string(),
            });
        }

        let now = self.clock.now();
        let mut guard = self.sessions.write().await;
        match guard.get_mut(session_id) {
            Some(entry) if turn_lock.is_none_or(|lock| Arc::ptr_eq(lock, &entry.turn_lock)) => {
                entry.session.push(turn, now);
                Ok(entry.session.messages.clone())
            }
            _ => Err(StoreError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    /// Removes the session. Deleting an absent id is a no-op.
    ///
    /// Returns whether a session was actually removed.
    pub async fn delete(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id = %session_id, "Deleted session");
        }
        removed
    }

    /// Whether the session has been idle for longer than the TTL.
    ///
    /// An absent session is not expired and is not created by this check.
    pub async fn is_expired(&self, session_id: &str) -> bool {
        let now = self.clock.now();
        let guard = self.sessions.read().await;
        guard
            .get(session_id)
            .map(|e| e.session.is_expired(self.chrono_ttl(), now))
            .unwrap_or(false)
    }

    /// Deletes the session if it is expired, as one atomic step.
    ///
    /// Returns `true` when an expired session was removed.
    pub async fn remove_if_expired(&self, session_id: &str) -> bool {
        let now = self.clock.now();
        let ttl = self.chrono_ttl();
        let mut guard = self.sessions.write().await;

        let expired = guard
            .get(session_id)
            .map(|e| e.session.is_expired(ttl, now))
            .unwrap_or(false);

        if expired {
            guard.remove(session_id);
            info!(session_id = %session_id, "Session expired and was removed");
        }
        expired
    }

    /// Removes every expired session and returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.chrono_ttl();
        let mut guard = self.sessions.write().await;

        let before = guard.len();
        guard.retain(|_, e| !e.session.is_expired(ttl, now));
        before - guard.len()
    }

    /// Lock that serialises turns on one session, creating the session if absent.
    ///
    /// The lock lives with the session entry, so deleting the session drops it.
    pub async fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut guard = self.sessions.write().await;
        let entry = guard
            .entry(session_id.to_string())
            .or_insert_with(|| self.new_entry(session_id));
        Arc::clone(&entry.turn_lock)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
