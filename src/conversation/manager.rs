use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::conversation::error::ChatError;
use crate::gateway::{CompletionGateway, DecodingParams, Usage};
use crate::session::{SessionStore, StoreError, Turn};

/// Model and sampling settings used for every upstream request
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub model: String,
    pub params: DecodingParams,
}

impl ConversationSettings {
    pub fn new(model: impl Into<String>, params: DecodingParams) -> Self {
        Self {
            model: model.into(),
            params,
        }
    }
}

/// Successful outcome of one turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub usage: Usage,
}

/// Runs the turn protocol on top of the session store.
///
/// One manager is shared by every entry point of the process; nothing else
/// mutates sessions on its own.
pub struct ConversationManager {
    store: SessionStore,
    gateway: Arc<dyn CompletionGateway>,
    settings: ConversationSettings,
}

impl ConversationManager {
    pub fn new(
        store: SessionStore,
        gateway: Arc<dyn CompletionGateway>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.gateway_name()
    }

    /// Handles one user turn.
    ///
    /// 1. An empty id is rejected before the store is touched.
    /// 2. An expired session is deleted and `SessionExpired` returned.
    /// 3. The session is fetched or created, touched, and the user turn appended.
    ///    Both appends are bound to that session instance, not just the id.
    /// 4. The full transcript goes to the gateway in one round trip.
    /// 5. The reply is appended as an assistant turn and returned.
    ///
    /// Turns on the same session id run one at a time; other sessions proceed
    /// independently. When the gateway fails, the user turn appended in step 3
    /// is kept and a later turn is appended after it. If the session is deleted
    /// while the gateway call is in flight, the reply is still returned but not
    /// recorded, including into a new session created under the same id.
    pub async fn handle_turn(&self, session_id: &str, user_text: &str) -> Result<TurnReply, ChatError> {
        if session_id.is_empty() {
            return Err(ChatError::invalid_input("Session ID is required"));
        }

        if self.store.remove_if_expired(session_id).await {
            return Err(ChatError::session_expired(session_id));
        }

        // Every write below goes to the session instance that owns this lock.
        // A delete while waiting or appending hands out a fresh lock, so retry.
        let (turn_lock, _turn, transcript) = loop {
            let turn_lock = self.store.turn_lock(session_id).await;
            let turn = Arc::clone(&turn_lock).lock_owned().await;

            self.store.touch(session_id).await;
            match self
                .store
                .append_if_current(session_id, &turn_lock, Turn::user(user_text))
                .await
            {
                Ok(transcript) => break (turn_lock, turn, transcript),
                Err(StoreError::SessionNotFound { .. }) => {
                    debug!(session_id = %session_id, "Session replaced before user turn, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        debug!(
            session_id = %session_id,
            message_count = transcript.len(),
            "User turn appended"
        );

        let started = Instant::now();
        let completion = match self
            .gateway
            .send(&self.settings.model, &transcript, &self.settings.params)
            .await
        {
            Ok(completion) => completion,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    gateway = self.gateway.gateway_name(),
                    error = %e,
                    "Gateway call failed, user turn retained"
                );
                return Err(e.into());
            }
        };

        match self
            .store
            .append_if_current(session_id, &turn_lock, Turn::assistant(completion.reply.clone()))
            .await
        {
            Ok(transcript) => {
                info!(
                    session_id = %session_id,
                    message_count = transcript.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Turn completed"
                );
            }
            Err(StoreError::SessionNotFound { .. }) => {
                warn!(
                    session_id = %session_id,
                    "Session deleted during gateway call, reply not recorded"
                );
            }
            Err(e) => return Err(e.into()),
        }

        Ok(TurnReply {
            reply: completion.reply,
            usage: completion.usage,
        })
    }

    /// Deletes the session. Always succeeds, even for unknown ids.
    pub async fn delete_session(&self, session_id: &str) {
        let removed = self.store.delete(session_id).await;
        info!(session_id = %session_id, removed = removed, "Delete session requested");
    }

    /// Snapshot of the session transcript, if the session exists
    pub async fn transcript(&self, session_id: &str) -> Option<Vec<Turn>> {
        self.store.get(session_id).await.map(|s| s.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MockGateway};
    use crate::session::{ManualClock, Role, SessionSettings};
    use std::time::Duration;

    const PREAMBLE: &str = "Guide the student, never give the answer.";

    struct Fixture {
        manager: ConversationManager,
        gateway: MockGateway,
        clock: ManualClock,
    }

    fn fixture(ttl_secs: u64) -> Fixture {
        let clock = ManualClock::default();
        let store = SessionStore::new(
            SessionSettings::new(Duration::from_secs(ttl_secs), PREAMBLE),
            Arc::new(clock.clone()),
        );
        let gateway = MockGateway::new();
        let manager = ConversationManager::new(
            store,
            Arc::new(gateway.clone()),
            ConversationSettings::new("test-model", DecodingParams::default()),
        );
        Fixture {
            manager,
            gateway,
            clock,
        }
    }

    #[tokio::test]
    async fn test_empty_session_id_rejected_without_mutation() {
        let f = fixture(60);

        let err = f.manager.handle_turn("", "hello").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput { .. }));

        assert_eq!(f.manager.store().session_count().await, 0);
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_turn_records_both_sides() {
        let f = fixture(60);
        f.gateway.set_reply("Let's break it down…");

        let reply = f.manager.handle_turn("s1", "2+2?").await.unwrap();

        assert_eq!(reply.reply, "Let's break it down…");
        let transcript = f.manager.transcript("s1").await.unwrap();
        assert_eq!(
            transcript,
            vec![
                Turn::system(PREAMBLE),
                Turn::user("2+2?"),
                Turn::assistant("Let's break it down…"),
            ]
        );
    }

    #[tokio::test]
    async fn test_gateway_receives_full_history() {
        let f = fixture(60);
        f.manager.handle_turn("s1", "first").await.unwrap();
        f.manager.handle_turn("s1", "second").await.unwrap();

        let sent = f.gateway.last_messages().unwrap();
        let roles: Vec<Role> = sent.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(sent[3].content, "second");
        assert_eq!(f.gateway.last_model().as_deref(), Some("test-model"));
    }

    #[tokio::test]
    async fn test_usage_is_passed_through() {
        let f = fixture(60);
        f.gateway.set_reply_with_usage("ok", Usage::with_tokens(7, 3));

        let reply = f.manager.handle_turn("s1", "hi").await.unwrap();

        assert_eq!(reply.usage.total_tokens, Some(10));
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_user_turn() {
        let f = fixture(60);
        f.gateway.set_error(GatewayError::status(500, "Internal Server Error"));

        let err = f.manager.handle_turn("s1", "2+2?").await.unwrap_err();

        assert_eq!(err, ChatError::gateway_failure("Internal Server Error"));
        let transcript = f.manager.transcript("s1").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1], Turn::user("2+2?"));
    }

    #[tokio::test]
    async fn test_retry_after_failure_appends_after_dangling_turn() {
        let f = fixture(60);
        f.gateway.set_error(GatewayError::network("reset"));
        let _ = f.manager.handle_turn("s1", "attempt one").await;

        f.gateway.clear_error();
        f.gateway.set_reply("answer");
        f.manager.handle_turn("s1", "attempt two").await.unwrap();

        let transcript = f.manager.transcript("s1").await.unwrap();
        let contents: Vec<&str> = transcript.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec![PREAMBLE, "attempt one", "attempt two", "answer"]);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_internal() {
        let f = fixture(60);
        f.gateway.set_error(GatewayError::malformed("No response choices returned"));

        let err = f.manager.handle_turn("s1", "hi").await.unwrap_err();

        assert!(matches!(err, ChatError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let f = fixture(60);
        f.manager.handle_turn("s1", "hello").await.unwrap();

        f.clock.advance(chrono::Duration::seconds(61));
        let err = f.manager.handle_turn("s1", "still there?").await.unwrap_err();

        assert_eq!(err, ChatError::session_expired("s1"));
        assert!(!f.manager.store().exists("s1").await);
        assert_eq!(f.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_activity_keeps_session_alive() {
        let f = fixture(60);
        for _ in 0..5 {
            f.manager.handle_turn("s1", "tick").await.unwrap();
            f.clock.advance(chrono::Duration::seconds(59));
        }

        assert!(f.manager.handle_turn("s1", "tock").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_session_is_idempotent() {
        let f = fixture(60);
        f.manager.handle_turn("s1", "hello").await.unwrap();

        f.manager.delete_session("s1").await;
        f.manager.delete_session("s1").await;
        f.manager.delete_session("never-existed").await;

        assert!(f.manager.transcript("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_during_gateway_call_returns_reply() {
        let f = fixture(60);
        f.gateway.set_reply("late answer");
        f.gateway.set_delay(Duration::from_millis(100));
        let manager = Arc::new(f.manager);

        let turn = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.handle_turn("s1", "question").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.delete_session("s1").await;

        let reply = turn.await.unwrap().unwrap();
        assert_eq!(reply.reply, "late answer");
        assert!(manager.transcript("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_turns_same_session_alternate() {
        let f = fixture(60);
        f.gateway.set_delay(Duration::from_millis(5));
        let manager = Arc::new(f.manager);

        let mut handles = Vec::new();
        for i in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.handle_turn("shared", &format!("q{}", i)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let transcript = manager.transcript("shared").await.unwrap();
        assert_eq!(transcript.len(), 1 + 8 * 2);
        assert_eq!(transcript.iter().filter(|t| t.is_system()).count(), 1);
        for pair in transcript[1..].chunks(2) {
            assert!(pair[0].is_user());
            assert!(pair[1].is_assistant());
        }
    }
    #[tokio::test]
    async fn test_whitespace_session_id_is_a_valid_id() {
        let f = fixture(60);

        assert!(f.manager.handle_turn(" ", "hello").await.is_ok());
        assert!(f.manager.store().exists(" ").await);
    }

    #[tokio::test]
    async fn test_late_reply_not_written_into_recreated_session() {
        let f = fixture(60);
        f.gateway.set_reply("reply");
        f.gateway.set_delay(Duration::from_millis(200));
        let manager = Arc::new(f.manager);

        let stale = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.handle_turn("s", "old question").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager.delete_session("s").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fresh = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.handle_turn("s", "new question").await })
        };

        assert_eq!(stale.await.unwrap().unwrap().reply, "reply");
        assert!(fresh.await.unwrap().is_ok());

        let transcript = manager.transcript("s").await.unwrap();
        assert_eq!(
            transcript,
            vec![
                Turn::system(PREAMBLE),
                Turn::user("new question"),
                Turn::assistant("reply"),
            ]
        );
    }

    #[tokio::test]
    async fn test_turn_waiting_on_deleted_session_joins_new_one_in_order() {
        let f = fixture(60);
        f.gateway.set_delay(Duration::from_millis(100));
        let manager = Arc::new(f.manager);

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.handle_turn("s", "one").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Queues behind `first` on the original session's lock
        let waiting = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.handle_turn("s", "two").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.delete_session("s").await;
        let third = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.handle_turn("s", "three").await })
        };

        for handle in [first, waiting, third] {
            assert!(handle.await.unwrap().is_ok());
        }

        let transcript = manager.transcript("s").await.unwrap();
        assert_eq!(transcript.len(), 1 + 2 * 2);
        assert!(transcript[0].is_system());
        for pair in transcript[1..].chunks(2) {
            assert!(pair[0].is_user());
            assert!(pair[1].is_assistant());
        }
    }
}
