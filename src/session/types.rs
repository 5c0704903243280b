use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a turn in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Behavioural preamble, always the first turn
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One message of the conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub messages: Vec<Turn>,
}

impl Session {
    /// Creates a session whose transcript holds only the preamble.
    pub fn new(session_id: impl Into<String>, preamble: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: now,
            last_active: now,
            messages: vec![Turn::system(preamble)],
        }
    }

    /// Refreshes `last_active`. An earlier reading never moves it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_active {
            self.last_active = now;
        }
    }

    /// Appends a turn and refreshes activity. Callers must not pass a system turn.
    pub fn push(&mut self, turn: Turn, now: DateTime<Utc>) {
        self.messages.push(turn);
        self.touch(now);
    }

    /// True iff strictly more than `ttl` has elapsed since `last_active`.
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_active) > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const PREAMBLE: &str = "You are a tutor.";

    #[test]
    fn test_session_creation() {
        let now = Utc::now();
        let session = Session::new("abc", PREAMBLE, now);

        assert_eq!(session.session_id, "abc");
        assert_eq!(session.messages.len(), 1);
        assert!(session.messages[0].is_system());
        assert_eq!(session.messages[0].content, PREAMBLE);
        assert_eq!(session.created_at, now);
        assert_eq!(session.last_active, now);
    }

    #[test]
    fn test_push_preserves_order() {
        let now = Utc::now();
        let mut session = Session::new("abc", PREAMBLE, now);

        session.push(Turn::user("first"), now);
        session.push(Turn::assistant("second"), now);

        let contents: Vec<&str> = session.messages.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec![PREAMBLE, "first", "second"]);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let now = Utc::now();
        let mut session = Session::new("abc", PREAMBLE, now);

        session.touch(now - Duration::seconds(10));
        assert_eq!(session.last_active, now);

        session.touch(now + Duration::seconds(10));
        assert_eq!(session.last_active, now + Duration::seconds(10));
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = Utc::now();
        let ttl = Duration::hours(12);
        let session = Session::new("abc", PREAMBLE, now);

        assert!(!session.is_expired(ttl, now + ttl - Duration::seconds(1)));
        // exactly TTL is still alive (> not >=)
        assert!(!session.is_expired(ttl, now + ttl));
        assert!(session.is_expired(ttl, now + ttl + Duration::seconds(1)));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Turn::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let turn: Turn = serde_json::from_str(r#"{"role":"system","content":"x"}"#).unwrap();
        assert_eq!(turn.role, Role::System);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::System.as_str(), "system");
    }
}
