//! Conversations
//!
//! The client-side record of a tutor conversation and its durable wire form.
//! A conversation owns its turns in creation order; the thread id stays the
//! same until [`Conversation::reset`].

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::messages::{ThreadId, Turn};
use crate::translator::validate_content;

/// Durable form of a conversation
///
/// Serialized as `{"hasStarted": bool, "messages": [Turn], "threadId": string}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Whether the first user turn has been sent
    pub has_started: bool,
    /// Turns, oldest first
    pub messages: Vec<Turn>,
    /// Thread the turns belong to
    pub thread_id: ThreadId,
}

impl PersistedState {
    /// Parse stored JSON
    pub fn from_json(raw: &str) -> RelayResult<Self> {
        serde_json::from_str(raw).map_err(|e| RelayError::MalformedPersistedState(e.to_string()))
    }

    /// Serialize for storage
    pub fn to_json(&self) -> RelayResult<String> {
        serde_json::to_string(self).map_err(|e| RelayError::MalformedPersistedState(e.to_string()))
    }
}

/// An ordered tutor conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    thread_id: ThreadId,
    has_started: bool,
    turns: Vec<Turn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Empty conversation on a fresh thread
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread_id: ThreadId::new(),
            has_started: false,
            turns: Vec::new(),
        }
    }

    /// Resume from stored state
    #[must_use]
    pub fn from_persisted(state: PersistedState) -> Self {
        Self {
            thread_id: state.thread_id,
            has_started: state.has_started,
            turns: state.messages,
        }
    }

    /// Snapshot for storage
    #[must_use]
    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            has_started: self.has_started,
            messages: self.turns.clone(),
            thread_id: self.thread_id.clone(),
        }
    }

    /// Thread id
    #[must_use]
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// Whether a user turn was ever added
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.has_started
    }

    /// Turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn
    #[must_use]
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Append a user turn; the text is trimmed and must not be empty
    pub fn add_user_turn(&mut self, content: &str) -> RelayResult<&Turn> {
        let content = content.trim();
        validate_content("message", content)?;
        self.has_started = true;
        self.turns.push(Turn::user(content));
        Ok(self.last_turn_unchecked())
    }

    /// Append the finished assistant response
    pub fn commit_assistant_turn(&mut self, content: impl Into<String>) -> &Turn {
        self.turns.push(Turn::assistant(content));
        self.last_turn_unchecked()
    }

    /// Start over on a new thread
    pub fn reset(&mut self) {
        let previous = std::mem::take(&mut self.thread_id);
        *self = Self::new();
        // `ThreadId::new` is random, but a reset must never reuse the old id
        while self.thread_id == previous {
            self.thread_id = ThreadId::new();
        }
    }

    fn last_turn_unchecked(&self) -> &Turn {
        // Only called right after a push
        &self.turns[self.turns.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::messages::{Role, TurnId};

    #[test]
    fn test_turns_keep_creation_order() {
        let mut conversation = Conversation::new();
        assert!(!conversation.has_started());

        conversation.add_user_turn("  What is a prime?  ").unwrap();
        conversation.commit_assistant_turn("A number with two divisors.");

        assert!(conversation.has_started());
        let roles: Vec<Role> = conversation.turns().iter().map(Turn::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(conversation.turns()[0].content(), "What is a prime?");
    }

    #[test]
    fn test_whitespace_user_turn_rejected() {
        let mut conversation = Conversation::new();
        assert!(matches!(
            conversation.add_user_turn(" \n "),
            Err(RelayError::Validation(_))
        ));
        assert!(conversation.is_empty());
        assert!(!conversation.has_started());
    }

    #[test]
    fn test_reset_generates_distinct_thread() {
        let mut conversation = Conversation::new();
        conversation.add_user_turn("hi").unwrap();
        let before = conversation.thread_id().clone();

        conversation.reset();

        assert!(conversation.is_empty());
        assert!(!conversation.has_started());
        assert_ne!(conversation.thread_id(), &before);
    }

    #[test]
    fn test_persisted_wire_shape() {
        let state = PersistedState {
            has_started: true,
            messages: vec![Turn::with_id(TurnId::from("m1"), Role::User, "hi")],
            thread_id: ThreadId::from("t1"),
        };
        let json: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "hasStarted": true,
                "messages": [{"id": "m1", "role": "user", "content": "hi"}],
                "threadId": "t1"
            })
        );
    }

    #[test]
    fn test_round_trip_through_persisted() {
        let mut conversation = Conversation::new();
        conversation.add_user_turn("q").unwrap();
        conversation.commit_assistant_turn("a");

        let restored = Conversation::from_persisted(conversation.to_persisted());
        assert_eq!(restored, conversation);
    }

    #[test]
    fn test_malformed_state_is_reported() {
        for raw in ["", "{", "[]", r#"{"hasStarted": "yes"}"#] {
            assert!(matches!(
                PersistedState::from_json(raw),
                Err(RelayError::MalformedPersistedState(_))
            ));
        }
    }
}
