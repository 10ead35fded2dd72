//! Per-session conversation logs.
//!
//! The store is the single mutation path for messages. Logs are keyed by
//! session id and fully isolated from each other: an in-flight stream writing
//! to one session's log can never disturb another's. Within a log, insertion
//! order is preserved and messages are append-only except for `clear`.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionId;

/// Unique identifier for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
///
/// Assistant content grows by appending decoded chunks while `pending` is
/// set, then becomes immutable once the stream ends.
#[derive(Debug, Clone)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    pending: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: text.into(),
            timestamp: Utc::now(),
            pending: false,
        }
    }

    /// Empty assistant message that a stream will fill in.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            pending: true,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Session-keyed message logs.
#[derive(Debug, Default)]
pub struct ConversationStore {
    logs: HashMap<SessionId, Vec<Message>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail of a session's log, creating the log if
    /// this is the session's first message. Returns the message id.
    pub fn append(&mut self, session_id: SessionId, message: Message) -> MessageId {
        let id = message.id;
        self.logs.entry(session_id).or_default().push(message);
        id
    }

    /// Apply `f` to the message with the given id in a session's log.
    /// A missing session or message is a no-op.
    pub fn update<F>(&mut self, session_id: SessionId, message_id: MessageId, f: F)
    where
        F: FnOnce(&mut Message),
    {
        if let Some(message) = self
            .logs
            .get_mut(&session_id)
            .and_then(|log| log.iter_mut().find(|m| m.id == message_id))
        {
            f(message);
        }
    }

    /// Concatenate a decoded chunk onto a streaming assistant message.
    pub fn append_text(&mut self, session_id: SessionId, message_id: MessageId, text: &str) {
        self.update(session_id, message_id, |m| m.content.push_str(text));
    }

    /// Mark a streaming message as finished; its content is immutable from
    /// here on.
    pub fn finalize(&mut self, session_id: SessionId, message_id: MessageId) {
        self.update(session_id, message_id, |m| m.pending = false);
    }

    /// Truncate one session's log to empty. Other sessions are unaffected.
    pub fn clear(&mut self, session_id: SessionId) {
        if let Some(log) = self.logs.get_mut(&session_id) {
            log.clear();
        }
    }

    /// Drop a session's log entirely (the session was deleted).
    pub fn release(&mut self, session_id: SessionId) {
        self.logs.remove(&session_id);
    }

    /// Ordered log for a session; empty if the session has no messages.
    pub fn read(&self, session_id: SessionId) -> &[Message] {
        self.logs
            .get(&session_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn contents(store: &ConversationStore, session: SessionId) -> Vec<String> {
        store
            .read(session)
            .iter()
            .map(|m| m.content().to_string())
            .collect()
    }

    #[test]
    fn append_preserves_insertion_order() {
        let mut store = ConversationStore::new();
        let session = SessionId::new();

        store.append(session, Message::user("one"));
        store.append(session, Message::user("two"));
        store.append(session, Message::user("three"));

        assert_eq!(contents(&store, session), vec!["one", "two", "three"]);
    }

    #[test]
    fn read_unknown_session_is_empty() {
        let store = ConversationStore::new();
        assert!(store.read(SessionId::new()).is_empty());
    }

    #[test]
    fn append_text_targets_message_by_id() {
        let mut store = ConversationStore::new();
        let session = SessionId::new();

        store.append(session, Message::user("question"));
        let placeholder = store.append(session, Message::assistant_placeholder());

        store.append_text(session, placeholder, "Hi");
        store.append_text(session, placeholder, " there");

        assert_eq!(contents(&store, session), vec!["question", "Hi there"]);
        assert!(store.read(session)[1].is_pending());

        store.finalize(session, placeholder);
        assert!(!store.read(session)[1].is_pending());
    }

    #[test]
    fn update_missing_message_is_noop() {
        let mut store = ConversationStore::new();
        let session = SessionId::new();
        store.append(session, Message::user("kept"));

        store.append_text(session, MessageId::new(), "ignored");
        store.append_text(SessionId::new(), MessageId::new(), "ignored");

        assert_eq!(contents(&store, session), vec!["kept"]);
    }

    #[test]
    fn clear_truncates_only_that_session() {
        let mut store = ConversationStore::new();
        let a = SessionId::new();
        let b = SessionId::new();

        store.append(a, Message::user("a1"));
        store.append(b, Message::user("b1"));
        store.append(b, Message::user("b2"));

        store.clear(b);

        assert_eq!(contents(&store, a), vec!["a1"]);
        assert!(store.read(b).is_empty());
    }

    #[test]
    fn release_drops_the_log() {
        let mut store = ConversationStore::new();
        let session = SessionId::new();
        store.append(session, Message::user("gone"));

        store.release(session);
        assert!(store.read(session).is_empty());
    }

    #[test]
    fn mutating_one_session_never_touches_another() {
        let mut store = ConversationStore::new();
        let a = SessionId::new();
        let b = SessionId::new();

        let placeholder_a = store.append(a, Message::assistant_placeholder());
        let placeholder_b = store.append(b, Message::assistant_placeholder());

        store.append_text(a, placeholder_a, "for a");
        store.append_text(b, placeholder_b, "for b");

        assert_eq!(contents(&store, a), vec!["for a"]);
        assert_eq!(contents(&store, b), vec!["for b"]);
    }
}
