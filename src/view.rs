//! View binding: a derived, stateless snapshot of the active session.
//!
//! Built fresh for every render from the registry, store, and controller.
//! Switching sessions only changes which log the next snapshot borrows; it
//! never remounts or disturbs in-flight stream state.

use crate::chat::ChatController;
use crate::conversation::{ConversationStore, Message};
use crate::session::{Session, SessionRegistry};

/// Borrow-only snapshot of what the UI should show right now.
#[derive(Debug)]
pub struct ConversationView<'a> {
    pub session: &'a Session,
    pub messages: &'a [Message],
    pub streaming: bool,
    pub error: Option<&'a str>,
}

impl<'a> ConversationView<'a> {
    /// Snapshot the currently active session.
    pub fn active(
        registry: &'a SessionRegistry,
        store: &'a ConversationStore,
        controller: &'a ChatController,
    ) -> Self {
        let session = registry.active();
        Self {
            session,
            messages: store.read(session.id()),
            streaming: controller.is_streaming(session.id()),
            error: controller.last_error(),
        }
    }
}

/// Case-insensitive substring filter over a displayed log. Pure presentation:
/// no effect on the underlying store. An empty query matches everything.
pub fn filter_messages<'a>(messages: &'a [Message], query: &str) -> Vec<&'a Message> {
    let query = query.trim().to_lowercase();
    messages
        .iter()
        .filter(|m| query.is_empty() || m.content().to_lowercase().contains(&query))
        .collect()
}
