//! Session registry.
//!
//! A session is one logical conversation thread (a UI tab). The registry
//! exclusively owns the session set: creation, activation, deletion, and
//! accent color assignment. It knows nothing about messages; releasing a
//! deleted session's log is the caller's contract with the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Display accent assigned to a session, drawn from a fixed palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccentColor {
    pub name: &'static str,
    pub hex: &'static str,
}

/// Fixed accent palette, cycled in creation order.
pub const PALETTE: [AccentColor; 6] = [
    AccentColor { name: "sky", hex: "#38bdf8" },
    AccentColor { name: "violet", hex: "#a78bfa" },
    AccentColor { name: "emerald", hex: "#34d399" },
    AccentColor { name: "amber", hex: "#fbbf24" },
    AccentColor { name: "rose", hex: "#fb7185" },
    AccentColor { name: "teal", hex: "#2dd4bf" },
];

/// A single chat session
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    color: AccentColor,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(color: AccentColor) -> Self {
        Self {
            id: SessionId::new(),
            color,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn color(&self) -> AccentColor {
        self.color
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Owns the set of sessions and tracks which one is active.
///
/// Invariant: at least one session exists at all times. Deleting the last
/// session synchronously creates a replacement, so an empty registry is never
/// observable.
#[derive(Debug)]
pub struct SessionRegistry {
    /// Sessions in creation order
    sessions: Vec<Session>,
    /// Index of the active session
    active_index: usize,
    /// Monotonic cursor into the accent palette
    palette_cursor: usize,
}

impl SessionRegistry {
    /// Create a registry with one initial session, which is active.
    pub fn new() -> Self {
        let mut registry = Self {
            sessions: Vec::new(),
            active_index: 0,
            palette_cursor: 0,
        };
        registry.create();
        registry
    }

    /// Create a new session and make it active. Returns its id.
    pub fn create(&mut self) -> SessionId {
        let color = self.next_color();
        let session = Session::new(color);
        let id = session.id;
        self.sessions.push(session);
        self.active_index = self.sessions.len() - 1;
        tracing::debug!(%id, color = color.name, "session created");
        id
    }

    /// Next palette color in creation order, skipping an immediate repeat of
    /// the most recently created session's color.
    fn next_color(&mut self) -> AccentColor {
        let mut color = PALETTE[self.palette_cursor % PALETTE.len()];
        self.palette_cursor += 1;
        if let Some(last) = self.sessions.last() {
            if last.color == color {
                color = PALETTE[self.palette_cursor % PALETTE.len()];
                self.palette_cursor += 1;
            }
        }
        color
    }

    /// Delete a session by id. Unknown ids are a no-op.
    ///
    /// Returns `true` if a session was removed; the caller is responsible for
    /// releasing that session's conversation log. If the deleted session was
    /// the last one, a fresh replacement is created and activated before this
    /// method returns. If the active session was deleted, activation falls
    /// back to the session immediately preceding it in creation order, or the
    /// first session if none precedes it.
    pub fn delete(&mut self, id: SessionId) -> bool {
        let Some(idx) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };

        let was_active = idx == self.active_index;
        self.sessions.remove(idx);
        tracing::debug!(%id, "session deleted");

        if self.sessions.is_empty() {
            // Never observable as empty: replace synchronously.
            self.create();
            return true;
        }

        if was_active {
            self.active_index = idx.saturating_sub(1);
        } else if self.active_index > idx {
            self.active_index -= 1;
        }

        true
    }

    /// Activate a session by id. Unknown or already-active ids are a no-op.
    pub fn switch(&mut self, id: SessionId) {
        if let Some(idx) = self.sessions.iter().position(|s| s.id == id) {
            if idx != self.active_index {
                self.active_index = idx;
                tracing::debug!(%id, "session activated");
            }
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active(&self) -> &Session {
        &self.sessions[self.active_index]
    }

    pub fn active_id(&self) -> SessionId {
        self.active().id
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_registry_has_one_active_session() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_id(), registry.sessions()[0].id());
    }

    #[test]
    fn create_makes_new_session_active() {
        let mut registry = SessionRegistry::new();
        let id = registry.create();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_id(), id);
    }

    #[test]
    fn never_reaches_zero_sessions() {
        let mut registry = SessionRegistry::new();
        let only = registry.active_id();
        assert!(registry.delete(only));
        // Replacement created synchronously, and it is a different session.
        assert_eq!(registry.len(), 1);
        assert_ne!(registry.active_id(), only);
    }

    #[test]
    fn repeated_delete_of_sole_session_always_replaces() {
        let mut registry = SessionRegistry::new();
        for _ in 0..10 {
            let only = registry.active_id();
            registry.delete(only);
            assert_eq!(registry.len(), 1);
        }
    }

    #[test]
    fn delete_unknown_id_is_noop() {
        let mut registry = SessionRegistry::new();
        let before: Vec<_> = registry.sessions().iter().map(|s| s.id()).collect();
        assert!(!registry.delete(SessionId::new()));
        let after: Vec<_> = registry.sessions().iter().map(|s| s.id()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn deleting_active_falls_back_to_preceding_session() {
        let mut registry = SessionRegistry::new();
        let first = registry.active_id();
        let second = registry.create();
        let third = registry.create();

        assert_eq!(registry.active_id(), third);
        registry.delete(third);
        assert_eq!(registry.active_id(), second);
        registry.delete(second);
        assert_eq!(registry.active_id(), first);
    }

    #[test]
    fn deleting_first_while_active_falls_back_to_new_first() {
        let mut registry = SessionRegistry::new();
        let first = registry.active_id();
        let second = registry.create();
        registry.switch(first);

        registry.delete(first);
        assert_eq!(registry.active_id(), second);
    }

    #[test]
    fn deleting_background_session_keeps_active() {
        let mut registry = SessionRegistry::new();
        let first = registry.active_id();
        let second = registry.create();
        let third = registry.create();
        registry.switch(third);

        registry.delete(first);
        assert_eq!(registry.active_id(), third);
        registry.delete(second);
        assert_eq!(registry.active_id(), third);
    }

    #[test]
    fn switch_to_unknown_or_active_is_noop() {
        let mut registry = SessionRegistry::new();
        let active = registry.active_id();
        registry.switch(SessionId::new());
        assert_eq!(registry.active_id(), active);
        registry.switch(active);
        assert_eq!(registry.active_id(), active);
    }

    #[test]
    fn adjacent_sessions_never_share_a_color() {
        let mut registry = SessionRegistry::new();
        for _ in 0..20 {
            registry.create();
        }
        let sessions = registry.sessions();
        for pair in sessions.windows(2) {
            assert_ne!(pair[0].color(), pair[1].color());
        }
    }

    #[test]
    fn colors_are_deterministic_from_creation_order() {
        let mut a = SessionRegistry::new();
        let mut b = SessionRegistry::new();
        for _ in 0..8 {
            a.create();
            b.create();
        }
        let colors_a: Vec<_> = a.sessions().iter().map(|s| s.color()).collect();
        let colors_b: Vec<_> = b.sessions().iter().map(|s| s.color()).collect();
        assert_eq!(colors_a, colors_b);
    }
}
