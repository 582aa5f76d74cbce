//! Per-chat transient routing state.
//!
//! Nothing here is persisted: a restart drops every in-flight form back to
//! plain navigation. Both the navigation engine and the feedback flow read
//! and write this store, so it lives behind a concurrent map instead of
//! ambient global state.

use dashmap::DashMap;
use teloxide::types::ChatId;

/// Transient state of one chat.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserState {
    /// Node to resume navigation at once an input flow finishes
    pub return_to_node: Option<i64>,
    /// Gate routing inbound plain messages into the feedback flow
    pub entering_feedback: bool,
}

/// Process-wide session table, keyed by chat id.
#[derive(Debug, Default)]
pub struct SessionStore {
    states: DashMap<i64, UserState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the chat's state with a fresh default. Arriving at a node
    /// via any path abandons unsent feedback — that is this call.
    pub fn reset(&self, chat_id: ChatId) {
        self.states.insert(chat_id.0, UserState::default());
    }

    pub fn set_return_node(&self, chat_id: ChatId, node_id: i64) {
        self.states.entry(chat_id.0).or_default().return_to_node = Some(node_id);
    }

    pub fn return_node(&self, chat_id: ChatId) -> Option<i64> {
        self.states.get(&chat_id.0).and_then(|state| state.return_to_node)
    }

    pub fn set_entering_feedback(&self, chat_id: ChatId, entering: bool) {
        self.states.entry(chat_id.0).or_default().entering_feedback = entering;
    }

    pub fn is_entering_feedback(&self, chat_id: ChatId) -> bool {
        self.states
            .get(&chat_id.0)
            .map(|state| state.entering_feedback)
            .unwrap_or(false)
    }
}
