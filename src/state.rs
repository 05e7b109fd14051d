//! Graph state: what nodes read, and how their partial updates are merged.

use serde::{Deserialize, Serialize};

use crate::message::{add_messages, Message};

/// State carried through a graph run.
///
/// Nodes never return a whole state; they return an `Update`, which the
/// runner folds in with `apply`.
pub trait GraphState: Clone + Default + Send + Sync + 'static {
    type Update: Send + 'static;

    fn apply(&mut self, update: Self::Update);
}

/// States that keep a message transcript, which the prebuilt nodes work on.
pub trait HasMessages: GraphState {
    fn messages(&self) -> &[Message];

    /// Wrap new messages in an update for this state.
    fn messages_update(messages: Vec<Message>) -> Self::Update;

    fn last_message(&self) -> Option<&Message> {
        self.messages().last()
    }
}

/// An ordered list of role-tagged messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagesState {
    pub messages: Vec<Message>,
}

impl MessagesState {
    pub fn new(messages: Vec<Message>) -> Self {
        let mut state = Self::default();
        state.apply(messages);
        state
    }
}

impl GraphState for MessagesState {
    type Update = Vec<Message>;

    fn apply(&mut self, update: Self::Update) {
        add_messages(&mut self.messages, update);
    }
}

impl HasMessages for MessagesState {
    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn messages_update(messages: Vec<Message>) -> Self::Update {
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_keeps_turn_order() {
        let mut state = MessagesState::new(vec![Message::user("a")]);
        state.apply(vec![Message::assistant("b")]);
        state.apply(vec![Message::user("c")]);

        let contents: Vec<&str> = state.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert_eq!(state.last_message().map(|m| m.content.as_str()), Some("c"));
    }
}
