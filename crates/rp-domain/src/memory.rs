//! Chat buffer and retrieved-memory types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of messages kept in [`ChatBuffer`] at any time.
pub const CHAT_BUFFER_MAX: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Ordered, append-only-within-a-turn buffer, truncated to the tail
/// window before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatBuffer {
    messages: Vec<ChatMessage>,
}

impl ChatBuffer {
    pub fn from_tail(messages: Vec<ChatMessage>) -> Self {
        let mut buf = Self { messages };
        buf.truncate_to_tail();
        buf
    }

    /// Append within a turn. Truncation only happens at `truncate_to_tail`,
    /// which the `Persist` stage calls before writing — mutation during the
    /// turn is unconditionally append-only.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn truncate_to_tail(&mut self) {
        if self.messages.len() > CHAT_BUFFER_MAX {
            let excess = self.messages.len() - CHAT_BUFFER_MAX;
            self.messages.drain(0..excess);
        }
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A retrieved long-term memory snippet, populated by `MemoryRetrieve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub content: String,
    pub importance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> ChatMessage {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn truncate_keeps_only_tail_window() {
        let mut buf = ChatBuffer::default();
        for i in 0..(CHAT_BUFFER_MAX + 10) {
            buf.push(msg(&i.to_string()));
        }
        buf.truncate_to_tail();
        assert_eq!(buf.len(), CHAT_BUFFER_MAX);
        assert_eq!(buf.as_slice()[0].content, "10");
    }

    #[test]
    fn push_is_append_only_until_truncated() {
        let mut buf = ChatBuffer::default();
        buf.push(msg("a"));
        buf.push(msg("b"));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.as_slice()[0].content, "a");
    }
}
