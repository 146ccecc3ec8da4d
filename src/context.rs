//! Conversation context: the single "current topic" slot carried between turns.

use serde::{Deserialize, Serialize};

/// The topic a conversation is currently in, if any.
///
/// Owned by the caller (one per end user or session). The engine only reads
/// it and conditionally overwrites or clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    topic: Option<String>,
}

impl ConversationContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context already set to `topic`.
    pub fn with_topic(topic: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.set(topic);
        ctx
    }

    /// Current topic.
    pub fn get(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Replace the topic. An empty or blank value clears it.
    pub fn set(&mut self, topic: impl Into<String>) {
        let topic = topic.into();
        if topic.trim().is_empty() {
            self.topic = None;
        } else {
            self.topic = Some(topic);
        }
    }

    /// Remove the topic.
    pub fn clear(&mut self) {
        self.topic = None;
    }

    pub fn is_empty(&self) -> bool {
        self.topic.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let ctx = ConversationContext::new();
        assert_eq!(ctx.get(), None);
        assert!(ctx.is_empty());
    }

    #[test]
    fn set_and_clear() {
        let mut ctx = ConversationContext::new();
        ctx.set("greeted");
        assert_eq!(ctx.get(), Some("greeted"));
        ctx.clear();
        assert_eq!(ctx.get(), None);
    }

    #[test]
    fn blank_topic_clears() {
        let mut ctx = ConversationContext::with_topic("weather");
        ctx.set("   ");
        assert!(ctx.is_empty());
    }
}
