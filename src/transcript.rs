//! In-memory channel history, oldest message first.
use eyre::Result;

use crate::protocol::ChatMessage;

/// Something that can hand out the recent part of a conversation.
#[async_trait::async_trait]
pub trait ConversationProvider: Send + Sync {
    /// Skip the `skip` newest messages, then return up to `limit` of the ones before them, oldest first.
    async fn recent_messages(&self, limit: usize, skip: usize) -> Result<Vec<ChatMessage>>;
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Edit the newest message in place; returns the previous one.
    pub fn replace_last(&mut self, message: ChatMessage) -> Option<ChatMessage> {
        let last = self.messages.last_mut()?;
        Some(std::mem::replace(last, message))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn window(&self, limit: usize, skip: usize) -> &[ChatMessage] {
        let end = self.messages.len().saturating_sub(skip);
        let start = end.saturating_sub(limit);
        &self.messages[start..end]
    }
}

#[async_trait::async_trait]
impl ConversationProvider for Transcript {
    async fn recent_messages(&self, limit: usize, skip: usize) -> Result<Vec<ChatMessage>> {
        Ok(self.window(limit, skip).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Transcript {
        let mut t = Transcript::new();
        for i in 0..n {
            if i % 2 == 0 {
                t.push(ChatMessage::user(i.to_string()));
            } else {
                t.push(ChatMessage::assistant(i.to_string()));
            }
        }
        t
    }

    fn contents(msgs: &[ChatMessage]) -> Vec<&str> {
        msgs.iter().map(ChatMessage::content).collect()
    }

    #[tokio::test]
    async fn recent_window_is_oldest_first() {
        let t = numbered(8);
        let got = t.recent_messages(3, 0).await.unwrap();
        assert_eq!(contents(&got), ["5", "6", "7"]);
    }

    #[tokio::test]
    async fn skip_drops_the_newest() {
        let t = numbered(8);
        let got = t.recent_messages(3, 1).await.unwrap();
        assert_eq!(contents(&got), ["4", "5", "6"]);
    }

    #[tokio::test]
    async fn window_clamps_at_both_ends() {
        let t = numbered(3);
        assert_eq!(contents(&t.recent_messages(10, 0).await.unwrap()), ["0", "1", "2"]);
        assert!(t.recent_messages(10, 5).await.unwrap().is_empty());
        assert!(t.recent_messages(0, 0).await.unwrap().is_empty());
    }

    #[test]
    fn replace_last_edits_in_place() {
        let mut t = numbered(2);
        let old = t.replace_last(ChatMessage::assistant("edited")).unwrap();
        assert_eq!(old.content(), "1");
        assert_eq!(t.len(), 2);
        assert_eq!(t.last().map(ChatMessage::content), Some("edited"));
        assert!(Transcript::new().replace_last(ChatMessage::user("x")).is_none());
    }
}
