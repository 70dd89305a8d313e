//! Chat message types as the transport hands them over.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use coursedesk_core::{Input, Reply};

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ChatContent {
    /// Typed text, including `/commands`.
    Text(String),
    /// A pressed button; carries the action token it was rendered with.
    Callback(String),
}

/// A message received from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender identity, matched against `access.admin_ids`.
    pub sender: String,

    /// Chat the message arrived in. Sessions are keyed by it.
    pub chat_id: String,

    pub content: ChatContent,

    pub timestamp: SystemTime,
}

impl ChatMessage {
    pub fn text(sender: &str, chat_id: &str, body: &str) -> Self {
        Self::new(sender, chat_id, ChatContent::Text(body.to_string()))
    }

    pub fn callback(sender: &str, chat_id: &str, token: &str) -> Self {
        Self::new(sender, chat_id, ChatContent::Callback(token.to_string()))
    }

    fn new(sender: &str, chat_id: &str, content: ChatContent) -> Self {
        Self {
            sender: sender.to_string(),
            chat_id: chat_id.to_string(),
            content,
            timestamp: SystemTime::now(),
        }
    }

    /// The dispatcher input this message stands for.
    pub fn to_input(&self) -> Input {
        match &self.content {
            ChatContent::Text(text) => Input::Command(text.clone()),
            ChatContent::Callback(token) => Input::Token(token.clone()),
        }
    }
}

/// A reply on its way back to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: String,

    /// Bus id of the inbound message this answers.
    pub in_reply_to: Option<u64>,

    pub reply: Reply,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_becomes_command_input() {
        let msg = ChatMessage::text("u1", "c1", "/search bio");
        assert_eq!(msg.sender, "u1");
        assert_eq!(msg.chat_id, "c1");
        assert_eq!(msg.to_input(), Input::Command("/search bio".to_string()));
    }

    #[test]
    fn test_callback_becomes_token_input() {
        let msg = ChatMessage::callback("u1", "c1", "inst_eng");
        assert_eq!(msg.to_input(), Input::Token("inst_eng".to_string()));
    }

    #[test]
    fn test_content_json_shape() {
        let json = serde_json::to_value(ChatContent::Callback("browse".to_string())).unwrap();
        assert_eq!(json["kind"], "callback");
        assert_eq!(json["data"], "browse");
    }
}
