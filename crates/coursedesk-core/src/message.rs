//! Message types for the coursedesk message bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::dispatch::{Caller, Input};
use crate::outcome::Reply;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A message envelope routed through the daemon's message bus.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Unique message identifier.
    pub id: u64,

    /// Id of the inbound envelope this one answers.
    pub in_reply_to: Option<u64>,

    /// Timestamp when the message was created.
    pub timestamp: SystemTime,

    /// Source channel (e.g. "chat", "cli").
    pub channel: String,

    /// Conversation the message belongs to.
    pub conversation: String,

    /// Whether the sender is an administrator.
    pub is_admin: bool,

    /// Direction of the message.
    pub direction: Direction,

    pub payload: Payload,
}

/// Whether a message is inbound (from user) or outbound (to user).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Message received from an external channel.
    Inbound,
    /// Message being sent to an external channel.
    Outbound,
}

/// Message body: user input going in, a reply going out.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Inbound(Input),
    Outbound(Reply),
}

impl Envelope {
    /// Create a new inbound message envelope.
    pub fn inbound(channel: &str, caller: Caller, input: Input) -> Self {
        Self {
            id: next_id(),
            in_reply_to: None,
            timestamp: SystemTime::now(),
            channel: channel.to_string(),
            conversation: caller.conversation,
            is_admin: caller.is_admin,
            direction: Direction::Inbound,
            payload: Payload::Inbound(input),
        }
    }

    /// Create an outbound response envelope for this message.
    pub fn reply(&self, reply: Reply) -> Self {
        Self {
            id: next_id(),
            in_reply_to: Some(self.id),
            timestamp: SystemTime::now(),
            channel: self.channel.clone(),
            conversation: self.conversation.clone(),
            is_admin: self.is_admin,
            direction: Direction::Outbound,
            payload: Payload::Outbound(reply),
        }
    }

    /// The caller an inbound envelope came from.
    pub fn caller(&self) -> Caller {
        Caller::new(self.conversation.clone(), self.is_admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> Envelope {
        Envelope::inbound(
            "chat",
            Caller::new("42", false),
            Input::Command("/help".to_string()),
        )
    }

    #[test]
    fn test_envelope_creation() {
        let envelope = inbound();
        assert_eq!(envelope.channel, "chat");
        assert_eq!(envelope.conversation, "42");
        assert_eq!(envelope.direction, Direction::Inbound);
        assert!(envelope.id > 0);
        assert!(envelope.in_reply_to.is_none());
    }

    #[test]
    fn test_envelope_reply() {
        let original = inbound();
        let reply = original.reply(Reply::Ignored);
        assert_eq!(reply.channel, "chat");
        assert_eq!(reply.conversation, "42");
        assert_eq!(reply.payload, Payload::Outbound(Reply::Ignored));
        assert_eq!(reply.direction, Direction::Outbound);
        assert_eq!(reply.in_reply_to, Some(original.id));
        assert_ne!(reply.id, original.id);
    }

    #[test]
    fn test_unique_ids() {
        let a = inbound();
        let b = inbound();
        assert_ne!(a.id, b.id);
    }
}
