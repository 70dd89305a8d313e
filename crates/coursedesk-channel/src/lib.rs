#![deny(unsafe_code)]

//! Chat channel bridge for coursedesk.
//!
//! Messages arriving from a chat transport are rate limited, tagged with the
//! sender's admin flag and published on the daemon's message bus. Replies the
//! daemon publishes for the chat channel are handed back to the transport
//! through the [`Transport`] trait.

use tokio::sync::mpsc;

use coursedesk_core::BoxFuture;

pub mod message;
pub mod rate_limit;
pub mod service;

pub use message::{ChatContent, ChatMessage, OutboundMessage};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use service::{ChatService, ChatServiceHandle};

/// Channel name stamped on every envelope this crate publishes.
pub const CHANNEL_NAME: &str = "chat";

/// Delivers replies to the chat network.
pub trait Transport: Send + Sync {
    fn deliver<'a>(&'a self, message: OutboundMessage) -> BoxFuture<'a, Result<(), ChannelError>>;
}

/// A transport that queues replies for a consumer task to send.
pub struct QueueTransport {
    tx: mpsc::Sender<OutboundMessage>,
}

impl QueueTransport {
    /// Create the transport and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Transport for QueueTransport {
    fn deliver<'a>(&'a self, message: OutboundMessage) -> BoxFuture<'a, Result<(), ChannelError>> {
        Box::pin(async move {
            self.tx
                .send(message)
                .await
                .map_err(|_| ChannelError::Delivery("outbound queue closed".to_string()))
        })
    }
}

/// Errors from the chat channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("chat channel is disabled in configuration")]
    Disabled,

    #[error("chat channel has no bot token configured")]
    MissingToken,

    #[error("sender {0} exceeded the rate limit")]
    RateLimited(String),

    #[error("message bus unavailable: {0}")]
    Bus(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("chat service is not running")]
    ServiceClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursedesk_core::Reply;

    #[tokio::test]
    async fn test_queue_transport_delivers_in_order() {
        let (transport, mut rx) = QueueTransport::new(4);
        for chat in ["a", "b"] {
            transport
                .deliver(OutboundMessage {
                    chat_id: chat.to_string(),
                    in_reply_to: None,
                    reply: Reply::Ignored,
                })
                .await
                .unwrap();
        }
        assert_eq!(rx.recv().await.unwrap().chat_id, "a");
        assert_eq!(rx.recv().await.unwrap().chat_id, "b");
    }

    #[tokio::test]
    async fn test_queue_transport_reports_closed_queue() {
        let (transport, rx) = QueueTransport::new(1);
        drop(rx);
        let result = transport
            .deliver(OutboundMessage {
                chat_id: "a".to_string(),
                in_reply_to: None,
                reply: Reply::Ignored,
            })
            .await;
        assert!(matches!(result, Err(ChannelError::Delivery(_))));
    }
}
