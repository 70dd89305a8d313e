//! Async chat service: bridges chat messages and the daemon message bus.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use coursedesk_config::{AccessConfig, AppConfig};
use coursedesk_core::message::{Direction, Envelope, Payload};
use coursedesk_core::{Caller, Reply};

use crate::message::{ChatMessage, OutboundMessage};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::{CHANNEL_NAME, ChannelError, Transport};

#[derive(Debug)]
pub enum ServiceCommand {
    /// A message received from the transport.
    Inbound(ChatMessage),
    Shutdown,
}

/// Runs as a tokio task between a [`Transport`] and the daemon bus.
pub struct ChatService {
    command_rx: mpsc::Receiver<ServiceCommand>,
    bus_tx: broadcast::Sender<Envelope>,
    bus_rx: broadcast::Receiver<Envelope>,
    transport: Arc<dyn Transport>,
    access: AccessConfig,
    rate_limiter: RateLimiter,
}

/// Handle for feeding a running [`ChatService`].
#[derive(Clone)]
pub struct ChatServiceHandle {
    command_tx: mpsc::Sender<ServiceCommand>,
}

impl ChatServiceHandle {
    /// Hand a message received from the transport to the service.
    pub async fn submit(&self, msg: ChatMessage) -> Result<(), ChannelError> {
        self.command_tx
            .send(ServiceCommand::Inbound(msg))
            .await
            .map_err(|_| ChannelError::ServiceClosed)
    }

    pub async fn shutdown(&self) -> Result<(), ChannelError> {
        self.command_tx
            .send(ServiceCommand::Shutdown)
            .await
            .map_err(|_| ChannelError::ServiceClosed)
    }
}

impl ChatService {
    /// Create a service and the handle that feeds it.
    ///
    /// The bus subscription is taken here, so replies to messages processed
    /// before [`run`](Self::run) starts are not lost.
    pub fn new(
        bus_tx: broadcast::Sender<Envelope>,
        transport: Arc<dyn Transport>,
        access: AccessConfig,
        rate_limit: RateLimitConfig,
    ) -> (Self, ChatServiceHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let bus_rx = bus_tx.subscribe();

        let service = Self {
            command_rx,
            bus_tx,
            bus_rx,
            transport,
            access,
            rate_limiter: RateLimiter::new(rate_limit),
        };
        (service, ChatServiceHandle { command_tx })
    }

    /// Create a service from the `[channel]` and `[access]` sections.
    pub fn from_config(
        config: &AppConfig,
        bus_tx: broadcast::Sender<Envelope>,
        transport: Arc<dyn Transport>,
    ) -> Result<(Self, ChatServiceHandle), ChannelError> {
        if !config.channel.enabled {
            return Err(ChannelError::Disabled);
        }
        if config
            .channel
            .bot_token
            .as_deref()
            .is_none_or(|token| token.trim().is_empty())
        {
            return Err(ChannelError::MissingToken);
        }
        Ok(Self::new(
            bus_tx,
            transport,
            config.access.clone(),
            RateLimitConfig::from(&config.channel),
        ))
    }

    /// Run the service event loop until shutdown.
    pub async fn run(mut self) {
        info!("Chat service started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(ServiceCommand::Inbound(msg)) => {
                        if let Err(e) = self.process_inbound(&msg) {
                            warn!(sender = %msg.sender, error = %e, "Inbound chat message dropped");
                        }
                    }
                    Some(ServiceCommand::Shutdown) | None => break,
                },
                received = self.bus_rx.recv() => match received {
                    Ok(envelope) => self.handle_outbound(envelope).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Chat service lagged behind the bus, replies dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!("Chat service stopped");
    }

    /// Publish one chat message on the bus. Returns the envelope id.
    pub fn process_inbound(&mut self, msg: &ChatMessage) -> Result<u64, ChannelError> {
        if !self.rate_limiter.check(&msg.sender) {
            return Err(ChannelError::RateLimited(msg.sender.clone()));
        }

        let caller = Caller::new(msg.chat_id.clone(), self.access.is_admin(&msg.sender));
        let envelope = Envelope::inbound(CHANNEL_NAME, caller, msg.to_input());
        let id = envelope.id;
        self.bus_tx
            .send(envelope)
            .map_err(|_| ChannelError::Bus("no subscribers".to_string()))?;

        debug!(chat = %msg.chat_id, id, "Inbound chat message routed to bus");
        Ok(id)
    }

    async fn handle_outbound(&self, envelope: Envelope) {
        if envelope.direction != Direction::Outbound || envelope.channel != CHANNEL_NAME {
            return;
        }
        let Payload::Outbound(reply) = envelope.payload else {
            return;
        };
        if reply == Reply::Ignored {
            return;
        }

        let message = OutboundMessage {
            chat_id: envelope.conversation,
            in_reply_to: envelope.in_reply_to,
            reply,
        };
        let chat_id = message.chat_id.clone();
        match self.transport.deliver(message).await {
            Ok(()) => debug!(chat = %chat_id, "Reply delivered"),
            Err(e) => warn!(chat = %chat_id, error = %e, "Reply delivery failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::QueueTransport;
    use coursedesk_core::{Daemon, Input};
    use coursedesk_test_utils::{TestConfigBuilder, sample_catalog};

    fn service(
        bus_tx: broadcast::Sender<Envelope>,
        max_tokens: u32,
    ) -> (ChatService, ChatServiceHandle, mpsc::Receiver<OutboundMessage>) {
        let (transport, outbox) = QueueTransport::new(16);
        let access = AccessConfig {
            admin_ids: vec!["ops".to_string()],
        };
        let limits = RateLimitConfig {
            max_tokens,
            refill_interval: Duration::from_secs(60),
        };
        let (service, handle) = ChatService::new(bus_tx, Arc::new(transport), access, limits);
        (service, handle, outbox)
    }

    #[tokio::test]
    async fn test_service_shutdown() {
        let (bus_tx, _bus_rx) = broadcast::channel(16);
        let (service, handle, _outbox) = service(bus_tx, 10);

        let task = tokio::spawn(service.run());
        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_inbound_routing_resolves_admin() {
        let (bus_tx, mut bus_rx) = broadcast::channel(16);
        let (mut service, _handle, _outbox) = service(bus_tx, 10);

        let id = service
            .process_inbound(&ChatMessage::text("ops", "chat-1", "/status"))
            .unwrap();
        let envelope = bus_rx.recv().await.unwrap();
        assert_eq!(envelope.id, id);
        assert_eq!(envelope.channel, CHANNEL_NAME);
        assert_eq!(envelope.conversation, "chat-1");
        assert!(envelope.is_admin);
        assert_eq!(
            envelope.payload,
            Payload::Inbound(Input::Command("/status".to_string()))
        );

        service
            .process_inbound(&ChatMessage::callback("guest", "chat-2", "browse"))
            .unwrap();
        let envelope = bus_rx.recv().await.unwrap();
        assert!(!envelope.is_admin);
        assert_eq!(envelope.payload, Payload::Inbound(Input::Token("browse".to_string())));
    }

    #[tokio::test]
    async fn test_inbound_rate_limiting() {
        let (bus_tx, _bus_rx) = broadcast::channel(16);
        let (mut service, _handle, _outbox) = service(bus_tx, 2);

        let msg = ChatMessage::text("u1", "c1", "hello");
        assert!(service.process_inbound(&msg).is_ok());
        assert!(service.process_inbound(&msg).is_ok());
        assert!(matches!(
            service.process_inbound(&msg),
            Err(ChannelError::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn test_outbound_filtering() {
        let (bus_tx, _bus_rx) = broadcast::channel(16);
        let (service, handle, mut outbox) = service(bus_tx.clone(), 10);
        let task = tokio::spawn(service.run());

        let inbound = Envelope::inbound(
            CHANNEL_NAME,
            Caller::new("c1", false),
            Input::Command("hi".to_string()),
        );
        let other = Envelope::inbound("cli", Caller::new("c2", false), Input::Command("x".to_string()));
        bus_tx.send(inbound.reply(Reply::Ignored)).unwrap();
        bus_tx.send(other.reply(Reply::NoSearchToResume { browse: "browse".to_string() })).unwrap();
        bus_tx
            .send(inbound.reply(Reply::UnknownCommand { command: "/x".to_string() }))
            .unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(2), outbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.chat_id, "c1");
        assert_eq!(delivered.in_reply_to, Some(inbound.id));
        assert_eq!(delivered.reply, Reply::UnknownCommand { command: "/x".to_string() });

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(outbox.try_recv().is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_round_trip_through_daemon() {
        let config = TestConfigBuilder::new().build();
        let daemon = Daemon::with_catalog(config, Arc::new(sample_catalog()));
        let router = daemon.spawn_router();

        let (service, handle, mut outbox) = service(daemon.message_sender(), 10);
        let task = tokio::spawn(service.run());

        handle
            .submit(ChatMessage::text("u1", "chat-9", "/browse"))
            .await
            .unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(2), outbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.chat_id, "chat-9");
        let Reply::Navigation(view) = delivered.reply else {
            panic!("expected a navigation reply");
        };
        assert_eq!(view.items.len(), 2);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        daemon.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), router).await;
    }

    #[test]
    fn test_from_config_requires_enabled_channel_and_token() {
        let (bus_tx, _bus_rx) = broadcast::channel(4);
        let (transport, _outbox) = QueueTransport::new(1);
        let transport: Arc<dyn Transport> = Arc::new(transport);

        let mut config = AppConfig::default();
        let disabled = ChatService::from_config(&config, bus_tx.clone(), Arc::clone(&transport));
        assert!(matches!(disabled, Err(ChannelError::Disabled)));

        config.channel.enabled = true;
        let missing = ChatService::from_config(&config, bus_tx.clone(), Arc::clone(&transport));
        assert!(matches!(missing, Err(ChannelError::MissingToken)));

        config.channel.bot_token = Some("123:abc".to_string());
        assert!(ChatService::from_config(&config, bus_tx, transport).is_ok());
    }
}
