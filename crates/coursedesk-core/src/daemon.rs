//! Daemon process: startup, shutdown and the main event loop.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use coursedesk_config::AppConfig;

use crate::catalog::{CatalogError, CatalogStore, InMemoryCatalog};
use crate::dispatch::Dispatcher;
use crate::ipc::server::{self, IpcState};
use crate::message::{Envelope, Payload};

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The main coursedesk daemon.
pub struct Daemon {
    config: AppConfig,
    dispatcher: Arc<Dispatcher>,
    started_at: Instant,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    _shutdown_rx: broadcast::Receiver<ShutdownSignal>,
    message_tx: broadcast::Sender<Envelope>,
    _message_rx: broadcast::Receiver<Envelope>,
}

impl Daemon {
    /// Create a daemon serving an empty catalog.
    pub fn new(config: AppConfig) -> Self {
        Self::with_catalog(config, Arc::new(InMemoryCatalog::empty()))
    }

    /// Create a daemon serving `catalog`.
    pub fn with_catalog(config: AppConfig, catalog: Arc<dyn CatalogStore>) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let (message_tx, _message_rx) = broadcast::channel(256);
        let dispatcher = Arc::new(Dispatcher::new(&config, catalog));

        Self {
            config,
            dispatcher,
            started_at: Instant::now(),
            shutdown_tx,
            _shutdown_rx,
            message_tx,
            _message_rx,
        }
    }

    /// Create a daemon, loading the catalog seed named in the configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self, DaemonError> {
        let catalog = match config.catalog.seed_path.as_deref() {
            Some(path) => InMemoryCatalog::load(Path::new(path)).await?,
            None => {
                warn!("No catalog.seed_path configured, serving an empty catalog");
                InMemoryCatalog::empty()
            }
        };
        Ok(Self::with_catalog(config, Arc::new(catalog)))
    }

    /// Run the daemon until a shutdown signal is received.
    pub async fn run(&self) -> Result<(), DaemonError> {
        info!(
            addr = %self.config.daemon.listen_addr,
            port = %self.config.daemon.listen_port,
            version = %crate::build_info::version_string(),
            "coursedesk daemon starting"
        );

        let listener = server::bind(&self.config).await.map_err(|e| {
            DaemonError::Startup(format!(
                "cannot bind control plane on {}:{}: {e}",
                self.config.daemon.listen_addr, self.config.daemon.listen_port
            ))
        })?;
        let state = Arc::new(IpcState {
            config: self.config.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            started_at: self.started_at,
        });
        let ipc = tokio::spawn(server::serve(listener, state, self.shutdown_tx.subscribe()));
        let router = self.spawn_router();
        let pruner = self.spawn_pruner();

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // Main event loop: wait for shutdown signal
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping daemon");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                let _ = self.shutdown_tx.send(ShutdownSignal);
            }
        }

        match tokio::time::timeout(Duration::from_secs(5), ipc).await {
            Ok(Ok(Err(e))) => warn!(error = %e, "Control plane exited with an error"),
            Ok(Err(e)) => warn!(error = %e, "Control plane task failed"),
            Err(_) => warn!("Control plane did not stop in time"),
            Ok(Ok(Ok(()))) => {}
        }
        router.abort();
        pruner.abort();

        info!("Daemon stopped");
        Ok(())
    }

    /// Answer every inbound envelope on the bus with an outbound one.
    ///
    /// Each envelope is handled on its own task, so a slow catalog query for
    /// one conversation does not hold up the others.
    pub fn spawn_router(&self) -> JoinHandle<()> {
        let mut rx = self.message_tx.subscribe();
        let tx = self.message_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    received = rx.recv() => match received {
                        Ok(envelope) => {
                            let Payload::Inbound(input) = envelope.payload.clone() else {
                                continue;
                            };
                            let dispatcher = Arc::clone(&dispatcher);
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                let reply = dispatcher.handle(&envelope.caller(), input).await;
                                if tx.send(envelope.reply(reply)).is_err() {
                                    debug!(id = envelope.id, "No subscribers for reply");
                                }
                            });
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Message bus lagged, inbound messages dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Message router stopped");
        })
    }

    /// Periodically drop idle sessions.
    pub fn spawn_pruner(&self) -> JoinHandle<()> {
        let period = Duration::from_secs(self.config.sessions.prune_interval_secs.max(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let removed = dispatcher.prune();
                        if removed > 0 {
                            info!(removed, "Pruned idle sessions");
                        }
                    }
                }
            }
        })
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    /// Get a sender for the message bus.
    pub fn message_sender(&self) -> broadcast::Sender<Envelope> {
        self.message_tx.clone()
    }

    /// Subscribe to the message bus.
    pub fn message_subscriber(&self) -> broadcast::Receiver<Envelope> {
        self.message_tx.subscribe()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get a reference to the daemon's configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("daemon startup failed: {0}")]
    Startup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Caller, Input};
    use crate::message::Direction;
    use crate::outcome::Reply;

    #[tokio::test]
    async fn test_daemon_creation() {
        let config = AppConfig::default();
        let daemon = Daemon::new(config);
        assert_eq!(daemon.config().daemon.listen_port, 9200);
        assert!(daemon.dispatcher().sessions().is_empty());
    }

    #[tokio::test]
    async fn test_daemon_shutdown() {
        let config = AppConfig::default();
        let daemon = Daemon::new(config);

        // Shutdown should not panic
        daemon.shutdown();
    }

    #[tokio::test]
    async fn test_from_config_reports_missing_seed() {
        let mut config = AppConfig::default();
        config.catalog.seed_path = Some("/nonexistent/catalog.toml".to_string());
        let result = Daemon::from_config(config).await;
        assert!(matches!(result, Err(DaemonError::Catalog(CatalogError::Io(_)))));
    }

    #[tokio::test]
    async fn test_router_answers_inbound_envelopes() {
        let daemon = Daemon::new(AppConfig::default());
        let tx = daemon.message_sender();
        let mut rx = daemon.message_subscriber();
        let router = daemon.spawn_router();

        let envelope = Envelope::inbound(
            "test-channel",
            Caller::new("7", false),
            Input::Command("/help".to_string()),
        );
        tx.send(envelope.clone()).unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let received = rx.recv().await.unwrap();
                if received.direction == Direction::Outbound {
                    return received;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(reply.in_reply_to, Some(envelope.id));
        assert_eq!(reply.conversation, "7");
        assert!(matches!(
            reply.payload,
            Payload::Outbound(Reply::Help { .. })
        ));

        daemon.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), router).await;
    }
}
