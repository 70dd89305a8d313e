//! Control-plane client: talks to a running daemon over local TCP.
//!
//! Provides a typed client for the CLI. Uses `hyper` for HTTP/1.1 on a
//! plain `TcpStream`, one connection per request.

use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use coursedesk_config::AppConfig;

use super::types::*;
use crate::dispatch::Input;
use crate::outcome::Reply;

/// Errors from the control-plane client.
#[derive(Debug, thiserror::Error)]
pub enum IpcClientError {
    #[error("failed to connect to daemon at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("daemon is not running (nothing listening on {0})")]
    NotRunning(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("daemon returned error: {0}")]
    DaemonError(String),
}

/// Client for the coursedesk daemon control plane.
pub struct IpcClient {
    addr: String,
}

impl IpcClient {
    /// Create a client targeting `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Create a client for the daemon described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(format!(
            "{}:{}",
            config.daemon.listen_addr, config.daemon.listen_port
        ))
    }

    /// The `host:port` this client connects to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<TcpStream, IpcClientError> {
        TcpStream::connect(&self.addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                IpcClientError::NotRunning(self.addr.clone())
            } else {
                IpcClientError::Connect {
                    addr: self.addr.clone(),
                    source: e,
                }
            }
        })
    }

    /// Send one HTTP request and return the response body.
    async fn request(
        &self,
        method: hyper::Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes, IpcClientError> {
        let io = TokioIo::new(self.connect().await?);

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, http_body_util::Full<Bytes>>(io)
                .await
                .map_err(|e| IpcClientError::Request(format!("HTTP handshake failed: {e}")))?;

        // Drive the connection in the background
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(error = %e, "Control-plane connection error");
            }
        });

        debug!(%method, path, "Control-plane request");

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header("host", self.addr.as_str());
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }

        let req_body = http_body_util::Full::new(body.map(Bytes::from).unwrap_or_default());
        let req = builder
            .body(req_body)
            .map_err(|e| IpcClientError::Request(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| IpcClientError::Request(format!("request failed: {e}")))?;

        let status = resp.status();
        let resp_body = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| IpcClientError::Request(format!("failed to read response body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&resp_body) {
                return Err(IpcClientError::DaemonError(err.error));
            }
            return Err(IpcClientError::Request(format!(
                "unexpected status: {status}"
            )));
        }

        Ok(resp_body)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, IpcClientError> {
        let body = self.request(hyper::Method::GET, path, None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("{path}: {e}")))
    }

    // ── Typed API methods ──────────────────────────────────────────────

    /// Health check: is the daemon running and responsive?
    pub async fn health(&self) -> Result<HealthResponse, IpcClientError> {
        self.get("/health").await
    }

    pub async fn status(&self) -> Result<StatusResponse, IpcClientError> {
        self.get("/status").await
    }

    /// Request daemon shutdown.
    pub async fn stop(&self) -> Result<StopResponse, IpcClientError> {
        let body = self.request(hyper::Method::POST, "/stop", None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("stop: {e}")))
    }

    /// The daemon's running configuration as TOML, credentials masked.
    pub async fn config(&self) -> Result<ConfigResponse, IpcClientError> {
        self.get("/config").await
    }

    /// Submit one input on behalf of `conversation` and return the reply.
    pub async fn interact(
        &self,
        conversation: &str,
        sender: Option<&str>,
        input: Input,
    ) -> Result<Reply, IpcClientError> {
        let req = InteractRequest {
            conversation: conversation.to_string(),
            sender: sender.map(str::to_string),
            input,
        };
        let body_bytes = serde_json::to_vec(&req)
            .map_err(|e| IpcClientError::Parse(format!("failed to serialize request: {e}")))?;
        let body = self
            .request(hyper::Method::POST, "/interact", Some(body_bytes))
            .await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("interact: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use tokio::sync::broadcast;

    use super::super::server;
    use crate::catalog::InMemoryCatalog;
    use crate::dispatch::Dispatcher;

    #[test]
    fn test_client_from_config() {
        let client = IpcClient::from_config(&AppConfig::default());
        assert_eq!(client.addr(), "127.0.0.1:9200");
    }

    #[tokio::test]
    async fn test_client_not_running_error() {
        // Grab a free port, then release it so nothing is listening there.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = IpcClient::new(format!("127.0.0.1:{port}"));
        let result = client.health().await;
        assert!(matches!(result, Err(IpcClientError::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_integration_server_client() {
        let mut config = AppConfig::default();
        config.daemon.listen_port = 0;
        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(server::IpcState {
            dispatcher: Arc::new(Dispatcher::new(
                &config,
                Arc::new(InMemoryCatalog::empty()),
            )),
            config: config.clone(),
            shutdown_tx: shutdown_tx.clone(),
            started_at: Instant::now(),
        });

        let listener = server::bind(&config).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_handle = tokio::spawn(server::serve(listener, state, shutdown_tx.subscribe()));

        let client = IpcClient::new(addr.to_string());

        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");

        let status = client.status().await.unwrap();
        assert!(status.running);
        assert_eq!(status.listen_port, 0);

        let reply = client
            .interact("cli", None, Input::Command("/help".to_string()))
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Help { .. }));

        let config_resp = client.config().await.unwrap();
        assert!(config_resp.toml.contains("[search]"));

        let stop = client.stop().await.unwrap();
        assert!(stop.acknowledged);

        let finished = tokio::time::timeout(Duration::from_secs(2), server_handle).await;
        assert!(finished.is_ok());
    }
}
