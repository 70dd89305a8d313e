//! Control-plane server: an axum HTTP router on a local TCP port.
//!
//! The daemon binds `daemon.listen_addr:daemon.listen_port` and exposes a
//! JSON API for the CLI to query status, request shutdown, read the
//! configuration and drive conversations through the dispatcher.

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

use coursedesk_config::AppConfig;

use super::types::*;
use crate::build_info::BuildInfo;
use crate::daemon::ShutdownSignal;
use crate::dispatch::{Caller, Dispatcher};
use crate::outcome::Reply;

/// Shared state accessible to all control-plane route handlers.
pub struct IpcState {
    pub config: AppConfig,
    pub shutdown_tx: broadcast::Sender<ShutdownSignal>,
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: Instant,
}

/// Build the axum router with all control-plane routes.
pub fn router(state: Arc<IpcState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/stop", post(handle_stop))
        .route("/config", get(handle_config))
        .route("/interact", post(handle_interact))
        .with_state(state)
}

/// Bind the control-plane listener named in the configuration.
pub async fn bind(config: &AppConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind((config.daemon.listen_addr.as_str(), config.daemon.listen_port)).await
}

/// Serve the control plane on `listener` until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    state: Arc<IpcState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    info!(%addr, "Control plane listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Control plane shutting down");
        })
        .await
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health() -> Json<HealthResponse> {
    let build = BuildInfo::current();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: build.version,
        git_hash: build.git_hash,
        build_profile: build.profile,
        built_at: build.built_at,
    })
}

async fn handle_status(State(state): State<Arc<IpcState>>) -> Json<StatusResponse> {
    let config = &state.config;

    Json(StatusResponse {
        running: true,
        version: crate::build_info::VERSION.to_string(),
        git_hash: crate::build_info::GIT_HASH.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        listen_addr: config.daemon.listen_addr.clone(),
        listen_port: config.daemon.listen_port,
        channel_enabled: config.channel.enabled,
        log_level: config.logging.level.clone(),
        catalog_seed: config.catalog.seed_path.clone(),
        sessions: state.dispatcher.sessions().len(),
        search_sessions: state.dispatcher.searches().len(),
        pid: std::process::id(),
    })
}

async fn handle_stop(State(state): State<Arc<IpcState>>) -> (StatusCode, Json<StopResponse>) {
    info!("Stop requested via control plane");
    let _ = state.shutdown_tx.send(ShutdownSignal);
    (
        StatusCode::OK,
        Json(StopResponse {
            acknowledged: true,
            message: "Shutdown initiated".to_string(),
        }),
    )
}

async fn handle_config(
    State(state): State<Arc<IpcState>>,
) -> Result<Json<ConfigResponse>, (StatusCode, Json<ErrorResponse>)> {
    match toml::to_string_pretty(&state.config.redacted()) {
        Ok(toml_str) => Ok(Json(ConfigResponse { toml: toml_str })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to serialize config: {e}"),
            }),
        )),
    }
}

async fn handle_interact(
    State(state): State<Arc<IpcState>>,
    Json(req): Json<InteractRequest>,
) -> Result<Json<Reply>, (StatusCode, Json<ErrorResponse>)> {
    if req.conversation.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "conversation must not be empty".to_string(),
            }),
        ));
    }

    let is_admin = req
        .sender
        .as_deref()
        .is_some_and(|sender| state.config.access.is_admin(sender));
    debug!(conversation = %req.conversation, is_admin, "Interaction via control plane");

    let caller = Caller::new(req.conversation, is_admin);
    Ok(Json(state.dispatcher.handle(&caller, req.input).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::dispatch::Input;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state_with(config: AppConfig) -> Arc<IpcState> {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let dispatcher = Arc::new(Dispatcher::new(
            &config,
            Arc::new(InMemoryCatalog::empty()),
        ));

        Arc::new(IpcState {
            config,
            shutdown_tx,
            dispatcher,
            started_at: Instant::now(),
        })
    }

    fn test_state() -> Arc<IpcState> {
        state_with(AppConfig::default())
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn interact(req: &InteractRequest) -> Request<Body> {
        Request::post("/interact")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(req).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(test_state());
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let health: HealthResponse = body_json(resp).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, crate::build_info::VERSION);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let app = router(test_state());
        let req = Request::get("/status").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let status: StatusResponse = body_json(resp).await;
        assert!(status.running);
        assert_eq!(status.listen_port, 9200);
        assert_eq!(status.sessions, 0);
        assert!(status.catalog_seed.is_none());
    }

    #[tokio::test]
    async fn test_stop_endpoint() {
        let state = test_state();
        let mut rx = state.shutdown_tx.subscribe();
        let app = router(state);

        let req = Request::post("/stop").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let stop: StopResponse = body_json(resp).await;
        assert!(stop.acknowledged);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_config_endpoint_redacts_bot_token() {
        let mut config = AppConfig::default();
        config.channel.enabled = true;
        config.channel.bot_token = Some("987:very-secret".to_string());
        let app = router(state_with(config));

        let req = Request::get("/config").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let config_resp: ConfigResponse = body_json(resp).await;
        assert!(config_resp.toml.contains("listen_port"));
        assert!(!config_resp.toml.contains("very-secret"));
    }

    #[tokio::test]
    async fn test_interact_runs_dispatcher() {
        let state = test_state();
        let app = router(Arc::clone(&state));

        let req = interact(&InteractRequest {
            conversation: "c-1".to_string(),
            sender: None,
            input: Input::Command("/start".to_string()),
        });
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let reply: Reply = body_json(resp).await;
        assert!(matches!(reply, Reply::Home { .. }));
    }

    #[tokio::test]
    async fn test_interact_resolves_admin_sender() {
        let mut config = AppConfig::default();
        config.access.admin_ids = vec!["ops".to_string()];
        let state = state_with(config);

        let as_admin = interact(&InteractRequest {
            conversation: "c-2".to_string(),
            sender: Some("ops".to_string()),
            input: Input::Command("/status".to_string()),
        });
        let reply: Reply = body_json(router(Arc::clone(&state)).oneshot(as_admin).await.unwrap()).await;
        assert!(matches!(reply, Reply::Status { sessions: Some(_), .. }));

        let as_user = interact(&InteractRequest {
            conversation: "c-3".to_string(),
            sender: Some("guest".to_string()),
            input: Input::Command("/status".to_string()),
        });
        let reply: Reply = body_json(router(state).oneshot(as_user).await.unwrap()).await;
        assert!(matches!(reply, Reply::Status { sessions: None, .. }));
    }

    #[tokio::test]
    async fn test_interact_rejects_blank_conversation() {
        let app = router(test_state());
        let req = interact(&InteractRequest {
            conversation: "  ".to_string(),
            sender: None,
            input: Input::Command("/help".to_string()),
        });
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let err: ErrorResponse = body_json(resp).await;
        assert!(err.error.contains("conversation"));
    }
}
