//! Shared request/response types for the daemon control plane.
//!
//! These types are serialized as JSON over HTTP. Both the control-plane
//! server (daemon) and client (CLI) use them.

use serde::{Deserialize, Serialize};

use crate::dispatch::Input;

/// Daemon health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub git_hash: String,
    pub build_profile: String,
    /// Unix seconds at compile time.
    pub built_at: u64,
}

/// Daemon runtime status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub version: String,
    pub git_hash: String,
    pub uptime_secs: u64,
    pub listen_addr: String,
    pub listen_port: u16,
    pub channel_enabled: bool,
    pub log_level: String,
    pub catalog_seed: Option<String>,
    pub sessions: usize,
    pub search_sessions: usize,
    pub pid: u32,
}

/// Daemon shutdown response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub acknowledged: bool,
    pub message: String,
}

/// Configuration response (serialized TOML, credentials redacted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub toml: String,
}

/// One interaction submitted through the control plane.
///
/// `sender` is matched against `access.admin_ids`; without it the caller is
/// treated as a regular user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractRequest {
    pub conversation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub input: Input,
}

/// Generic error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
