//! Daemon control plane: HTTP/JSON on a local TCP port.
//!
//! The CLI connects as a client to query status, request shutdown, read the
//! redacted configuration and drive a conversation without a chat transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     127.0.0.1:9200        ┌───────────────┐
//! │   CLI    │──────────────────────────▶│ Control plane │
//! │          │  HTTP/1.1 + JSON          │   (axum)      │
//! └──────────┘                           └───────┬───────┘
//!                                                │
//!                                        ┌───────▼───────┐
//!                                        │  Dispatcher   │
//!                                        └───────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::{IpcClient, IpcClientError};
pub use server::IpcState;
pub use types::*;
