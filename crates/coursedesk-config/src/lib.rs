#![deny(unsafe_code)]

//! Configuration loading and validation for coursedesk.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure; every section has defaults so an empty
//! file is a valid configuration.

use std::path::Path;

use coursedesk_macros::{Redact, Validate};
use serde::{Deserialize, Serialize};

/// Placeholder written in place of masked credentials.
pub const REDACTED: &str = "[REDACTED]";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon / control-plane configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Chat channel configuration.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Catalog source.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Keyword search limits.
    #[serde(default)]
    pub search: SearchConfig,

    /// Action token limits.
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Guided navigation settings.
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Conversation session bounds.
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Favorites and view history limits.
    #[serde(default)]
    pub library: LibraryConfig,

    /// Admin identities.
    #[serde(default)]
    pub access: AccessConfig,
}

/// Configuration for the daemon control plane.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(section = "daemon")]
pub struct DaemonConfig {
    /// Address the control plane listens on.
    #[serde(default = "default_listen_addr")]
    #[validate(non_empty)]
    pub listen_addr: String,

    /// Port the control plane listens on.
    #[serde(default = "default_listen_port")]
    #[validate(range(min = 1, max = 65535))]
    pub listen_port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    9200
}

/// Configuration for the chat channel adapter.
#[derive(Clone, Serialize, Deserialize, Redact, Validate)]
#[validate(section = "channel")]
pub struct ChannelConfig {
    /// Whether the chat channel is enabled.
    #[serde(default)]
    pub enabled: bool,

    /// Bot credential handed to the transport. Never printed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[redact]
    pub bot_token: Option<String>,

    /// Token-bucket size per sender.
    #[serde(default = "default_rate_limit_max_tokens")]
    #[validate(range(min = 1, max = 10000))]
    pub rate_limit_max_tokens: u32,

    /// Milliseconds between token refills.
    #[serde(default = "default_rate_limit_refill_ms")]
    #[validate(range(min = 1, max = 3600000))]
    pub rate_limit_refill_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            rate_limit_max_tokens: default_rate_limit_max_tokens(),
            rate_limit_refill_ms: default_rate_limit_refill_ms(),
        }
    }
}

fn default_rate_limit_max_tokens() -> u32 {
    20
}

fn default_rate_limit_refill_ms() -> u64 {
    3000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(section = "logging")]
pub struct LoggingConfig {
    /// Log level filter.
    #[serde(default = "default_log_level")]
    #[validate(one_of("trace", "debug", "info", "warn", "error"))]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the read-only catalog comes from.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to a TOML catalog seed. Without it the daemon serves an empty catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_path: Option<String>,
}

/// Keyword search limits.
///
/// ## TOML Example
///
/// ```toml
/// [search]
/// min_keyword_len = 3
/// page_size = 5
/// max_results = 200
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(section = "search")]
pub struct SearchConfig {
    /// Keywords shorter than this (in characters, after trimming) are rejected.
    #[serde(default = "default_min_keyword_len")]
    #[validate(range(min = 1, max = 32))]
    pub min_keyword_len: usize,

    /// Result items per page.
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 50))]
    pub page_size: usize,

    /// Merged result counts above this are refused instead of paginated.
    #[serde(default = "default_max_results")]
    #[validate(range(min = 1, max = 10000))]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_keyword_len: default_min_keyword_len(),
            page_size: default_page_size(),
            max_results: default_max_results(),
        }
    }
}

fn default_min_keyword_len() -> usize {
    3
}

fn default_page_size() -> usize {
    5
}

fn default_max_results() -> usize {
    200
}

/// Action token limits.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(section = "tokens")]
pub struct TokenConfig {
    /// Byte ceiling imposed by the chat transport on callback payloads.
    #[serde(default = "default_token_max_bytes")]
    #[validate(range(min = 16, max = 4096))]
    pub max_bytes: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_token_max_bytes(),
        }
    }
}

fn default_token_max_bytes() -> usize {
    64
}

/// Guided navigation settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(section = "navigation")]
pub struct NavigationConfig {
    /// Number of academic years offered below a sub-unit.
    #[serde(default = "default_years")]
    #[validate(range(min = 1, max = 6))]
    pub years: u8,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            years: default_years(),
        }
    }
}

fn default_years() -> u8 {
    4
}

/// Conversation session bounds.
///
/// Sessions live in process memory only. Idle entries expire and the map is
/// capped so a long-running daemon does not grow without bound.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(section = "sessions")]
pub struct SessionConfig {
    /// Seconds of inactivity after which a session is discarded.
    #[serde(default = "default_idle_ttl_secs")]
    #[validate(range(min = 1, max = 2592000))]
    pub idle_ttl_secs: u64,

    /// Maximum number of conversations tracked per store.
    #[serde(default = "default_max_conversations")]
    #[validate(range(min = 1, max = 10000000))]
    pub max_conversations: usize,

    /// Seconds between background prune passes.
    #[serde(default = "default_prune_interval_secs")]
    #[validate(range(min = 1, max = 86400))]
    pub prune_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            max_conversations: default_max_conversations(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

fn default_idle_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_conversations() -> usize {
    10_000
}

fn default_prune_interval_secs() -> u64 {
    300
}

/// Per-conversation favorites and view history.
///
/// ## TOML Example
///
/// ```toml
/// [library]
/// max_favorites = 100
/// max_history = 100
/// page_size = 5
/// idle_ttl_secs = 2592000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(section = "library")]
pub struct LibraryConfig {
    /// Saved documents kept per conversation. Adding past this is refused.
    #[serde(default = "default_max_favorites")]
    #[validate(range(min = 1, max = 1000))]
    pub max_favorites: usize,

    /// Viewed documents remembered per conversation; the oldest fall off.
    #[serde(default = "default_max_history")]
    #[validate(range(min = 1, max = 1000))]
    pub max_history: usize,

    /// Entries per favorites or history page.
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 50))]
    pub page_size: usize,

    /// Seconds an untouched conversation keeps its favorites and history.
    #[serde(default = "default_library_ttl_secs")]
    #[validate(range(min = 1, max = 31536000))]
    pub idle_ttl_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            max_favorites: default_max_favorites(),
            max_history: default_max_history(),
            page_size: default_page_size(),
            idle_ttl_secs: default_library_ttl_secs(),
        }
    }
}

fn default_max_favorites() -> usize {
    100
}

fn default_max_history() -> usize {
    100
}

fn default_library_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

/// Admin identities for the single admin/non-admin flag.
///
/// ## TOML Example
///
/// ```toml
/// [access]
/// admin_ids = ["123456789"]
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Sender ids treated as administrators.
    #[serde(default)]
    pub admin_ids: Vec<String>,
}

impl AccessConfig {
    /// Whether `sender` is listed as an administrator.
    pub fn is_admin(&self, sender: &str) -> bool {
        self.admin_ids.iter().any(|id| id.trim() == sender)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// A copy safe to show to operators: credentials are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.channel.bot_token.is_some() {
            copy.channel.bot_token = Some(REDACTED.to_string());
        }
        copy
    }

    /// Validate the configuration.
    ///
    /// Collects the messages of every section and reports them together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let sections = [
            self.daemon.validate(),
            self.channel.validate(),
            self.logging.validate(),
            self.search.validate(),
            self.tokens.validate(),
            self.navigation.validate(),
            self.sessions.validate(),
            self.library.validate(),
        ];
        for result in sections {
            if let Err(messages) = result {
                errors.extend(messages);
            }
        }

        if self.channel.enabled
            && self
                .channel
                .bot_token
                .as_deref()
                .is_none_or(|token| token.trim().is_empty())
        {
            errors.push("channel.bot_token is required when channel.enabled is true".to_string());
        }

        if let Some(path) = &self.catalog.seed_path
            && path.trim().is_empty()
        {
            errors.push("catalog.seed_path must not be empty when set".to_string());
        }

        for (i, id) in self.access.admin_ids.iter().enumerate() {
            if id.trim().is_empty() {
                errors.push(format!("access.admin_ids[{i}] must not be empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}
