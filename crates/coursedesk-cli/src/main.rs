#![deny(unsafe_code)]

//! coursedesk CLI: runs the daemon and talks to it over the control plane.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coursedesk_channel::{ChatService, QueueTransport};
use coursedesk_config::AppConfig;
use coursedesk_core::ipc::{IpcClient, IpcClientError};
use coursedesk_core::{Daemon, Input, TokenCodec};

/// coursedesk: browse and search an academic document catalog.
#[derive(Parser)]
#[command(name = "coursedesk", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "coursedesk.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv). Overrides `logging.level`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon in the foreground.
    Start,

    /// Stop a running daemon.
    Stop,

    /// Show daemon status.
    Status,

    /// Validate and display configuration.
    Config {
        /// Print the resolved configuration (credentials masked).
        #[arg(long)]
        show: bool,

        /// Ask the running daemon for its configuration instead.
        #[arg(long)]
        running: bool,
    },

    /// Send one interaction to the running daemon and print the reply.
    Send {
        /// Conversation the interaction belongs to.
        #[arg(long, default_value = "cli")]
        conversation: String,

        /// Sender identity, checked against `access.admin_ids`.
        #[arg(long)]
        sender: Option<String>,

        /// Treat the text as an action token instead of typed text.
        #[arg(long)]
        token: bool,

        text: String,
    },

    /// Decode an action token locally.
    Decode { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, found) = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &config.logging.level))
        .init();
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Start => cmd_start(config).await?,
        Commands::Stop => cmd_stop(&config).await?,
        Commands::Status => cmd_status(&config).await?,
        Commands::Config { show, running } => cmd_config(&cli.config, &config, show, running).await?,
        Commands::Send {
            conversation,
            sender,
            token,
            text,
        } => {
            let input = if token {
                Input::Token(text)
            } else {
                Input::Command(text)
            };
            cmd_send(&config, &conversation, sender.as_deref(), input).await?
        }
        Commands::Decode { token } => cmd_decode(&config, &token)?,
    }

    Ok(())
}

/// `RUST_LOG` wins, then `-v`, then the configured level.
fn log_filter(verbose: u8, configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbose, configured)))
}

fn level_for(verbose: u8, configured: &str) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

async fn cmd_start(config: AppConfig) -> Result<()> {
    info!("Starting coursedesk daemon");
    let daemon = Daemon::from_config(config)
        .await
        .context("failed to initialise daemon")?;

    let chat = if daemon.config().channel.enabled {
        let (transport, mut outbox) = QueueTransport::new(256);
        // The transport feeds inbound chat messages through `handle`.
        let (service, handle) =
            ChatService::from_config(daemon.config(), daemon.message_sender(), Arc::new(transport))
                .context("failed to start chat channel")?;
        // The network client consumes this queue; until one is attached,
        // replies are only logged.
        let drain = tokio::spawn(async move {
            while let Some(message) = outbox.recv().await {
                info!(chat = %message.chat_id, "Reply ready for chat transport");
            }
        });
        Some((handle, tokio::spawn(service.run()), drain))
    } else {
        None
    };

    let result = daemon.run().await;
    if let Some((handle, service, drain)) = chat {
        if handle.shutdown().await.is_err() {
            service.abort();
        }
        drain.abort();
    }
    result.context("daemon exited with an error")
}

fn client(config: &AppConfig) -> IpcClient {
    IpcClient::from_config(config)
}

/// Turn a refused connection into a readable hint.
fn explain(err: IpcClientError) -> anyhow::Error {
    match err {
        IpcClientError::NotRunning(addr) => {
            anyhow::anyhow!("no coursedesk daemon is listening on {addr}; start one with `coursedesk start`")
        }
        other => anyhow::Error::new(other),
    }
}

async fn cmd_stop(config: &AppConfig) -> Result<()> {
    let resp = client(config).stop().await.map_err(explain)?;
    println!("{}", resp.message);
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let status = client(config).status().await.map_err(explain)?;
    println!("coursedesk {} ({})", status.version, status.git_hash);
    println!("  pid:             {}", status.pid);
    println!("  uptime:          {}s", status.uptime_secs);
    println!("  control plane:   {}:{}", status.listen_addr, status.listen_port);
    println!("  chat channel:    {}", if status.channel_enabled { "enabled" } else { "disabled" });
    println!("  catalog seed:    {}", status.catalog_seed.as_deref().unwrap_or("(none)"));
    println!("  log level:       {}", status.log_level);
    println!("  sessions:        {}", status.sessions);
    println!("  search sessions: {}", status.search_sessions);
    Ok(())
}

async fn cmd_config(path: &Path, config: &AppConfig, show: bool, running: bool) -> Result<()> {
    if running {
        let resp = client(config).config().await.map_err(explain)?;
        println!("{}", resp.toml);
        return Ok(());
    }
    if show {
        let toml_str = toml::to_string_pretty(&config.redacted()).context("TOML error")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", path.display());
    }
    Ok(())
}

async fn cmd_send(
    config: &AppConfig,
    conversation: &str,
    sender: Option<&str>,
    input: Input,
) -> Result<()> {
    let reply = client(config)
        .interact(conversation, sender, input)
        .await
        .map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

fn cmd_decode(config: &AppConfig, token: &str) -> Result<()> {
    let codec = TokenCodec::new(config.tokens.max_bytes);
    let raw = codec.decode(token).context("token does not decode")?;
    match coursedesk_core::Action::from_raw(raw.clone()) {
        Ok(action) => println!("{action:#?}"),
        Err(e) => {
            warn!(error = %e, "Token decodes but does not form an action");
            println!("{raw:#?}");
        }
    }
    Ok(())
}

/// Load the config file, or defaults when it does not exist.
///
/// The flag tells whether the file was found; logging is not set up yet.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send_token() {
        let cli = Cli::try_parse_from([
            "coursedesk",
            "send",
            "--conversation",
            "c1",
            "--token",
            "inst_eng",
        ])
        .unwrap();
        match cli.command {
            Commands::Send {
                conversation,
                sender,
                token,
                text,
            } => {
                assert_eq!(conversation, "c1");
                assert_eq!(sender, None);
                assert!(token);
                assert_eq!(text, "inst_eng");
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli::try_parse_from(["coursedesk", "-vv", "status"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("coursedesk.toml"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_level_precedence() {
        assert_eq!(level_for(0, "warn"), "warn");
        assert_eq!(level_for(1, "warn"), "debug");
        assert_eq!(level_for(3, "warn"), "trace");
    }

    #[test]
    fn test_decode_rejects_unknown_verb() {
        let err = cmd_decode(&AppConfig::default(), "teleport_x").unwrap_err();
        assert!(err.to_string().contains("does not decode"));
    }

    #[tokio::test]
    async fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let (config, found) = load_config(&dir.path().join("absent.toml")).await.unwrap();
        assert!(!found);
        assert_eq!(config.daemon.listen_port, 9200);
    }

    #[tokio::test]
    async fn test_load_config_reports_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("coursedesk.toml");
        tokio::fs::write(&path, "[search]\npage_size = 0\n").await.unwrap();
        let err = load_config(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("page_size"));
    }
}
