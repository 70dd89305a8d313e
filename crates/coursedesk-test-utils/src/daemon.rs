//! Daemon test helpers.
//!
//! A [`TestDaemon`] owns a temporary directory holding its config file and,
//! optionally, a catalog seed. The directory is removed on drop.

use std::path::PathBuf;

use coursedesk_config::AppConfig;
use coursedesk_core::Daemon;
use tempfile::TempDir;

use crate::catalog::SAMPLE_CATALOG_TOML;

pub struct TestDaemon {
    pub daemon: Daemon,
    pub config_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestDaemon {
    /// Create a daemon from the given config TOML.
    ///
    /// When `seed` is given it is written next to the config and
    /// `catalog.seed_path` is pointed at it.
    pub async fn with_toml(toml_content: &str, seed: Option<&str>) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("coursedesk.toml");

        let mut content = toml_content.to_string();
        if let Some(seed) = seed {
            let seed_path = temp_dir.path().join("catalog.toml");
            tokio::fs::write(&seed_path, seed)
                .await
                .expect("failed to write test seed");
            content.push_str(&format!(
                "\n[catalog]\nseed_path = {:?}\n",
                seed_path.display().to_string()
            ));
        }
        tokio::fs::write(&config_path, &content)
            .await
            .expect("failed to write test config");

        let config = AppConfig::load(&config_path)
            .await
            .expect("failed to parse test config");
        let daemon = Daemon::from_config(config)
            .await
            .expect("failed to start test daemon");

        Self {
            daemon,
            config_path,
            _temp_dir: temp_dir,
        }
    }

    /// A daemon with default config serving the sample catalog.
    pub async fn sample() -> Self {
        Self::with_toml("", Some(SAMPLE_CATALOG_TOML)).await
    }
}
