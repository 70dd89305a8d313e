//! Configuration builders for tests.

use coursedesk_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .page_size(2)
///     .admin("ops")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.daemon.listen_port = port;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn seed_path(mut self, path: &str) -> Self {
        self.config.catalog.seed_path = Some(path.to_string());
        self
    }

    pub fn min_keyword_len(mut self, n: usize) -> Self {
        self.config.search.min_keyword_len = n;
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.config.search.page_size = n;
        self
    }

    pub fn max_results(mut self, n: usize) -> Self {
        self.config.search.max_results = n;
        self
    }

    pub fn token_max_bytes(mut self, n: usize) -> Self {
        self.config.tokens.max_bytes = n;
        self
    }

    pub fn years(mut self, years: u8) -> Self {
        self.config.navigation.years = years;
        self
    }

    pub fn max_favorites(mut self, n: usize) -> Self {
        self.config.library.max_favorites = n;
        self
    }

    pub fn max_history(mut self, n: usize) -> Self {
        self.config.library.max_history = n;
        self
    }

    pub fn library_page_size(mut self, n: usize) -> Self {
        self.config.library.page_size = n;
        self
    }

    /// Add `id` to `access.admin_ids`.
    pub fn admin(mut self, id: &str) -> Self {
        self.config.access.admin_ids.push(id.to_string());
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
