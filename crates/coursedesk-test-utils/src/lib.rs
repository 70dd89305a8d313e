#![deny(unsafe_code)]

//! Shared test utilities for the coursedesk workspace.
//!
//! Provides a sample catalog, a call-counting catalog wrapper, config
//! builders and tracing helpers so that individual crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! coursedesk-test-utils = { workspace = true }
//! ```

pub mod catalog;
pub mod config;
pub mod daemon;
pub mod tracing_setup;

pub use catalog::{CountingCatalog, SAMPLE_CATALOG_TOML, sample_catalog};
pub use config::TestConfigBuilder;
pub use daemon::TestDaemon;
