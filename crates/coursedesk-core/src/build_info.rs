//! Build metadata baked in by `build.rs`.

use serde::{Deserialize, Serialize};

/// Short commit hash, suffixed with `-dirty` for uncommitted trees.
pub const GIT_HASH: &str = env!("COURSEDESK_GIT_HASH");

/// Seconds since the Unix epoch when the crate was compiled.
pub const BUILD_TIMESTAMP: &str = env!("COURSEDESK_BUILD_TIMESTAMP");

/// Cargo profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("COURSEDESK_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything known about this binary, in one serializable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_hash: String,
    pub profile: String,
    pub built_at: u64,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION.to_string(),
            git_hash: GIT_HASH.to_string(),
            profile: BUILD_PROFILE.to_string(),
            built_at: BUILD_TIMESTAMP.parse().unwrap_or(0),
        }
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.version, self.git_hash, self.profile)
    }
}

/// e.g. `"0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    BuildInfo::current().to_string()
}
