//! Server behavior configuration types.

use super::defaults::default_time_limit_secs;
use serde::{Deserialize, Serialize};

/// Server configuration for the room engine.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Answer window applied to every question (`TIME_LIMIT`), in seconds.
    ///
    /// An invalid or missing value falls back to the compiled default rather
    /// than failing config load, matching the room engine's own behavior
    /// when `TIME_LIMIT` cannot be parsed.
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
        }
    }
}
