//! Default value functions for configuration fields.
//!
//! This module contains all the default value functions used by serde's `#[serde(default = ...)]`
//! attributes throughout the configuration system.

use super::logging::LogFormat;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    8080
}

pub fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:5173".to_string()
}

// =============================================================================
// Server Defaults
// =============================================================================

/// Default answer window (`TIME_LIMIT`), in seconds.
pub const fn default_time_limit_secs() -> u64 {
    10
}

// =============================================================================
// Catalog Defaults
// =============================================================================

pub fn default_catalog_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

pub const fn default_catalog_page_size() -> u32 {
    50
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
