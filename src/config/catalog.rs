//! Catalog adapter configuration types.

use super::defaults::{default_catalog_base_url, default_catalog_page_size};
use serde::{Deserialize, Serialize};

/// Configuration for the `HttpCatalogAdapter`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CatalogConfig {
    /// Base URL of the media catalog API.
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    /// API key sent with every catalog request. Empty by default; deployments
    /// are expected to supply this via an environment override rather than a
    /// checked-in config file.
    #[serde(default)]
    pub api_key: String,
    /// Page size requested from the catalog's list endpoint.
    #[serde(default = "default_catalog_page_size")]
    pub page_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            api_key: String::new(),
            page_size: default_catalog_page_size(),
        }
    }
}
