//! Catalog Adapter (`spec.md` §4.1): resolves a playlist identifier into an
//! ordered list of clips and probes individual clips for embeddability.
//!
//! Pure request/response, no state of its own — the room engine owns the
//! materialized clip pool (`spec.md` §3's `remaining`).

mod http;

pub use http::HttpCatalogAdapter;

use crate::protocol::ClipItem;
use async_trait::async_trait;
use thiserror::Error;

/// Errors the catalog adapter can surface. `spec.md` §4.1 and §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog upstream error: {0}")]
    Upstream(String),
    #[error("playlist has no items")]
    Empty,
    #[error("item not found in catalog")]
    NotFound,
}

/// Enumerates and filters an external clip catalog.
///
/// Implementations must be `Send + Sync` and safe for concurrent use without
/// interior mutability beyond a shared HTTP client — the adapter is invoked
/// from the room engine while holding no room lock (`spec.md` §5).
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Return all items in catalog order, following continuation tokens
    /// until the upstream is exhausted.
    async fn list_playlist(&self, playlist_id: &str) -> Result<Vec<ClipItem>, CatalogError>;

    /// Return whether the catalog reports `clip_id` as embeddable.
    async fn is_embeddable(&self, clip_id: &str) -> Result<bool, CatalogError>;
}
