use super::CatalogError;
use crate::config::CatalogConfig;
use crate::protocol::ClipItem;
use async_trait::async_trait;
use serde::Deserialize;

use super::CatalogAdapter;

/// Production `CatalogAdapter` backed by a YouTube Data API v3-shaped
/// playlist/video endpoint, grounded in `original_source`'s `YouTubeService`
/// (`playlistItems` lookup) and supplemented with the pagination and
/// embeddability probe `spec.md` §4.1 requires.
pub struct HttpCatalogAdapter {
    client: reqwest::Client,
    config: CatalogConfig,
}

impl HttpCatalogAdapter {
    #[must_use]
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn playlist_items_url(&self, playlist_id: &str, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{base}/playlistItems?part=snippet&maxResults={page_size}&playlistId={playlist_id}&key={key}",
            base = self.config.base_url,
            page_size = self.config.page_size,
            key = self.config.api_key,
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(token);
        }
        url
    }

    fn videos_status_url(&self, clip_id: &str) -> String {
        format!(
            "{base}/videos?part=status&id={clip_id}&key={key}",
            base = self.config.base_url,
            key = self.config.api_key,
        )
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    title: String,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    status: VideoStatus,
}

#[derive(Debug, Deserialize)]
struct VideoStatus {
    embeddable: bool,
}

#[async_trait]
impl CatalogAdapter for HttpCatalogAdapter {
    async fn list_playlist(&self, playlist_id: &str) -> Result<Vec<ClipItem>, CatalogError> {
        let mut clips = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.playlist_items_url(playlist_id, page_token.as_deref());
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|err| CatalogError::Upstream(err.to_string()))?;

            if !response.status().is_success() {
                return Err(CatalogError::Upstream(response.status().to_string()));
            }

            let page: PlaylistItemsResponse = response
                .json()
                .await
                .map_err(|err| CatalogError::Upstream(err.to_string()))?;

            clips.extend(page.items.into_iter().map(|item| ClipItem {
                id: item.snippet.resource_id.video_id,
                title: item.snippet.title,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        if clips.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(clips)
    }

    async fn is_embeddable(&self, clip_id: &str) -> Result<bool, CatalogError> {
        let url = self.videos_status_url(clip_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| CatalogError::Upstream(err.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Upstream(response.status().to_string()));
        }

        let body: VideosResponse = response
            .json()
            .await
            .map_err(|err| CatalogError::Upstream(err.to_string()))?;

        body.items
            .into_iter()
            .next()
            .map(|item| item.status.embeddable)
            .ok_or(CatalogError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> HttpCatalogAdapter {
        HttpCatalogAdapter::new(CatalogConfig {
            base_url: "https://catalog.example".to_string(),
            api_key: "KEY".to_string(),
            page_size: 50,
        })
    }

    #[test]
    fn playlist_items_url_includes_page_token_when_present() {
        let adapter = adapter();
        let url = adapter.playlist_items_url("PLX", Some("tok"));
        assert!(url.contains("playlistId=PLX"));
        assert!(url.contains("pageToken=tok"));
    }

    #[test]
    fn playlist_items_url_omits_page_token_on_first_page() {
        let adapter = adapter();
        let url = adapter.playlist_items_url("PLX", None);
        assert!(!url.contains("pageToken"));
    }

    #[test]
    fn videos_status_url_includes_clip_id() {
        let adapter = adapter();
        let url = adapter.videos_status_url("v1");
        assert!(url.contains("id=v1"));
        assert!(url.contains("/videos?"));
    }
}
