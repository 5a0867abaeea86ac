use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::sources::PlaylistProvider;
use crate::types::{ApiEntity, PlaylistEntry};

const PLAYLIST_ITEMS_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems";
const PAGE_SIZE: &str = "50";

/// YouTube Data API v3 `playlistItems` listing
#[derive(Debug, Clone)]
pub struct YoutubeApi {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl YoutubeApi {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self { client, api_key: api_key.into(), endpoint: PLAYLIST_ITEMS_URL.to_string() }
    }

    async fn page(&self, playlist_id: &str, page_token: Option<&str>) -> Result<Value, SyncError> {
        let mut query = vec![
            ("part", "snippet,contentDetails,status"),
            ("maxResults", PAGE_SIZE),
            ("playlistId", playlist_id),
            ("key", self.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self.client.get(&self.endpoint).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Http(format!("HTTP {} from the YouTube API", response.status())));
        }
        Ok(response.json().await?)
    }
}

/// Entries of one `playlistItems` page and the token of the next one
fn parse_page(page: &Value) -> (Vec<PlaylistEntry>, Option<String>) {
    let entries = page
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match PlaylistEntry::parse(item) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("[YouTube] Skipping playlist item: {e}");
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    let next = page
        .get("nextPageToken")
        .and_then(Value::as_str)
        .map(str::to_string);
    (entries, next)
}

impl PlaylistProvider for YoutubeApi {
    async fn fetch(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>, SyncError> {
        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.page(playlist_id, token.as_deref()).await?;
            let (mut items, next) = parse_page(&page);
            debug!("[YouTube] Got {} items", items.len());
            entries.append(&mut items);
            match next {
                Some(t) => token = Some(t),
                None => break,
            }
        }
        info!("[YouTube] Playlist '{playlist_id}' has {} entries", entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page_and_token() {
        let page = json!({
            "nextPageToken": "CDIQAA",
            "items": [
                {"id": "1", "snippet": {"title": "a"}, "contentDetails": {"videoId": "aaa"}},
                {"id": "2", "snippet": {"title": "no id"}},
                {"id": "3", "snippet": {"title": "c", "resourceId": {"videoId": "ccc"}}}
            ]
        });
        let (entries, next) = parse_page(&page);
        assert_eq!(entries.iter().map(|e| e.video_id.as_str()).collect::<Vec<_>>(), vec!["aaa", "ccc"]);
        assert_eq!(next.as_deref(), Some("CDIQAA"));

        let (entries, next) = parse_page(&json!({"items": []}));
        assert!(entries.is_empty());
        assert_eq!(next, None);
    }
}
