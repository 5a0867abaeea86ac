use serde::Deserialize;
use tracing::debug;

use crate::errors::SyncError;
use crate::sources::LyricsSearch;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibHit {
    #[serde(default)]
    track_name: Option<String>,
    #[serde(default)]
    artist_name: Option<String>,
    #[serde(default)]
    synced_lyrics: Option<String>,
    #[serde(default)]
    plain_lyrics: Option<String>,
}

/// LRCLIB search endpoint
#[derive(Debug, Clone)]
pub struct Lrclib {
    client: reqwest::Client,
    endpoint: String,
}

impl Lrclib {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }
}

fn non_blank(text: &Option<String>) -> Option<&String> {
    text.as_ref().filter(|t| !t.trim().is_empty())
}

/// First synchronized lyrics among the hits, else the first plain ones
fn pick_lyrics(hits: &[LrclibHit]) -> Option<String> {
    let synced = hits.iter().find_map(|h| non_blank(&h.synced_lyrics).map(|l| (h, l)));
    let chosen = synced.or_else(|| hits.iter().find_map(|h| non_blank(&h.plain_lyrics).map(|l| (h, l))));
    chosen.map(|(hit, lyrics)| {
        debug!(
            "[LRCLIB] Picked '{}' by '{}'",
            hit.track_name.as_deref().unwrap_or("?"),
            hit.artist_name.as_deref().unwrap_or("?")
        );
        lyrics.clone()
    })
}

impl LyricsSearch for Lrclib {
    async fn search(&self, query: &str) -> Result<Option<String>, SyncError> {
        if query.trim().is_empty() {
            return Ok(None);
        }
        let response = self.client.get(&self.endpoint).query(&[("q", query)]).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Http(format!("HTTP {} from LRCLIB", response.status())));
        }
        let hits: Vec<LrclibHit> = serde_json::from_str(&response.text().await?)?;
        Ok(pick_lyrics(&hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_synced_lyrics() {
        let hits: Vec<LrclibHit> = serde_json::from_str(
            r#"[
                {"trackName": "Halo", "artistName": "A", "plainLyrics": "plain", "syncedLyrics": null},
                {"trackName": "Halo", "artistName": "B", "plainLyrics": "p2", "syncedLyrics": "[00:01.00]synced"}
            ]"#,
        )
        .unwrap();
        assert_eq!(pick_lyrics(&hits).as_deref(), Some("[00:01.00]synced"));
    }

    #[test]
    fn test_plain_when_nothing_synced() {
        let hits: Vec<LrclibHit> =
            serde_json::from_str(r#"[{"trackName": "x", "plainLyrics": "  "}, {"plainLyrics": "words"}]"#).unwrap();
        assert_eq!(pick_lyrics(&hits).as_deref(), Some("words"));
        assert_eq!(pick_lyrics(&[]), None);
    }
}
