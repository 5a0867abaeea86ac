use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::SyncError;

use super::video::VideoRecord;

/// Object parsed from a remote API payload and written back in the same shape
pub trait ApiEntity: Sized {
    fn parse(value: &Value) -> Result<Self, SyncError>;
    fn serialize(&self) -> Value;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u64>,
    pub height: Option<u64>,
}

/// One item of the remote playlist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistEntry {
    pub playlist_item_id: String,
    pub video_id: String,
    pub playlist_id: Option<String>,
    pub position: Option<u64>,
    pub published_at: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Keyed by size name ("default", "high", "maxres", ...)
    pub thumbnails: Vec<(String, Thumbnail)>,
    pub video_owner_channel_title: Option<String>,
    pub video_owner_channel_id: Option<String>,
    pub privacy_status: Option<String>,
    pub video_published_at: Option<String>,
    pub note: Option<String>,
}

const THUMBNAIL_PREFERENCE: [&str; 5] = ["maxres", "standard", "high", "medium", "default"];

fn str_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl PlaylistEntry {
    /// Largest thumbnail the API offered
    pub fn best_thumbnail(&self) -> Option<&str> {
        THUMBNAIL_PREFERENCE
            .iter()
            .find_map(|name| self.thumbnails.iter().find(|(n, _)| n == name))
            .or_else(|| self.thumbnails.first())
            .map(|(_, t)| t.url.as_str())
    }

    /// Identity and descriptive fields only; processing flags are never seeded from the playlist
    pub fn to_record(&self) -> VideoRecord {
        let mut record = VideoRecord::new(self.video_id.clone());
        record.title = self.title.clone();
        record.description = self.description.clone();
        record.uploader = self.video_owner_channel_title.clone();
        record.channel_id = self.video_owner_channel_id.clone();
        record.channel_url = self
            .video_owner_channel_id
            .as_ref()
            .map(|id| format!("https://www.youtube.com/channel/{id}"));
        record.thumbnail_url = self.best_thumbnail().map(str::to_string);
        record
    }
}

impl ApiEntity for PlaylistEntry {
    fn parse(value: &Value) -> Result<Self, SyncError> {
        let video_id = str_at(value, "/contentDetails/videoId")
            .or_else(|| str_at(value, "/snippet/resourceId/videoId"))
            .ok_or_else(|| SyncError::Parse("playlist item without a video id".to_string()))?;

        let thumbnails = value
            .pointer("/snippet/thumbnails")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(name, t)| {
                        serde_json::from_value::<Thumbnail>(t.clone())
                            .ok()
                            .map(|t| (name.clone(), t))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            playlist_item_id: str_at(value, "/id").unwrap_or_default(),
            video_id,
            playlist_id: str_at(value, "/snippet/playlistId"),
            position: value.pointer("/snippet/position").and_then(Value::as_u64),
            published_at: str_at(value, "/snippet/publishedAt"),
            title: str_at(value, "/snippet/title"),
            description: str_at(value, "/snippet/description"),
            thumbnails,
            video_owner_channel_title: str_at(value, "/snippet/videoOwnerChannelTitle"),
            video_owner_channel_id: str_at(value, "/snippet/videoOwnerChannelId"),
            privacy_status: str_at(value, "/status/privacyStatus"),
            video_published_at: str_at(value, "/contentDetails/videoPublishedAt"),
            note: str_at(value, "/contentDetails/note"),
        })
    }

    fn serialize(&self) -> Value {
        let thumbnails: serde_json::Map<String, Value> = self
            .thumbnails
            .iter()
            .map(|(name, t)| (name.clone(), json!(t)))
            .collect();
        json!({
            "kind": "youtube#playlistItem",
            "id": self.playlist_item_id,
            "snippet": {
                "playlistId": self.playlist_id,
                "position": self.position,
                "publishedAt": self.published_at,
                "title": self.title,
                "description": self.description,
                "thumbnails": thumbnails,
                "videoOwnerChannelTitle": self.video_owner_channel_title,
                "videoOwnerChannelId": self.video_owner_channel_id,
                "resourceId": { "kind": "youtube#video", "videoId": self.video_id },
            },
            "contentDetails": {
                "videoId": self.video_id,
                "videoPublishedAt": self.video_published_at,
                "note": self.note,
            },
            "status": { "privacyStatus": self.privacy_status },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Value {
        json!({
            "kind": "youtube#playlistItem",
            "id": "UExpdGVt",
            "snippet": {
                "playlistId": "PL123",
                "position": 4,
                "title": "Halo",
                "description": "",
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/vi/abc/default.jpg", "width": 120, "height": 90},
                    "high": {"url": "https://i.ytimg.com/vi/abc/hqdefault.jpg", "width": 480, "height": 360}
                },
                "videoOwnerChannelTitle": "Beyonce",
                "videoOwnerChannelId": "UCxyz",
                "resourceId": {"kind": "youtube#video", "videoId": "abc"}
            },
            "contentDetails": {"videoId": "abc", "videoPublishedAt": "2009-10-09T00:00:00Z"},
            "status": {"privacyStatus": "public"}
        })
    }

    #[test]
    fn test_parse_playlist_item() {
        let entry = PlaylistEntry::parse(&item()).unwrap();
        assert_eq!(entry.video_id, "abc");
        assert_eq!(entry.position, Some(4));
        assert_eq!(entry.description, None);
        assert_eq!(entry.best_thumbnail(), Some("https://i.ytimg.com/vi/abc/hqdefault.jpg"));
        assert_eq!(entry.privacy_status.as_deref(), Some("public"));
    }

    #[test]
    fn test_serialize_parses_back() {
        let entry = PlaylistEntry::parse(&item()).unwrap();
        assert_eq!(PlaylistEntry::parse(&entry.serialize()).unwrap(), entry);
    }

    #[test]
    fn test_missing_video_id_is_error() {
        assert!(PlaylistEntry::parse(&json!({"snippet": {"title": "x"}})).is_err());
    }

    #[test]
    fn test_seed_record_has_no_flags() {
        let record = PlaylistEntry::parse(&item()).unwrap().to_record();
        assert_eq!(record.uploader.as_deref(), Some("Beyonce"));
        assert_eq!(record.channel_url.as_deref(), Some("https://www.youtube.com/channel/UCxyz"));
        assert_eq!(record.status, None);
        assert_eq!(record.try_lyrics_if_not, None);
    }
}
