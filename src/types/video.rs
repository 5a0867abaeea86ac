use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SyncError;

/// Lifecycle of a tracked video, stored as its integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    Downloaded = 0,
    Unavailable = 1,
    Private = 2,
    #[default]
    Unknown = 3,
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Status {
    type Error = SyncError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Downloaded),
            1 => Ok(Status::Unavailable),
            2 => Ok(Status::Private),
            3 => Ok(Status::Unknown),
            x => Err(SyncError::Parse(format!("invalid status code {x}"))),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Downloaded => "downloaded",
            Status::Unavailable => "unavailable",
            Status::Private => "private",
            Status::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// `(removed_segments_int, removed_segments_duration)` meaning "checked, nothing to cut"
pub const SEGMENTS_CHECKED_NONE: (i64, f64) = (-1, -1.0);

/// Everything known about one video. Every field but the id is optional:
/// a missing value means "unknown", never "false" or "empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoRecord {
    pub video_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_follower_count: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub try_lyrics_if_not: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_lyrics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_thumbnail: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_thumbnail: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recompute_tags: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recompute_album: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recompute_yt_info: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recompute_remix_of: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics_retries: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_segments_int: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_segments_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skips: Option<Vec<(f64, f64)>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syncedlyrics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syncedlyrics_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_subs: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remix_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remix_confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<f64>,
}

impl VideoRecord {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self { video_id: video_id.into(), ..Default::default() }
    }

    /// Fills every unknown field from `other`. Known values are never replaced or cleared.
    pub fn fill_from(&mut self, other: &VideoRecord) {
        macro_rules! fill {
            ($($field:ident),* $(,)?) => {
                $( if self.$field.is_none() { self.$field = other.$field.clone(); } )*
            };
        }
        fill!(
            title, description, thumbnail_url, channel_id, channel_url, uploader, uploader_id,
            uploader_url, upload_date, duration, duration_string, view_count, like_count,
            comment_count, channel_follower_count, filename, status, reason, try_lyrics_if_not,
            remove_lyrics, update_thumbnail, remove_thumbnail, recompute_tags, recompute_album,
            recompute_yt_info, recompute_remix_of, lyrics_retries, removed_segments_int,
            removed_segments_duration, skips, lyrics, subtitles, syncedlyrics, syncedlyrics_query,
            auto_subs, tags, remix_of, remix_confidence, date_added, date_modified,
        );
        if self.video_id.is_empty() {
            self.video_id = other.video_id.clone();
        }
    }

    /// Replaces descriptive fields with the ones `fresh` knows, keeping local state untouched
    pub fn refresh_descriptive(&mut self, fresh: &VideoRecord) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $( if fresh.$field.is_some() { self.$field = fresh.$field.clone(); } )*
            };
        }
        take!(
            title, description, thumbnail_url, channel_id, channel_url, uploader, uploader_id,
            uploader_url, upload_date, duration, duration_string, view_count, like_count,
            comment_count, channel_follower_count, subtitles, auto_subs,
        );
    }

    /// All the fields that make a record usable without asking the extractor again
    pub fn has_required_info(&self) -> bool {
        !self.video_id.is_empty()
            && self.title.is_some()
            && self.thumbnail_url.is_some()
            && self.channel_id.is_some()
            && self.channel_url.is_some()
            && self.duration.is_some()
            && self.uploader.is_some()
            && self.upload_date.is_some()
            && self.duration_string.is_some()
    }

    pub fn status_or_default(&self) -> Status {
        self.status.unwrap_or_default()
    }

    pub fn segments_state(&self) -> (i64, f64) {
        (
            self.removed_segments_int.unwrap_or(0),
            self.removed_segments_duration.unwrap_or(0.0),
        )
    }

    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn uploader_or_empty(&self) -> &str {
        self.uploader.as_deref().unwrap_or("")
    }

    /// Embedded-metadata JSON of this record, without the fields that change on every write
    pub fn comparable_json(&self) -> Result<Value, SyncError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("date_added");
            map.remove("date_modified");
            map.retain(|_, v| match v {
                Value::String(s) => !s.is_empty(),
                Value::Array(a) => !a.is_empty(),
                _ => true,
            });
        }
        Ok(value)
    }

    /// Patch turning `self` into `new` for every field `new` knows and `self` does not hold equal
    pub fn diff(&self, new: &VideoRecord) -> Result<VideoPatch, SyncError> {
        let old = record_map(self)?;
        let fresh = record_map(new)?;
        let mut patch = VideoPatch::default();
        for column in Column::ALL {
            if let Some(v) = fresh.get(column.as_str()) {
                if old.get(column.as_str()) != Some(v) {
                    patch.fields.push((*column, v.clone()));
                }
            }
        }
        // an empty relation reads back as unknown, so the two compare equal
        if let Some(skips) = &new.skips {
            if skips.as_slice() != self.skips.as_deref().unwrap_or(&[]) {
                patch.skips = Some(skips.clone());
            }
        }
        if let Some(tags) = &new.tags {
            if tags.as_slice() != self.tags.as_deref().unwrap_or(&[]) {
                patch.tags = Some(tags.clone());
            }
        }
        Ok(patch)
    }

    /// Patch carrying every known field of this record
    pub fn to_patch(&self) -> Result<VideoPatch, SyncError> {
        VideoRecord::new(self.video_id.clone()).diff(self)
    }
}

fn record_map(record: &VideoRecord) -> Result<Map<String, Value>, SyncError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Err(SyncError::Parse("video record did not serialize to an object".to_string())),
    }
}

/// Storage class of a `videos` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Flag,
}

/// Scalar columns of the `videos` table (everything but the key and the relations)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Title,
    Description,
    ThumbnailUrl,
    ChannelId,
    ChannelUrl,
    Uploader,
    UploaderId,
    UploaderUrl,
    UploadDate,
    Duration,
    DurationString,
    ViewCount,
    LikeCount,
    CommentCount,
    ChannelFollowerCount,
    Filename,
    Status,
    Reason,
    TryLyricsIfNot,
    RemoveLyrics,
    UpdateThumbnail,
    RemoveThumbnail,
    RecomputeTags,
    RecomputeAlbum,
    RecomputeYtInfo,
    RecomputeRemixOf,
    LyricsRetries,
    RemovedSegmentsInt,
    RemovedSegmentsDuration,
    Lyrics,
    Subtitles,
    Syncedlyrics,
    SyncedlyricsQuery,
    AutoSubs,
    RemixOf,
    RemixConfidence,
    DateAdded,
    DateModified,
}

impl Column {
    pub const ALL: &'static [Column] = &[
        Column::Title,
        Column::Description,
        Column::ThumbnailUrl,
        Column::ChannelId,
        Column::ChannelUrl,
        Column::Uploader,
        Column::UploaderId,
        Column::UploaderUrl,
        Column::UploadDate,
        Column::Duration,
        Column::DurationString,
        Column::ViewCount,
        Column::LikeCount,
        Column::CommentCount,
        Column::ChannelFollowerCount,
        Column::Filename,
        Column::Status,
        Column::Reason,
        Column::TryLyricsIfNot,
        Column::RemoveLyrics,
        Column::UpdateThumbnail,
        Column::RemoveThumbnail,
        Column::RecomputeTags,
        Column::RecomputeAlbum,
        Column::RecomputeYtInfo,
        Column::RecomputeRemixOf,
        Column::LyricsRetries,
        Column::RemovedSegmentsInt,
        Column::RemovedSegmentsDuration,
        Column::Lyrics,
        Column::Subtitles,
        Column::Syncedlyrics,
        Column::SyncedlyricsQuery,
        Column::AutoSubs,
        Column::RemixOf,
        Column::RemixConfidence,
        Column::DateAdded,
        Column::DateModified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Title => "title",
            Column::Description => "description",
            Column::ThumbnailUrl => "thumbnail_url",
            Column::ChannelId => "channel_id",
            Column::ChannelUrl => "channel_url",
            Column::Uploader => "uploader",
            Column::UploaderId => "uploader_id",
            Column::UploaderUrl => "uploader_url",
            Column::UploadDate => "upload_date",
            Column::Duration => "duration",
            Column::DurationString => "duration_string",
            Column::ViewCount => "view_count",
            Column::LikeCount => "like_count",
            Column::CommentCount => "comment_count",
            Column::ChannelFollowerCount => "channel_follower_count",
            Column::Filename => "filename",
            Column::Status => "status",
            Column::Reason => "reason",
            Column::TryLyricsIfNot => "try_lyrics_if_not",
            Column::RemoveLyrics => "remove_lyrics",
            Column::UpdateThumbnail => "update_thumbnail",
            Column::RemoveThumbnail => "remove_thumbnail",
            Column::RecomputeTags => "recompute_tags",
            Column::RecomputeAlbum => "recompute_album",
            Column::RecomputeYtInfo => "recompute_yt_info",
            Column::RecomputeRemixOf => "recompute_remix_of",
            Column::LyricsRetries => "lyrics_retries",
            Column::RemovedSegmentsInt => "removed_segments_int",
            Column::RemovedSegmentsDuration => "removed_segments_duration",
            Column::Lyrics => "lyrics",
            Column::Subtitles => "subtitles",
            Column::Syncedlyrics => "syncedlyrics",
            Column::SyncedlyricsQuery => "syncedlyrics_query",
            Column::AutoSubs => "auto_subs",
            Column::RemixOf => "remix_of",
            Column::RemixConfidence => "remix_confidence",
            Column::DateAdded => "date_added",
            Column::DateModified => "date_modified",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Duration
            | Column::RemovedSegmentsDuration
            | Column::RemixConfidence
            | Column::DateAdded
            | Column::DateModified => ColumnKind::Real,
            Column::ViewCount
            | Column::LikeCount
            | Column::CommentCount
            | Column::ChannelFollowerCount
            | Column::Status
            | Column::LyricsRetries
            | Column::RemovedSegmentsInt => ColumnKind::Integer,
            Column::TryLyricsIfNot
            | Column::RemoveLyrics
            | Column::UpdateThumbnail
            | Column::RemoveThumbnail
            | Column::RecomputeTags
            | Column::RecomputeAlbum
            | Column::RecomputeYtInfo
            | Column::RecomputeRemixOf => ColumnKind::Flag,
            _ => ColumnKind::Text,
        }
    }

    /// The store stamps these itself
    pub fn is_protected(&self) -> bool {
        matches!(self, Column::DateAdded | Column::DateModified)
    }
}

/// Partial update of one video: only the listed columns change.
/// `skips` / `tags`, when set, replace the whole relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoPatch {
    pub fields: Vec<(Column, Value)>,
    pub skips: Option<Vec<(f64, f64)>>,
    pub tags: Option<Vec<String>>,
}

impl VideoPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: Column, value: impl Into<Value>) -> Self {
        self.put(column, value);
        self
    }

    /// Same as `set`, for patches built up across branches
    pub fn put(&mut self, column: Column, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn status(self, status: Status) -> Self {
        self.set(Column::Status, u8::from(status))
    }

    pub fn with_skips(mut self, skips: Vec<(f64, f64)>) -> Self {
        self.skips = Some(skips);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn get(&self, column: Column) -> Option<&Value> {
        self.fields.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.skips.is_none() && self.tags.is_none()
    }

    /// Keeps only what actually differs from `current`. Explicit nulls survive when they clear a known value,
    /// explicit empty relations when they clear a non-empty one.
    pub fn minus(self, current: &VideoRecord) -> Result<VideoPatch, SyncError> {
        let mut applied = current.clone();
        self.apply_to(&mut applied)?;
        let mut reduced = current.diff(&applied)?;

        let known = record_map(current)?;
        for (column, value) in &self.fields {
            if value.is_null() && !column.is_protected() && known.contains_key(column.as_str()) {
                reduced.put(*column, Value::Null);
            }
        }
        if let Some(skips) = self.skips {
            if skips.as_slice() != current.skips.as_deref().unwrap_or(&[]) {
                reduced.skips = Some(skips);
            }
        }
        if let Some(tags) = self.tags {
            if tags.as_slice() != current.tags.as_deref().unwrap_or(&[]) {
                reduced.tags = Some(tags);
            }
        }
        Ok(reduced)
    }

    /// Applies the patch to an in-memory record, the way the store would
    pub fn apply_to(&self, record: &mut VideoRecord) -> Result<(), SyncError> {
        let mut map = record_map(record)?;
        for (column, value) in &self.fields {
            if column.is_protected() {
                continue;
            }
            if value.is_null() {
                map.remove(column.as_str());
            } else {
                map.insert(column.as_str().to_string(), value.clone());
            }
        }
        let mut updated: VideoRecord = serde_json::from_value(Value::Object(map))?;
        // empty relations read back from the store as unknown
        if let Some(skips) = &self.skips {
            updated.skips = Some(skips.clone()).filter(|s| !s.is_empty());
        }
        if let Some(tags) = &self.tags {
            updated.tags = Some(tags.clone()).filter(|t| !t.is_empty());
        }
        *record = updated;
        Ok(())
    }
}
