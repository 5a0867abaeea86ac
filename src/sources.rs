//! Collaborators the sync talks to: video extractor, playlist API, sponsor segments,
//! lyrics search, thumbnails, the audio cutter and the MP3 tag codec.
//!
//! The network-facing ones are async traits used through generics; the local
//! ones are plain object-safe traits.

use std::path::{Path, PathBuf};

use crate::errors::SyncError;
use crate::types::{PlaylistEntry, VideoRecord};

pub mod ffmpeg;
pub mod id3_codec;
pub mod lrclib;
pub mod manifest;
pub mod sponsorblock;
pub mod thumbnail;
pub mod youtube;
pub mod ytdlp;

/// Outcome of asking the extractor about one video
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Ok(VideoRecord),
    /// The video exists but is private
    Private(String),
    /// Removed, region-locked, copyright claimed...
    Blocked(String),
    /// Anything the extractor could not explain
    Unknown(String),
}

#[allow(async_fn_in_trait)]
pub trait VideoSource {
    async fn extract(&self, video_id: &str) -> Extraction;

    /// Downloads the audio of `video_id` to `<dir>/<stem>.mp3` and returns that path
    async fn download(&self, video_id: &str, dir: &Path, stem: &str) -> Result<PathBuf, SyncError>;
}

#[allow(async_fn_in_trait)]
pub trait PlaylistProvider {
    /// Every item of the playlist, following pagination
    async fn fetch(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>, SyncError>;
}

#[allow(async_fn_in_trait)]
pub trait SegmentLookup {
    /// Segments to cut for `video_id`. An unknown video is an empty list, not an error.
    async fn segments(&self, video_id: &str, categories: &[String]) -> Result<Vec<(f64, f64)>, SyncError>;
}

#[allow(async_fn_in_trait)]
pub trait LyricsSearch {
    /// Best lyrics for a free-text query, synchronized ones preferred
    async fn search(&self, query: &str) -> Result<Option<String>, SyncError>;
}

#[allow(async_fn_in_trait)]
pub trait ThumbnailSource {
    /// Raw image bytes behind `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError>;
}

pub trait AudioCutter {
    /// Length of the audio file in seconds
    fn duration(&self, path: &Path) -> Result<f64, SyncError>;

    /// Writes `input` without `segments` to `output`. Returns the removed duration.
    fn cut(&self, input: &Path, output: &Path, segments: &[(f64, f64)]) -> Result<f64, SyncError>;
}

/// Frames this tool reads from / writes to an MP3
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioTags {
    /// JSON blob of the `TXXX:metadata` frame
    pub metadata: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Recording date, `YYYY-MM-DD`
    pub date: Option<String>,
    pub has_cover: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverChange {
    /// PNG bytes to embed as front cover
    Set(Vec<u8>),
    Remove,
}

/// Frames to change; `None` leaves a frame as it is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagUpdate {
    pub metadata: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub date: Option<String>,
    pub cover: Option<CoverChange>,
}

impl TagUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TagUpdate::default()
    }
}

pub trait TagCodec {
    /// Tags of `path`; a file without any tag reads as the default
    fn read(&self, path: &Path) -> Result<AudioTags, SyncError>;

    fn write(&self, path: &Path, update: &TagUpdate) -> Result<(), SyncError>;

    /// Embedded front cover, as stored
    fn cover(&self, path: &Path) -> Result<Option<Vec<u8>>, SyncError>;
}

/// Everything the per-video pipeline needs from the outside world
pub struct Services<V, S, L, T> {
    pub videos: V,
    pub segments: S,
    pub lyrics: L,
    pub thumbnails: T,
    pub cutter: Box<dyn AudioCutter>,
    pub codec: Box<dyn TagCodec>,
}

/// Shared HTTP client for the web collaborators
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, SyncError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
