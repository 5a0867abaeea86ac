use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::SyncError;
use crate::sources::{Extraction, VideoSource};
use crate::types::VideoRecord;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Extracts and downloads videos through the yt-dlp binary
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    client: reqwest::Client,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, client: reqwest::Client) -> Self {
        Self { binary: binary.into(), client }
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("[yt-dlp] HTTP {} for subtitles", r.status());
                return None;
            }
            Err(e) => {
                debug!("[yt-dlp] Could not fetch subtitles: {e}");
                return None;
            }
        };
        response.text().await.ok().filter(|t| !t.trim().is_empty())
    }
}

fn str_field(info: &Value, key: &str) -> Option<String> {
    info.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn int_field(info: &Value, key: &str) -> Option<i64> {
    info.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)))
}

/// Descriptive fields of a `yt-dlp -J` document
pub fn record_from_info(video_id: &str, info: &Value) -> VideoRecord {
    let mut record = VideoRecord::new(video_id);
    record.title = str_field(info, "title");
    record.description = str_field(info, "description");
    record.thumbnail_url = str_field(info, "thumbnail");
    record.channel_id = str_field(info, "channel_id");
    record.channel_url = str_field(info, "channel_url");
    record.uploader = str_field(info, "uploader").or_else(|| str_field(info, "channel"));
    record.uploader_id = str_field(info, "uploader_id");
    record.uploader_url = str_field(info, "uploader_url");
    record.upload_date = str_field(info, "upload_date");
    record.duration = info.get("duration").and_then(Value::as_f64);
    record.duration_string = str_field(info, "duration_string");
    record.view_count = int_field(info, "view_count");
    record.like_count = int_field(info, "like_count");
    record.comment_count = int_field(info, "comment_count");
    record.channel_follower_count = int_field(info, "channel_follower_count");
    record
}

/// URL of the best subtitle track in a `subtitles` / `automatic_captions` map.
/// English first, WebVTT preferred.
pub fn subtitle_url(tracks: Option<&Value>) -> Option<String> {
    let tracks = tracks?.as_object()?;
    let mut langs: Vec<&String> = tracks.keys().collect();
    let is_english = |lang: &str| lang == "en" || lang.starts_with("en-");
    langs.sort_by(|a, b| is_english(b).cmp(&is_english(a)).then(a.cmp(b)));

    langs.into_iter().find_map(|lang| {
        let formats = tracks.get(lang)?.as_array()?;
        formats
            .iter()
            .find(|f| f.get("ext").and_then(Value::as_str) == Some("vtt"))
            .or_else(|| formats.first())
            .and_then(|f| f.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

/// Maps a yt-dlp error message onto an extraction outcome
pub fn classify_failure(stderr: &str) -> Extraction {
    let lower = stderr.to_lowercase();
    let reason = stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .unwrap_or(stderr)
        .trim()
        .to_string();

    if lower.contains("private video") {
        Extraction::Private(reason)
    } else if [
        "video unavailable",
        "has been removed",
        "copyright",
        "not available in your country",
        "blocked",
        "account associated with this video has been terminated",
        "sign in to confirm your age",
    ]
    .iter()
    .any(|marker| lower.contains(marker))
    {
        Extraction::Blocked(reason)
    } else {
        Extraction::Unknown(reason)
    }
}

impl VideoSource for YtDlp {
    async fn extract(&self, video_id: &str) -> Extraction {
        let url = format!("{WATCH_URL}{video_id}");
        let output = match Command::new(&self.binary)
            .args(["-J", "--no-playlist", "--no-warnings", &url])
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) => return Extraction::Unknown(format!("Failed to execute yt-dlp: {e}")),
        };

        if !output.status.success() {
            return classify_failure(&String::from_utf8_lossy(&output.stderr));
        }

        let info: Value = match serde_json::from_slice(&output.stdout) {
            Ok(v) => v,
            Err(e) => return Extraction::Unknown(format!("Unreadable yt-dlp output: {e}")),
        };

        let mut record = record_from_info(video_id, &info);
        if let Some(url) = subtitle_url(info.get("subtitles")) {
            record.subtitles = self.fetch_text(&url).await;
        }
        if let Some(url) = subtitle_url(info.get("automatic_captions")) {
            record.auto_subs = self.fetch_text(&url).await;
        }
        Extraction::Ok(record)
    }

    async fn download(&self, video_id: &str, dir: &Path, stem: &str) -> Result<PathBuf, SyncError> {
        let template = dir.join(format!("{stem}.%(ext)s"));
        let template = template
            .to_str()
            .ok_or_else(|| SyncError::Extraction(format!("Invalid output path for '{stem}'")))?;
        let url = format!("{WATCH_URL}{video_id}");

        let output = Command::new(&self.binary)
            .args([
                "-x",
                "--audio-format", "mp3",
                "--audio-quality", "0",
                "--no-playlist",
                "--no-warnings",
                "-o", template,
                &url,
            ])
            .output()
            .await
            .map_err(|e| SyncError::Extraction(format!("Failed to execute yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("[yt-dlp] Download of '{video_id}' failed: {}", stderr.trim());
            return Err(SyncError::Extraction(stderr.trim().to_string()));
        }

        let path = dir.join(format!("{stem}.mp3"));
        if !path.is_file() {
            return Err(SyncError::Extraction(format!("yt-dlp did not produce '{}'", path.display())));
        }
        Ok(path)
    }
}
