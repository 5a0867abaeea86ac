use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use crate::errors::SyncError;

// ========== Paths ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Directory holding the mp3 library (and its .lrc / .png sidecars)
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,

    /// SQLite database file. Defaults to ~/.plsync/data.db3 when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Directory containing the PATTERNS/ and TAGS/ folders
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// JSON manifest of the playlist entries
    #[serde(default = "default_playlist_videos_file")]
    pub playlist_videos_file: PathBuf,

    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
}

fn default_download_path() -> PathBuf {
    PathBuf::from("music")
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("CONFIG")
}

fn default_playlist_videos_file() -> PathBuf {
    PathBuf::from("JSON/playlist_videos.json")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("LOGS")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_path: default_download_path(),
            db_path: None,
            config_dir: default_config_dir(),
            playlist_videos_file: default_playlist_videos_file(),
            logs_dir: default_logs_dir(),
        }
    }
}

impl PathsConfig {
    pub fn patterns_dir(&self) -> PathBuf {
        self.config_dir.join("PATTERNS")
    }

    pub fn tags_dir(&self) -> PathBuf {
        self.config_dir.join("TAGS")
    }

    /// Download directory with a leading `~` expanded
    pub fn library_dir(&self) -> PathBuf {
        expand_home(&self.download_path)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var("HOME")) {
        (Ok(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

// ========== Pattern files ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternsConfig {
    #[serde(default = "default_unwanted")]
    pub unwanted_patterns_file: String,

    #[serde(default = "default_remix")]
    pub remix_patterns_file: String,

    #[serde(default = "default_private")]
    pub private_patterns_file: String,

    #[serde(default = "default_trusted")]
    pub trusted_artists_file: String,
}

fn default_unwanted() -> String {
    "unwanted_patterns.txt".to_string()
}

fn default_remix() -> String {
    "remix_patterns.txt".to_string()
}

fn default_private() -> String {
    "private_patterns.txt".to_string()
}

fn default_trusted() -> String {
    "trusted_artists.txt".to_string()
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            unwanted_patterns_file: default_unwanted(),
            remix_patterns_file: default_remix(),
            private_patterns_file: default_private(),
            trusted_artists_file: default_trusted(),
        }
    }
}

// ========== Processing ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    Pad,
    Crop,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default)]
    pub playlist_id: Option<String>,

    #[serde(default = "default_max_lyrics_retries")]
    pub max_lyrics_retries: i64,

    #[serde(default = "default_true")]
    pub use_sponsorblock: bool,
    #[serde(default = "default_true")]
    pub get_lyrics: bool,
    #[serde(default = "default_true")]
    pub get_thumbnail: bool,
    #[serde(default = "default_true")]
    pub add_tags: bool,
    #[serde(default = "default_true")]
    pub add_album: bool,
    #[serde(default = "default_true")]
    pub embed_metadata: bool,
    #[serde(default = "default_true")]
    pub get_remix_of: bool,

    #[serde(default)]
    pub force_recompute_lyrics: bool,
    #[serde(default)]
    pub force_recompute_thumbnails: bool,
    #[serde(default)]
    pub force_recompute_tags: bool,
    #[serde(default)]
    pub force_recompute_album: bool,
    #[serde(default)]
    pub force_recompute_yt_info: bool,
    #[serde(default)]
    pub force_recompute_remix_of: bool,

    #[serde(default = "default_sponsorblock_categories")]
    pub sponsorblock_categories: Vec<String>,

    #[serde(default = "default_thumbnail_format")]
    pub thumbnail_format: ThumbnailFormat,

    /// Separator between the artist and the tag block ("Artist ~ [a,b]")
    #[serde(default = "default_tag_separator")]
    pub tag_separator: String,
    #[serde(default = "default_tag_start")]
    pub tag_start_delimiter: String,
    #[serde(default = "default_tag_end")]
    pub tag_end_delimiter: String,
    #[serde(default = "default_tag_inner")]
    pub tag_inner_separator: String,

    #[serde(default)]
    pub retry_unavailable: bool,
    #[serde(default)]
    pub retry_private: bool,

    #[serde(default = "default_true")]
    pub force_mp3_presence: bool,

    /// Run every decision but never commit to the database or touch the disk
    #[serde(default)]
    pub test_run: bool,

    #[serde(default)]
    pub remove_no_longer_in_playlist: bool,
    #[serde(default)]
    pub remove_malformatted: bool,
    #[serde(default)]
    pub add_folder_files_not_in_list: bool,

    #[serde(default = "default_remix_threshold")]
    pub remix_confidence_threshold: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_lyrics_retries() -> i64 {
    3
}

fn default_sponsorblock_categories() -> Vec<String> {
    ["music_offtopic", "sponsor", "intro", "outro"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_thumbnail_format() -> ThumbnailFormat {
    ThumbnailFormat::Pad
}

fn default_tag_separator() -> String {
    " ~ ".to_string()
}

fn default_tag_start() -> String {
    "[".to_string()
}

fn default_tag_end() -> String {
    "]".to_string()
}

fn default_tag_inner() -> String {
    ",".to_string()
}

fn default_remix_threshold() -> f64 {
    0.85
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            playlist_id: None,
            max_lyrics_retries: default_max_lyrics_retries(),
            use_sponsorblock: true,
            get_lyrics: true,
            get_thumbnail: true,
            add_tags: true,
            add_album: true,
            embed_metadata: true,
            get_remix_of: true,
            force_recompute_lyrics: false,
            force_recompute_thumbnails: false,
            force_recompute_tags: false,
            force_recompute_album: false,
            force_recompute_yt_info: false,
            force_recompute_remix_of: false,
            sponsorblock_categories: default_sponsorblock_categories(),
            thumbnail_format: default_thumbnail_format(),
            tag_separator: default_tag_separator(),
            tag_start_delimiter: default_tag_start(),
            tag_end_delimiter: default_tag_end(),
            tag_inner_separator: default_tag_inner(),
            retry_unavailable: false,
            retry_private: false,
            force_mp3_presence: true,
            test_run: false,
            remove_no_longer_in_playlist: false,
            remove_malformatted: false,
            add_folder_files_not_in_list: false,
            remix_confidence_threshold: default_remix_threshold(),
        }
    }
}

impl ProcessingConfig {
    /// Whether non-downloaded videos are worth another look this run
    pub fn include_non_downloaded(&self) -> bool {
        self.retry_private || self.retry_unavailable
    }
}

// ========== Logging ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level_console")]
    pub level_console: String,

    #[serde(default = "default_level_logfiles")]
    pub level_logfiles: String,

    /// Mirror every module to the console, not only warnings
    #[serde(default)]
    pub console_globally: bool,
}

fn default_level_console() -> String {
    "warn".to_string()
}

fn default_level_logfiles() -> String {
    "debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_console: default_level_console(),
            level_logfiles: default_level_logfiles(),
            console_globally: false,
        }
    }
}

// ========== External tools ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_yt_dlp")]
    pub yt_dlp: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,

    #[serde(default = "default_sponsorblock_api")]
    pub sponsorblock_api: String,
    #[serde(default = "default_lrclib_api")]
    pub lrclib_api: String,

    /// YouTube Data API key, only needed by `fetch-playlist`
    #[serde(default)]
    pub youtube_api_key: Option<String>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_yt_dlp() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_sponsorblock_api() -> String {
    "https://sponsor.ajay.app/api/skipSegments".to_string()
}

fn default_lrclib_api() -> String {
    "https://lrclib.net/api/search".to_string()
}

fn default_http_timeout() -> u64 {
    20
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: default_yt_dlp(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            sponsorblock_api: default_sponsorblock_api(),
            lrclib_api: default_lrclib_api(),
            youtube_api_key: None,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

// ========== Root Configuration ==========

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub patterns: PatternsConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a toml file, falling back to defaults when it is missing
    pub fn load(config_path: &Path) -> Result<Self, SyncError> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| SyncError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, SyncError> {
        toml::from_str(contents)
            .map_err(|e| SyncError::Parse(format!("Failed to parse config: {}", e)))
    }

    pub fn pattern_file(&self, name: &str) -> PathBuf {
        self.paths.patterns_dir().join(name)
    }

    /// Create a sample configuration file
    pub fn create_sample(config_path: &Path) -> Result<(), SyncError> {
        if config_path.exists() {
            return Err(SyncError::Config(format!(
                "Config file already exists at {}",
                config_path.display()
            )));
        }

        let sample = r#"# plsync Configuration File

[paths]
download_path = "~/Music/playlist"
# db_path = "/home/user/.plsync/data.db3"
# Holds PATTERNS/ (unwanted, remix, private, trusted artists) and TAGS/ (tag_*.txt, notag_*.txt)
config_dir = "CONFIG"
playlist_videos_file = "JSON/playlist_videos.json"
logs_dir = "LOGS"

[patterns]
unwanted_patterns_file = "unwanted_patterns.txt"
remix_patterns_file = "remix_patterns.txt"
private_patterns_file = "private_patterns.txt"
trusted_artists_file = "trusted_artists.txt"

[processing]
# playlist_id = "PL..."
max_lyrics_retries = 3

use_sponsorblock = true
get_lyrics = true
get_thumbnail = true
add_tags = true
add_album = true
embed_metadata = true
get_remix_of = true

force_recompute_lyrics = false
force_recompute_thumbnails = false
force_recompute_tags = false
force_recompute_album = false
force_recompute_yt_info = false
force_recompute_remix_of = false

sponsorblock_categories = ["music_offtopic", "sponsor", "intro", "outro"]
# "pad" keeps the whole picture on a transparent square, "crop" cuts the center
thumbnail_format = "pad"

# Artist frame becomes "Uploader ~ [tag1,tag2]"
tag_separator = " ~ "
tag_start_delimiter = "["
tag_end_delimiter = "]"
tag_inner_separator = ","

retry_unavailable = false
retry_private = false
force_mp3_presence = true
test_run = false
remove_no_longer_in_playlist = false
remove_malformatted = false
add_folder_files_not_in_list = false
remix_confidence_threshold = 0.85

[logging]
level_console = "warn"
level_logfiles = "debug"
console_globally = false

[tools]
yt_dlp = "yt-dlp"
ffmpeg = "ffmpeg"
ffprobe = "ffprobe"
# youtube_api_key = "..."
http_timeout_secs = 20
"#;

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SyncError::Config(format!("Failed to create config directory: {}", e)))?;
            }
        }

        std::fs::write(config_path, sample)
            .map_err(|e| SyncError::Config(format!("Failed to write sample config: {}", e)))?;

        info!("Sample config created at: {}", config_path.display());
        Ok(())
    }
}
