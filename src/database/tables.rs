pub const DB_VIDEOS_NAME: &str = "videos";
pub const DB_VIDEOS_COLS: &str = "video_id TEXT PRIMARY KEY, \
    title TEXT, \
    description TEXT, \
    thumbnail_url TEXT, \
    channel_id TEXT, \
    channel_url TEXT, \
    uploader TEXT, \
    uploader_id TEXT, \
    uploader_url TEXT, \
    upload_date TEXT, \
    duration REAL, \
    duration_string TEXT, \
    view_count INTEGER, \
    like_count INTEGER, \
    comment_count INTEGER, \
    channel_follower_count INTEGER, \
    filename TEXT, \
    status INTEGER DEFAULT 3 CHECK (status IN (0, 1, 2, 3)), \
    reason TEXT, \
    try_lyrics_if_not INTEGER DEFAULT 1 CHECK (try_lyrics_if_not IN (0, 1)), \
    remove_lyrics INTEGER DEFAULT 0 CHECK (remove_lyrics IN (0, 1)), \
    update_thumbnail INTEGER DEFAULT 0 CHECK (update_thumbnail IN (0, 1)), \
    remove_thumbnail INTEGER DEFAULT 0 CHECK (remove_thumbnail IN (0, 1)), \
    recompute_tags INTEGER DEFAULT 1 CHECK (recompute_tags IN (0, 1)), \
    recompute_album INTEGER DEFAULT 1 CHECK (recompute_album IN (0, 1)), \
    recompute_yt_info INTEGER DEFAULT 0 CHECK (recompute_yt_info IN (0, 1)), \
    lyrics_retries INTEGER DEFAULT 0, \
    removed_segments_int INTEGER DEFAULT 0, \
    removed_segments_duration REAL DEFAULT 0, \
    lyrics TEXT, \
    subtitles TEXT, \
    syncedlyrics TEXT, \
    auto_subs TEXT, \
    remix_of TEXT, \
    date_added REAL NOT NULL, \
    date_modified REAL NOT NULL";

pub const DB_REMOVED_SEGMENTS_NAME: &str = "removed_segments";
pub const DB_REMOVED_SEGMENTS_COLS: &str = "id INTEGER PRIMARY KEY AUTOINCREMENT, \
    video_id TEXT NOT NULL, \
    segment_start REAL NOT NULL, \
    segment_end REAL NOT NULL, \
    CHECK (segment_start < segment_end), \
    FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE";

pub const DB_TAGS_NAME: &str = "tags";
pub const DB_TAGS_COLS: &str = "tag_id INTEGER PRIMARY KEY AUTOINCREMENT, \
    tag TEXT NOT NULL UNIQUE COLLATE NOCASE";

pub const DB_VIDEO_TAGS_NAME: &str = "video_tags";
pub const DB_VIDEO_TAGS_COLS: &str = "video_id TEXT NOT NULL, \
    tag_id INTEGER NOT NULL, \
    PRIMARY KEY (video_id, tag_id), \
    FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE, \
    FOREIGN KEY (tag_id) REFERENCES tags(tag_id) ON DELETE CASCADE";

pub const DB_REMOVED_SEGMENTS_INDEX_VIDEO: &str =
    "CREATE INDEX IF NOT EXISTS idx_removed_segments_video ON removed_segments(video_id)";
pub const DB_VIDEOS_INDEX_STATUS: &str =
    "CREATE INDEX IF NOT EXISTS idx_videos_status ON videos(status, date_added)";

pub fn init_table(name: &str, cols: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS {name} ({cols})")
}
