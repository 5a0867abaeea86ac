use std::cell::Cell;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::database::db_loader::open_db;
use crate::database::migration::migrate_schema;
use crate::database::queries::*;
use crate::database::tables::*;
use crate::errors::SyncError;
use crate::types::{Status, VideoPatch, VideoRecord};

pub mod db_loader;
pub mod migration;
pub mod queries;
pub mod tables;

pub fn init(conn: &Connection) -> Result<(), SyncError> {
    conn.execute(&init_table(DB_VIDEOS_NAME, DB_VIDEOS_COLS), [])?;
    conn.execute(&init_table(DB_REMOVED_SEGMENTS_NAME, DB_REMOVED_SEGMENTS_COLS), [])?;
    conn.execute(&init_table(DB_TAGS_NAME, DB_TAGS_COLS), [])?;
    conn.execute(&init_table(DB_VIDEO_TAGS_NAME, DB_VIDEO_TAGS_COLS), [])?;
    conn.execute(DB_REMOVED_SEGMENTS_INDEX_VIDEO, [])?;
    conn.execute(DB_VIDEOS_INDEX_STATUS, [])?;
    migrate_schema(conn)?;
    Ok(())
}

pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Persistent state of every tracked video.
///
/// Each write is atomic: a failure leaves the row and its relations untouched.
/// In test-run mode everything happens inside one transaction that is rolled back
/// when the store is dropped, so the run sees its own writes but nothing is kept.
pub struct Store {
    conn: Connection,
    test_run: bool,
    writes: Cell<u64>,
}

impl Store {
    pub fn open(path: Option<&Path>, test_run: bool) -> Result<Self, SyncError> {
        Self::from_connection(open_db(path)?, test_run)
    }

    pub fn from_connection(conn: Connection, test_run: bool) -> Result<Self, SyncError> {
        init(&conn)?;
        if test_run {
            info!("[Store] Test run, changes will be rolled back");
            conn.execute_batch("BEGIN")?;
        }
        Ok(Self { conn, test_run, writes: Cell::new(0) })
    }

    pub fn is_test_run(&self) -> bool {
        self.test_run
    }

    /// Number of write operations that changed something since the store was opened
    pub fn write_count(&self) -> u64 {
        self.writes.get()
    }

    fn atomic<T>(&self, f: impl FnOnce(&Connection) -> Result<T, SyncError>) -> Result<T, SyncError> {
        self.conn.execute_batch("SAVEPOINT store_write")?;
        match f(&self.conn) {
            Ok(v) => {
                self.conn.execute_batch("RELEASE store_write")?;
                Ok(v)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK TO store_write; RELEASE store_write") {
                    warn!("[Store] Rollback failed: {rollback}");
                }
                Err(e)
            }
        }
    }

    fn count_write(&self) {
        self.writes.set(self.writes.get() + 1);
    }

    pub fn contains(&self, video_id: &str) -> Result<bool, SyncError> {
        video_exists(&self.conn, video_id)
    }

    /// Inserts a new video with every known field of `record`.
    /// Returns false, without touching anything, when the id is already tracked.
    pub fn insert(&self, record: &VideoRecord) -> Result<bool, SyncError> {
        if record.video_id.is_empty() {
            return Err(SyncError::Parse("cannot insert a video without id".to_string()));
        }
        let patch = record.to_patch()?;
        let now = now_timestamp();
        let date_added = record.date_added.unwrap_or(now);

        let inserted = self.atomic(|conn| {
            if insert_video_row(conn, &record.video_id, date_added)? == 0 {
                return Ok(false);
            }
            let fields: Vec<_> = patch.fields.iter().filter(|(c, _)| !c.is_protected()).cloned().collect();
            if !fields.is_empty() {
                update_video_columns(conn, &record.video_id, &fields, now)?;
            }
            if let Some(skips) = &patch.skips {
                replace_segments(conn, &record.video_id, skips)?;
            }
            if let Some(tags) = &patch.tags {
                replace_tags(conn, &record.video_id, tags)?;
            }
            Ok(true)
        })?;

        if inserted {
            self.count_write();
            debug!("[Store] Inserted '{}'", record.video_id);
        }
        Ok(inserted)
    }

    /// Applies `patch` to an existing video. `date_added` / `date_modified` in the patch are ignored,
    /// `date_modified` is stamped by the store. An empty patch writes nothing.
    pub fn update(&self, video_id: &str, patch: &VideoPatch) -> Result<bool, SyncError> {
        let fields: Vec<_> = patch.fields.iter().filter(|(c, _)| !c.is_protected()).cloned().collect();
        if fields.is_empty() && patch.skips.is_none() && patch.tags.is_none() {
            return Ok(false);
        }

        let updated = self.atomic(|conn| {
            if update_video_columns(conn, video_id, &fields, now_timestamp())? == 0 {
                return Ok(false);
            }
            if let Some(skips) = &patch.skips {
                replace_segments(conn, video_id, skips)?;
            }
            if let Some(tags) = &patch.tags {
                replace_tags(conn, video_id, tags)?;
            }
            Ok(true)
        })?;

        if updated {
            self.count_write();
            debug!(
                "[Store] Updated '{video_id}': {}",
                fields.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>().join(", ")
            );
        } else {
            warn!("[Store] Update of unknown video '{video_id}' ignored");
        }
        Ok(updated)
    }

    /// Writes the difference between `current` and `new`, if any
    pub fn update_diff(&self, current: &VideoRecord, new: &VideoRecord) -> Result<bool, SyncError> {
        self.update(&current.video_id, &current.diff(new)?)
    }

    pub fn get(&self, video_id: &str) -> Result<Option<VideoRecord>, SyncError> {
        select_video(&self.conn, video_id)
    }

    pub fn list_tracked(&self, include_non_downloaded: bool) -> Result<Vec<String>, SyncError> {
        select_tracked_ids(&self.conn, include_non_downloaded)
    }

    pub fn delete(&self, video_id: &str) -> Result<bool, SyncError> {
        let deleted = self.atomic(|conn| delete_video(conn, video_id))? > 0;
        if deleted {
            self.count_write();
            info!("[Store] Deleted '{video_id}'");
        }
        Ok(deleted)
    }

    /// `(video_id, title)` of every titled video
    pub fn titles(&self) -> Result<Vec<(String, String)>, SyncError> {
        select_titles(&self.conn)
    }

    pub fn status_counts(&self) -> Result<Vec<(Status, usize)>, SyncError> {
        select_status_counts(&self.conn)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.test_run {
            match self.conn.execute_batch("ROLLBACK") {
                Ok(()) => info!("[Store] Test run rolled back {} write(s)", self.writes.get()),
                Err(e) => warn!("[Store] Test run rollback failed: {e}"),
            }
        }
    }
}
