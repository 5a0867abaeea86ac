use std::path::Path;

use chrono::DateTime;
use tracing::{debug, info};

use crate::errors::SyncError;
use crate::library::scan::parse_metadata_blob;
use crate::sources::{TagCodec, TagUpdate};
use crate::types::VideoRecord;

use super::Context;

/// `YYYY-MM-DD` of a unix timestamp, in UTC
pub fn recording_date(timestamp: f64) -> Option<String> {
    DateTime::from_timestamp(timestamp.floor() as i64, 0).map(|d| d.format("%Y-%m-%d").to_string())
}

/// True when the embedded blob already describes `current`, timestamps aside
fn blob_is_current(existing: Option<&str>, current: &VideoRecord) -> Result<bool, SyncError> {
    let Some(existing) = existing else {
        return Ok(false);
    };
    match parse_metadata_blob(existing) {
        Ok(embedded) => Ok(embedded.comparable_json()? == current.comparable_json()?),
        Err(reason) => {
            debug!("[Metadata] Embedded blob of '{}' is unusable: {reason}", current.video_id);
            Ok(false)
        }
    }
}

/// Embeds the record itself, the title and the date it was added into the mp3
pub fn run(ctx: &Context<'_>, codec: &dyn TagCodec, current: &VideoRecord, path: &Path) -> Result<(), SyncError> {
    let tags = codec.read(path)?;
    let mut update = TagUpdate::default();

    if let Some(date) = current.date_added.and_then(recording_date) {
        if tags.date.as_deref() != Some(date.as_str()) {
            update.date = Some(date);
        }
    }
    if let Some(title) = &current.title {
        if tags.title.as_ref() != Some(title) {
            update.title = Some(title.clone());
        }
    }
    if !blob_is_current(tags.metadata.as_deref(), current)? {
        update.metadata = Some(serde_json::to_string(current)?);
    }

    if update.is_empty() {
        return Ok(());
    }
    if ctx.test_run() {
        info!("[Metadata] Test run, would update the tags of '{}'", current.video_id);
        return Ok(());
    }
    codec.write(path, &update)?;
    debug!("[Metadata] Updated the tags of '{}'", current.video_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::*;

    #[test]
    fn test_recording_date() {
        assert_eq!(recording_date(0.0).as_deref(), Some("1970-01-01"));
        assert_eq!(recording_date(1_700_000_000.5).as_deref(), Some("2023-11-14"));
    }

    #[test]
    fn test_blob_written_once() {
        let env = TestEnv::new();
        let mut record = extracted("a", "Song");
        record.filename = Some("Song.mp3".to_string());
        record.date_added = Some(1_700_000_000.0);
        env.store.insert(&record).unwrap();
        let path = env.dir.path().join("Song.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let current = env.store.get("a").unwrap().unwrap();

        run(&env.context(), &env.codec, &current, &path).unwrap();
        let tags = env.codec.tags_of(&path);
        assert_eq!(tags.date.as_deref(), Some("2023-11-14"));
        assert_eq!(tags.title.as_deref(), Some("Song"));
        let embedded = parse_metadata_blob(tags.metadata.as_deref().unwrap()).unwrap();
        assert_eq!(embedded.video_id, "a");

        // a newer date_modified alone does not rewrite the blob
        let mut touched = current.clone();
        touched.date_modified = Some(current.date_modified.unwrap_or(0.0) + 60.0);
        let file_writes = env.codec.write_count();
        run(&env.context(), &env.codec, &touched, &path).unwrap();
        assert_eq!(env.codec.write_count(), file_writes);
    }
}
