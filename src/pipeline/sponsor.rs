use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::lyrics::remap::normalize_segments;
use crate::sources::{AudioCutter, SegmentLookup};
use crate::types::{Column, VideoPatch, VideoRecord, SEGMENTS_CHECKED_NONE};

use super::Context;

/// True once segments were removed or the lookup found none
fn already_handled(current: &VideoRecord) -> bool {
    let (n, d) = current.segments_state();
    (n, d) == SEGMENTS_CHECKED_NONE || (n > 0 && d > 0.0)
}

/// Removes sponsor segments from the mp3 and records what was cut
pub async fn run<S: SegmentLookup>(
    ctx: &Context<'_>,
    lookup: &S,
    cutter: &dyn AudioCutter,
    current: &mut VideoRecord,
    path: &Path,
) -> Result<(), SyncError> {
    if already_handled(current) {
        return Ok(());
    }

    let skips = match current.skips.as_ref().filter(|s| !s.is_empty()) {
        Some(stored) => stored.clone(),
        None => {
            lookup
                .segments(&current.video_id, &ctx.config.processing.sponsorblock_categories)
                .await?
        }
    };
    let skips = normalize_segments(&skips);

    if skips.is_empty() {
        debug!("[SponsorBlock] No segments for '{}'", current.video_id);
        let (n, d) = SEGMENTS_CHECKED_NONE;
        let patch = VideoPatch::new()
            .set(Column::RemovedSegmentsInt, n)
            .set(Column::RemovedSegmentsDuration, d)
            .with_skips(Vec::new());
        ctx.apply(current, patch)?;
        return Ok(());
    }

    if ctx.test_run() {
        info!("[SponsorBlock] Test run, would remove {} segments from '{}'", skips.len(), path.display());
        return Ok(());
    }

    let tmp = path.with_extension("tmp.mp3");
    let removed = match cutter.cut(path, &tmp, &skips) {
        Ok(removed) => removed,
        Err(e) => {
            if tmp.exists() {
                if let Err(rm) = std::fs::remove_file(&tmp) {
                    warn!("[SponsorBlock] Could not clean up '{}': {rm}", tmp.display());
                }
            }
            return Err(e);
        }
    };
    std::fs::rename(&tmp, path)?;

    info!("[SponsorBlock] Removed {} segments ({removed:.2}s) from '{}'", skips.len(), current.video_id);
    let patch = VideoPatch::new()
        .set(Column::RemovedSegmentsInt, skips.len() as i64)
        .set(Column::RemovedSegmentsDuration, removed)
        .with_skips(skips);
    ctx.apply(current, patch)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::*;

    fn downloaded(env: &TestEnv) -> (VideoRecord, std::path::PathBuf) {
        let mut record = extracted("a", "Song");
        record.filename = Some("Song.mp3".to_string());
        env.store.insert(&record).unwrap();
        let path = env.dir.path().join("Song.mp3");
        std::fs::write(&path, b"audio").unwrap();
        (env.store.get("a").unwrap().unwrap(), path)
    }

    #[tokio::test]
    async fn test_segments_cut_and_recorded() {
        let env = TestEnv::new();
        let (mut current, path) = downloaded(&env);
        let services = fake_services(&env, vec![]);

        run(&env.context(), &services.segments, services.cutter.as_ref(), &mut current, &path)
            .await
            .unwrap();
        let stored = env.store.get("a").unwrap().unwrap();
        assert_eq!(stored.segments_state(), (1, 10.0));
        assert_eq!(stored.skips, Some(vec![(10.0, 20.0)]));
        assert!(path.exists());
        assert!(!path.with_extension("tmp.mp3").exists());

        // done once, never again
        let writes = env.store.write_count();
        run(&env.context(), &services.segments, services.cutter.as_ref(), &mut current, &path)
            .await
            .unwrap();
        assert_eq!(env.store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_no_segments_writes_sentinel() {
        let env = TestEnv::new();
        let (mut current, path) = downloaded(&env);
        let mut services = fake_services(&env, vec![]);
        services.segments = FakeSegments(Vec::new());

        run(&env.context(), &services.segments, services.cutter.as_ref(), &mut current, &path)
            .await
            .unwrap();
        assert_eq!(env.store.get("a").unwrap().unwrap().segments_state(), SEGMENTS_CHECKED_NONE);
        assert!(already_handled(&current));
    }

    #[tokio::test]
    async fn test_test_run_leaves_file_alone() {
        let mut env = TestEnv::new();
        env.config.processing.test_run = true;
        let (mut current, path) = downloaded(&env);
        let services = fake_services(&env, vec![]);

        run(&env.context(), &services.segments, services.cutter.as_ref(), &mut current, &path)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"audio");
        assert_eq!(current.segments_state(), (0, 0.0));
    }
}
