use std::path::Path;

use tracing::{debug, info};

use crate::errors::SyncError;
use crate::sources::{TagCodec, TagUpdate};
use crate::types::{Column, VideoPatch, VideoRecord};

use super::Context;

/// Files the track under the Public or Private album
pub fn run(ctx: &Context<'_>, codec: &dyn TagCodec, current: &mut VideoRecord, path: &Path) -> Result<(), SyncError> {
    let existing = codec.read(path)?.album.filter(|a| !a.trim().is_empty());
    let recompute = current.recompute_album != Some(false) || ctx.config.processing.force_recompute_album;
    if !recompute && existing.is_some() {
        return Ok(());
    }

    let album = ctx
        .classifier
        .compute_album(current.title_or_empty(), current.uploader_or_empty());

    if existing.as_deref() != Some(album.as_str()) {
        if ctx.test_run() {
            info!("[Album] Test run, would file '{}' under {album}", current.video_id);
        } else {
            codec.write(path, &TagUpdate { album: Some(album.to_string()), ..Default::default() })?;
            debug!("[Album] '{}' filed under {album}", current.video_id);
        }
    }

    ctx.apply(current, VideoPatch::new().set(Column::RecomputeAlbum, false))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::patterns::PatternSet;
    use crate::pipeline::testing::*;

    #[test]
    fn test_trusted_uploader_goes_public() {
        let mut env = TestEnv::new();
        env.classifier = Classifier::new(PatternSet::default(), PatternSet::from_lines(["Uploader"]).unwrap());
        let mut record = extracted("a", "Song");
        record.filename = Some("Song.mp3".to_string());
        env.store.insert(&record).unwrap();
        let path = env.dir.path().join("Song.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let mut current = env.store.get("a").unwrap().unwrap();

        run(&env.context(), &env.codec, &mut current, &path).unwrap();
        assert_eq!(env.codec.tags_of(&path).album.as_deref(), Some("Public"));
        assert_eq!(current.recompute_album, Some(false));

        let file_writes = env.codec.write_count();
        run(&env.context(), &env.codec, &mut current, &path).unwrap();
        assert_eq!(env.codec.write_count(), file_writes);
    }

    #[test]
    fn test_settled_album_is_left_alone_unless_forced() {
        let mut env = TestEnv::new();
        let mut record = extracted("a", "Song");
        record.filename = Some("Song.mp3".to_string());
        record.recompute_album = Some(false);
        env.store.insert(&record).unwrap();
        let path = env.dir.path().join("Song.mp3");
        std::fs::write(&path, b"audio").unwrap();
        env.codec
            .write(&path, &TagUpdate { album: Some("Public".to_string()), ..Default::default() })
            .unwrap();
        let mut current = env.store.get("a").unwrap().unwrap();

        let file_writes = env.codec.write_count();
        run(&env.context(), &env.codec, &mut current, &path).unwrap();
        assert_eq!(env.codec.write_count(), file_writes);
        assert_eq!(env.codec.tags_of(&path).album.as_deref(), Some("Public"));

        env.config.processing.force_recompute_album = true;
        run(&env.context(), &env.codec, &mut current, &path).unwrap();
        assert_eq!(env.codec.tags_of(&path).album.as_deref(), Some("Private"));
    }

    #[test]
    fn test_missing_album_is_written_despite_flag() {
        let env = TestEnv::new();
        let mut record = extracted("a", "Song");
        record.filename = Some("Song.mp3".to_string());
        record.recompute_album = Some(false);
        env.store.insert(&record).unwrap();
        let path = env.dir.path().join("Song.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let mut current = env.store.get("a").unwrap().unwrap();

        run(&env.context(), &env.codec, &mut current, &path).unwrap();
        assert_eq!(env.codec.tags_of(&path).album.as_deref(), Some("Private"));
    }
}
