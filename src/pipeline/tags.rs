use std::path::Path;

use tracing::{debug, info};

use crate::config::ProcessingConfig;
use crate::errors::SyncError;
use crate::sources::{TagCodec, TagUpdate};
use crate::types::{Column, VideoPatch, VideoRecord};

use super::Context;

/// Artist frame value: "Artist ~ [a,b]", or the bare artist without tags
pub fn artist_with_tags(base: &str, tags: &[String], cfg: &ProcessingConfig) -> String {
    if tags.is_empty() {
        return base.to_string();
    }
    format!(
        "{base}{}{}{}{}",
        cfg.tag_separator,
        cfg.tag_start_delimiter,
        tags.join(&cfg.tag_inner_separator),
        cfg.tag_end_delimiter
    )
}

/// Computes the classifier tags of a video and writes them into the artist frame
pub fn run(ctx: &Context<'_>, codec: &dyn TagCodec, current: &mut VideoRecord, path: &Path) -> Result<(), SyncError> {
    let cfg = &ctx.config.processing;

    if current.recompute_tags != Some(false) || cfg.force_recompute_tags {
        let tags: Vec<String> = ctx
            .classifier
            .compute_tags(current.title_or_empty(), current.uploader_or_empty())
            .into_iter()
            .collect();
        debug!("[Tags] '{}': {:?}", current.video_id, tags);
        let patch = VideoPatch::new().set(Column::RecomputeTags, false).with_tags(tags);
        ctx.apply(current, patch)?;
    }

    let tags = current.tags.clone().unwrap_or_default();
    let artist = artist_with_tags(current.uploader_or_empty(), &tags, cfg);
    if codec.read(path)?.artist.as_deref() == Some(artist.as_str()) {
        return Ok(());
    }

    if ctx.test_run() {
        info!("[Tags] Test run, would set artist of '{}' to '{artist}'", current.video_id);
        return Ok(());
    }
    codec.write(path, &TagUpdate { artist: Some(artist), ..Default::default() })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::*;

    #[test]
    fn test_artist_format() {
        let cfg = ProcessingConfig::default();
        assert_eq!(artist_with_tags("Artist", &[], &cfg), "Artist");
        assert_eq!(
            artist_with_tags("Artist", &["a".to_string(), "b".to_string()], &cfg),
            "Artist ~ [a,b]"
        );
    }

    #[test]
    fn test_tags_computed_once_and_written() {
        let mut env = TestEnv::new();
        env.classifier.add_tag_file("tag_Night-Core", "nightcore").unwrap();
        let mut record = extracted("a", "Halo Nightcore");
        record.filename = Some("Halo.mp3".to_string());
        env.store.insert(&record).unwrap();
        let path = env.dir.path().join("Halo.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let mut current = env.store.get("a").unwrap().unwrap();

        run(&env.context(), &env.codec, &mut current, &path).unwrap();
        let stored = env.store.get("a").unwrap().unwrap();
        assert_eq!(stored.tags, Some(vec!["nightcore".to_string()]));
        assert_eq!(stored.recompute_tags, Some(false));
        assert_eq!(env.codec.tags_of(&path).artist.as_deref(), Some("Uploader ~ [nightcore]"));

        let (writes, file_writes) = (env.store.write_count(), env.codec.write_count());
        run(&env.context(), &env.codec, &mut current, &path).unwrap();
        assert_eq!((env.store.write_count(), env.codec.write_count()), (writes, file_writes));
    }
}
