use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::library::scan::parse_metadata_blob;
use crate::sources::{Extraction, TagCodec, VideoSource};
use crate::text::sanitize_text;
use crate::types::{Column, Status, VideoPatch, VideoRecord};

use super::Context;

/// Video id embedded in an existing mp3, if readable
fn embedded_id(path: &Path, codec: &dyn TagCodec) -> Option<String> {
    let blob = codec.read(path).ok()?.metadata?;
    parse_metadata_blob(&blob).ok().map(|r| r.video_id)
}

/// File stem for a download: the sanitized title, suffixed `_1`, `_2`... when another
/// video already owns the name. A file carrying the same id is reused.
pub fn unique_stem(dir: &Path, title: &str, video_id: &str, codec: &dyn TagCodec) -> String {
    let base = match sanitize_text(title) {
        t if t.is_empty() => video_id.to_string(),
        t => t,
    };
    let mut candidate = base.clone();
    let mut n = 1;
    loop {
        let path = dir.join(format!("{candidate}.mp3"));
        if !path.exists() || embedded_id(&path, codec).as_deref() == Some(video_id) {
            return candidate;
        }
        candidate = format!("{base}_{n}");
        n += 1;
    }
}

/// The file the record already names, unless it carries another video's id
fn own_file(ctx: &Context<'_>, codec: &dyn TagCodec, current: &VideoRecord) -> Option<PathBuf> {
    let path = ctx.mp3_path(current).filter(|p| p.is_file())?;
    match embedded_id(&path, codec) {
        Some(id) if id != current.video_id => {
            warn!("[Download] '{}' belongs to '{id}', not '{}'", path.display(), current.video_id);
            None
        }
        _ => Some(path),
    }
}

fn failure_patch(status: Status, reason: &str) -> VideoPatch {
    VideoPatch::new().status(status).set(Column::Reason, reason)
}

/// Extracts and downloads the video. Returns the mp3 path, None when nothing could be downloaded.
pub async fn download<V: VideoSource>(
    ctx: &Context<'_>,
    videos: &V,
    codec: &dyn TagCodec,
    current: &mut VideoRecord,
) -> Result<Option<PathBuf>, SyncError> {
    let video_id = current.video_id.clone();
    let info = match videos.extract(&video_id).await {
        Extraction::Ok(info) => info,
        Extraction::Private(reason) => {
            info!("[Download] '{video_id}' is private");
            ctx.apply(current, failure_patch(Status::Private, &reason))?;
            return Ok(None);
        }
        Extraction::Blocked(reason) | Extraction::Unknown(reason) => {
            info!("[Download] '{video_id}' is unavailable: {reason}");
            ctx.apply(current, failure_patch(Status::Unavailable, &reason))?;
            return Ok(None);
        }
    };

    let target = match own_file(ctx, codec, current) {
        Some(path) => path,
        None => {
            let title = info.title.clone().or_else(|| current.title.clone()).unwrap_or_default();
            let stem = unique_stem(ctx.dir, &title, &video_id, codec);
            ctx.dir.join(format!("{stem}.mp3"))
        }
    };

    let path = if target.is_file() {
        debug!("[Download] Reusing '{}'", target.display());
        target
    } else if ctx.test_run() {
        info!("[Download] Test run, would download '{video_id}' to '{}'", target.display());
        return Ok(None);
    } else {
        let stem = target.file_stem().and_then(|s| s.to_str()).unwrap_or(video_id.as_str()).to_string();
        std::fs::create_dir_all(ctx.dir)?;
        videos.download(&video_id, ctx.dir, &stem).await?
    };

    let mut new = current.clone();
    new.refresh_descriptive(&info);
    new.filename = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
    new.status = Some(Status::Downloaded);
    let mut patch = current.diff(&new)?;
    patch.put(Column::Reason, Value::Null);
    ctx.apply(current, patch)?;

    info!("[Download] '{video_id}' -> '{}'", path.display());
    Ok(Some(path))
}

/// Re-extracts descriptive information and clears `recompute_yt_info`
pub async fn refresh_info<V: VideoSource>(
    ctx: &Context<'_>,
    videos: &V,
    current: &mut VideoRecord,
) -> Result<(), SyncError> {
    match videos.extract(&current.video_id).await {
        Extraction::Ok(info) => {
            let mut new = current.clone();
            new.refresh_descriptive(&info);
            new.recompute_yt_info = Some(false);
            ctx.apply_record(current, &new)?;
            Ok(())
        }
        other => {
            warn!("[Download] Could not refresh '{}': {other:?}", current.video_id);
            Err(SyncError::Extraction(format!("{other:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::*;
    use crate::sources::TagUpdate;

    #[test]
    fn test_unique_stem_suffixes_and_reuse() {
        let env = TestEnv::new();
        let dir = env.dir.path();
        assert_eq!(unique_stem(dir, "Halo", "a", &env.codec), "Halo");

        let taken = dir.join("Halo.mp3");
        std::fs::write(&taken, b"x").unwrap();
        env.codec
            .write(&taken, &TagUpdate { metadata: Some(r#"{"video_id":"a","filename":"Halo.mp3"}"#.into()), ..Default::default() })
            .unwrap();
        assert_eq!(unique_stem(dir, "Halo", "a", &env.codec), "Halo");
        assert_eq!(unique_stem(dir, "Halo", "b", &env.codec), "Halo_1");
        assert_eq!(unique_stem(dir, "???", "zz", &env.codec), "zz");
    }

    #[tokio::test]
    async fn test_download_stores_info_and_clears_reason() {
        let env = TestEnv::new();
        let mut record = VideoRecord::new("a");
        record.reason = Some("old failure".to_string());
        env.store.insert(&record).unwrap();
        let services = fake_services(&env, vec![("a", Extraction::Ok(extracted("a", "Halo")))]);

        let ctx = env.context();
        let mut current = env.store.get("a").unwrap().unwrap();
        let path = download(&ctx, &services.videos, &env.codec, &mut current).await.unwrap();
        assert_eq!(path, Some(env.dir.path().join("Halo.mp3")));

        let stored = env.store.get("a").unwrap().unwrap();
        assert_eq!(stored.status, Some(Status::Downloaded));
        assert_eq!(stored.reason, None);
        assert_eq!(stored.uploader.as_deref(), Some("Uploader"));
        assert_eq!(current.filename.as_deref(), Some("Halo.mp3"));
        assert_eq!(current.reason, None);
    }

    #[tokio::test]
    async fn test_refresh_info_clears_flag() {
        let env = TestEnv::new();
        let mut record = extracted("a", "Old title");
        record.recompute_yt_info = Some(true);
        env.store.insert(&record).unwrap();
        let services = fake_services(&env, vec![("a", Extraction::Ok(extracted("a", "New title")))]);

        let mut current = env.store.get("a").unwrap().unwrap();
        refresh_info(&env.context(), &services.videos, &mut current).await.unwrap();
        let stored = env.store.get("a").unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("New title"));
        assert_eq!(stored.recompute_yt_info, Some(false));
    }

    #[tokio::test]
    async fn test_own_file_without_id_is_reused() {
        let env = TestEnv::new();
        let mut record = extracted("a", "Halo");
        record.channel_url = None;
        record.filename = Some("Halo.mp3".to_string());
        env.store.insert(&record).unwrap();
        std::fs::write(env.dir.path().join("Halo.mp3"), b"audio").unwrap();
        let services = fake_services(&env, vec![("a", Extraction::Ok(extracted("a", "Halo (Live)")))]);

        let mut current = env.store.get("a").unwrap().unwrap();
        let path = download(&env.context(), &services.videos, &env.codec, &mut current).await.unwrap();
        assert_eq!(path, Some(env.dir.path().join("Halo.mp3")));
        assert_eq!(services.videos.download_calls(), 0);

        let stored = env.store.get("a").unwrap().unwrap();
        assert_eq!(stored.filename.as_deref(), Some("Halo.mp3"));
        assert!(stored.channel_url.is_some());
        let files: Vec<_> = std::fs::read_dir(env.dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "mp3"))
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_named_file_of_another_video_is_not_taken() {
        let env = TestEnv::new();
        let mut record = VideoRecord::new("b");
        record.filename = Some("Halo.mp3".to_string());
        env.store.insert(&record).unwrap();
        let taken = env.dir.path().join("Halo.mp3");
        std::fs::write(&taken, b"x").unwrap();
        env.codec
            .write(&taken, &TagUpdate { metadata: Some(r#"{"video_id":"a"}"#.into()), ..Default::default() })
            .unwrap();
        let services = fake_services(&env, vec![("b", Extraction::Ok(extracted("b", "Halo")))]);

        let mut current = env.store.get("b").unwrap().unwrap();
        let path = download(&env.context(), &services.videos, &env.codec, &mut current).await.unwrap();
        assert_eq!(path, Some(env.dir.path().join("Halo_1.mp3")));
        assert_eq!(services.videos.download_calls(), 1);
        assert_eq!(current.filename.as_deref(), Some("Halo_1.mp3"));
    }
}
