use std::path::Path;

use tracing::{debug, info};

use crate::errors::SyncError;
use crate::sources::thumbnail::square_png;
use crate::sources::{CoverChange, TagCodec, TagUpdate, ThumbnailSource};
use crate::types::{Column, VideoPatch, VideoRecord};

use super::Context;

fn cover_update(change: CoverChange) -> TagUpdate {
    TagUpdate { cover: Some(change), ..Default::default() }
}

/// Keeps the `.png` next to the mp3 and the embedded cover in step
pub async fn run<T: ThumbnailSource>(
    ctx: &Context<'_>,
    thumbnails: &T,
    codec: &dyn TagCodec,
    current: &mut VideoRecord,
    path: &Path,
) -> Result<(), SyncError> {
    let cfg = &ctx.config.processing;
    let png = path.with_extension("png");
    let test_run = ctx.test_run();

    if current.remove_thumbnail == Some(true) {
        if test_run {
            info!("[Thumbnail] Test run, would remove the cover of '{}'", current.video_id);
        } else {
            codec.write(path, &cover_update(CoverChange::Remove))?;
            if png.exists() {
                std::fs::remove_file(&png)?;
            }
            info!("[Thumbnail] Removed the cover of '{}'", current.video_id);
        }
        ctx.apply(current, VideoPatch::new().set(Column::RemoveThumbnail, false))?;
        return Ok(());
    }

    let force = cfg.force_recompute_thumbnails;
    let has_cover = codec.read(path)?.has_cover;
    let mut embed = current.update_thumbnail == Some(true) || !has_cover;
    let mut image = None;

    if has_cover && !png.exists() && !force {
        if let Some(cover) = codec.cover(path)? {
            debug!("[Thumbnail] Extracting the embedded cover of '{}'", current.video_id);
            if !test_run {
                std::fs::write(&png, &cover)?;
            }
            image = Some(cover);
        }
    }

    if force || (image.is_none() && !png.exists()) {
        let url = current
            .thumbnail_url
            .clone()
            .ok_or_else(|| SyncError::Parse(format!("no thumbnail url for '{}'", current.video_id)))?;
        let square = square_png(&thumbnails.fetch(&url).await?, cfg.thumbnail_format)?;
        if !test_run {
            std::fs::write(&png, &square)?;
        }
        image = Some(square);
        embed = true;
    }

    if embed {
        if test_run {
            info!("[Thumbnail] Test run, would embed the cover of '{}'", current.video_id);
        } else {
            let bytes = match image {
                Some(bytes) => bytes,
                None => std::fs::read(&png)?,
            };
            codec.write(path, &cover_update(CoverChange::Set(bytes)))?;
            debug!("[Thumbnail] Embedded the cover of '{}'", current.video_id);
        }
    }

    ctx.apply(current, VideoPatch::new().set(Column::UpdateThumbnail, false))?;
    Ok(())
}
