use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::library::reconcile::fused_view;
use crate::sources::TagCodec;
use crate::types::{Column, Status, VideoPatch, VideoRecord};

use super::Context;

#[derive(Debug, Clone, PartialEq)]
pub enum Integrity {
    /// The mp3 is on disk and its record is usable
    Ready(PathBuf),
    NeedsDownload,
    /// Not retried under the current policy
    Skip,
}

/// Forgets the cut state of a video whose audio is about to be fetched again
fn reset_for_download(ctx: &Context<'_>, current: &mut VideoRecord) -> Result<(), SyncError> {
    let patch = VideoPatch::new()
        .status(Status::Unknown)
        .set(Column::RemovedSegmentsInt, 0)
        .set(Column::RemovedSegmentsDuration, 0.0)
        .with_skips(Vec::new());
    ctx.apply(current, patch)?;
    Ok(())
}

/// Decides whether the video needs a download before the other stages can run
pub fn check(
    ctx: &Context<'_>,
    codec: &dyn TagCodec,
    current: &mut VideoRecord,
    disk: Option<&VideoRecord>,
) -> Result<Integrity, SyncError> {
    let cfg = &ctx.config.processing;

    let on_disk = ctx
        .mp3_path(current)
        .filter(|p| p.is_file())
        .or_else(|| disk.and_then(|d| ctx.mp3_path(d)).filter(|p| p.is_file()));

    if let Some(path) = on_disk {
        if let Err(e) = codec.read(&path) {
            warn!("[Integrity] Corrupted file '{}', downloading again: {e}", path.display());
            if ctx.test_run() {
                info!("[Integrity] Test run, would remove '{}'", path.display());
            } else {
                std::fs::remove_file(&path)?;
            }
            reset_for_download(ctx, current)?;
            return Ok(Integrity::NeedsDownload);
        }

        let mut fused = fused_view(&current.video_id, Some(&*current), disk, None);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            fused.filename = Some(name.to_string());
        }
        if fused.has_required_info() {
            fused.status = Some(Status::Downloaded);
            ctx.apply_record(current, &fused)?;
            return Ok(Integrity::Ready(path));
        }
        debug!("[Integrity] '{}' is on disk but its information is incomplete", current.video_id);
        return Ok(Integrity::NeedsDownload);
    }

    match current.status_or_default() {
        Status::Unavailable if !cfg.retry_unavailable => return Ok(Integrity::Skip),
        Status::Private if !cfg.retry_private => return Ok(Integrity::Skip),
        _ => {}
    }

    if current.filename.is_some() {
        info!("[Integrity] '{}' lost its file, downloading again", current.video_id);
    }
    reset_for_download(ctx, current)?;
    Ok(Integrity::NeedsDownload)
}
