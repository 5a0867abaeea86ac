use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::lyrics::remap::sanitize_lyrics;
use crate::lyrics::{read_lrc, remove_lrc, write_lrc};
use crate::remix::find_remix_of;
use crate::sources::{AudioCutter, LyricsSearch};
use crate::types::{Column, VideoPatch, VideoRecord};

use super::Context;

/// Links a remix to the original it was made from, using the title hint in `remix_of`
pub fn resolve_remix(ctx: &Context<'_>, current: &mut VideoRecord) -> Result<(), SyncError> {
    let cfg = &ctx.config.processing;
    let Some(hint) = current.remix_of.clone().filter(|h| !h.trim().is_empty()) else {
        return Ok(());
    };
    if current.recompute_remix_of != Some(true) && !cfg.force_recompute_remix_of {
        return Ok(());
    }
    if hint != current.video_id && ctx.store.contains(&hint)? {
        debug!("[Remix Of] '{}' already points at '{hint}'", current.video_id);
        return Ok(());
    }

    let titles = ctx.store.titles()?;
    let corpus = titles.iter().map(|(id, title)| (id.as_str(), title.as_str()));
    let patch = match find_remix_of(
        ctx.cleaner,
        &hint,
        corpus,
        cfg.remix_confidence_threshold,
        Some(current.video_id.as_str()),
    ) {
        Some(found) => {
            info!(
                "[Remix Of] '{}' is a remix of '{}' ({:.2})",
                current.video_id, found.video_id, found.confidence
            );
            VideoPatch::new()
                .set(Column::RemixOf, found.video_id)
                .set(Column::RemixConfidence, found.confidence)
                .set(Column::RecomputeRemixOf, false)
        }
        None => VideoPatch::new().set(Column::RecomputeRemixOf, false),
    };
    ctx.apply(current, patch)?;
    Ok(())
}

fn non_empty(text: &Option<String>) -> Option<String> {
    text.clone().filter(|t| !t.trim().is_empty())
}

/// Duration of the audio as it is on disk now
fn file_duration(cutter: &dyn AudioCutter, current: &VideoRecord, path: &Path) -> f64 {
    match cutter.duration(path) {
        Ok(d) => d,
        Err(e) => {
            debug!("[Lyrics] Could not probe '{}': {e}", path.display());
            let removed = current.removed_segments_duration.unwrap_or(0.0).max(0.0);
            (current.duration.unwrap_or(0.0) - removed).max(0.0)
        }
    }
}

/// Writes the `.lrc` next to the mp3 and records its contents
fn store_lyrics(
    ctx: &Context<'_>,
    current: &mut VideoRecord,
    path: &Path,
    lyrics: String,
    mut patch: VideoPatch,
) -> Result<(), SyncError> {
    if !lyrics.is_empty() {
        if ctx.test_run() {
            info!("[Lyrics] Test run, would write lyrics for '{}'", current.video_id);
        } else {
            write_lrc(path, &lyrics)?;
        }
        patch.put(Column::Lyrics, lyrics);
    }
    ctx.apply(current, patch)?;
    Ok(())
}

/// Finds, remaps and writes lyrics for one video
pub async fn run<L: LyricsSearch>(
    ctx: &Context<'_>,
    search: &L,
    cutter: &dyn AudioCutter,
    current: &mut VideoRecord,
    path: &Path,
) -> Result<(), SyncError> {
    let cfg = &ctx.config.processing;
    let force = cfg.force_recompute_lyrics;
    let skips = current.skips.clone().unwrap_or_default();

    if current.lyrics_retries.unwrap_or(0) > cfg.max_lyrics_retries {
        ctx.apply(current, VideoPatch::new().set(Column::TryLyricsIfNot, false))?;
    }

    if current.remove_lyrics == Some(true) {
        if ctx.test_run() {
            info!("[Lyrics] Test run, would remove lyrics of '{}'", current.video_id);
        } else if remove_lrc(path)? {
            info!("[Lyrics] Removed lyrics of '{}'", current.video_id);
        }
        let patch = VideoPatch::new().set(Column::RemoveLyrics, false).set(Column::Lyrics, Value::Null);
        ctx.apply(current, patch)?;
        return Ok(());
    }

    let has_lrc = read_lrc(path).is_some();

    if let Some(original_id) = current.remix_of.clone() {
        if !has_lrc || force {
            if let Some(original) = ctx.store.get(&original_id)? {
                let raw = non_empty(&original.subtitles)
                    .or_else(|| non_empty(&original.syncedlyrics))
                    .or_else(|| non_empty(&original.auto_subs));
                if let Some(raw) = raw {
                    debug!("[Lyrics] Reusing lyrics of '{original_id}' for remix '{}'", current.video_id);
                    let duration = file_duration(cutter, current, path);
                    let lyrics = sanitize_lyrics(&raw, &skips, duration, original.duration);
                    return store_lyrics(ctx, current, path, lyrics, VideoPatch::new());
                }
            }
        }
    }

    if has_lrc && !force {
        return Ok(());
    }
    if current.try_lyrics_if_not == Some(false) && !force {
        return Ok(());
    }

    let mut patch = VideoPatch::new().set(Column::LyricsRetries, current.lyrics_retries.unwrap_or(0) + 1);
    let mut raw = non_empty(&current.subtitles);
    if raw.is_none() {
        let query = ctx.queries.build(current.title_or_empty(), current.uploader_or_empty());
        let found = match search.search(&query).await {
            Ok(found) => found.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!("[Lyrics] Search failed for '{query}': {e}");
                None
            }
        };
        if let Some(found) = &found {
            patch.put(Column::Syncedlyrics, found.as_str());
        }
        patch.put(Column::SyncedlyricsQuery, query);
        raw = found;
    }
    let raw = raw.or_else(|| non_empty(&current.auto_subs));

    let Some(raw) = raw else {
        debug!("[Lyrics] Nothing found for '{}'", current.video_id);
        ctx.apply(current, patch)?;
        return Ok(());
    };

    let duration = file_duration(cutter, current, path);
    let lyrics = sanitize_lyrics(&raw, &skips, duration, None);
    store_lyrics(ctx, current, path, lyrics, patch)
}
