use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::database::Store;
use crate::errors::SyncError;
use crate::library::scan::ScanReport;
use crate::lyrics::LyricsQueryBuilder;
use crate::remix::SongQueryCleaner;
use crate::sources::{LyricsSearch, SegmentLookup, Services, ThumbnailSource, VideoSource};
use crate::types::{Status, VideoPatch, VideoRecord};

use self::integrity::Integrity;
use self::stats::{format_duration, RunStats, Summary};

pub mod album;
pub mod download;
pub mod integrity;
pub mod lyrics;
pub mod metadata;
pub mod sponsor;
pub mod stats;
pub mod tags;
pub mod thumbnail;

#[cfg(test)]
pub mod testing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Integrity,
    Download,
    YtInfo,
    Sponsor,
    Remix,
    Lyrics,
    Thumbnail,
    Tags,
    Album,
    Metadata,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Integrity => "integrity",
            Stage::Download => "download",
            Stage::YtInfo => "yt-info",
            Stage::Sponsor => "sponsor",
            Stage::Remix => "remix",
            Stage::Lyrics => "lyrics",
            Stage::Thumbnail => "thumbnail",
            Stage::Tags => "tags",
            Stage::Album => "album",
            Stage::Metadata => "metadata",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a stage may read, shared by the whole run
pub struct Context<'a> {
    pub store: &'a Store,
    pub config: &'a Config,
    pub classifier: &'a Classifier,
    pub queries: &'a LyricsQueryBuilder,
    pub cleaner: &'a SongQueryCleaner,
    pub dir: &'a Path,
}

impl<'a> Context<'a> {
    /// True when nothing may be written to the filesystem
    pub fn test_run(&self) -> bool {
        self.config.processing.test_run || self.store.is_test_run()
    }

    /// Writes what `patch` changes in `current` and keeps `current` in sync with the store
    pub fn apply(&self, current: &mut VideoRecord, patch: VideoPatch) -> Result<bool, SyncError> {
        let patch = patch.minus(current)?;
        if patch.is_empty() {
            return Ok(false);
        }
        self.store.update(&current.video_id, &patch)?;
        patch.apply_to(current)?;
        Ok(true)
    }

    /// Writes every difference between `current` and `new`
    pub fn apply_record(&self, current: &mut VideoRecord, new: &VideoRecord) -> Result<bool, SyncError> {
        let patch = current.diff(new)?;
        self.apply(current, patch)
    }

    pub fn mp3_path(&self, record: &VideoRecord) -> Option<PathBuf> {
        record.filename.as_ref().map(|f| self.dir.join(f))
    }
}

struct VideoRun<'s> {
    stats: &'s mut RunStats,
    video_id: String,
    failed: bool,
}

impl<'s> VideoRun<'s> {
    /// Runs one stage, logging its failure instead of propagating it
    async fn stage<T, F>(&mut self, stage: Stage, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let ok = result.is_ok();
        self.stats.record_stage(stage, start.elapsed(), ok);
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("[{stage}] '{}': {e}", self.video_id);
                self.failed = true;
                None
            }
        }
    }
}

/// Runs every stage for one video. Returns whether it was skipped and whether a stage failed.
async fn process_video<V, S, L, T>(
    ctx: &Context<'_>,
    services: &Services<V, S, L, T>,
    stats: &mut RunStats,
    video_id: &str,
    disk: Option<&VideoRecord>,
) -> Result<(bool, bool), SyncError>
where
    V: VideoSource,
    S: SegmentLookup,
    L: LyricsSearch,
    T: ThumbnailSource,
{
    let Some(mut current) = ctx.store.get(video_id)? else {
        warn!("[Pipeline] '{video_id}' vanished from the store");
        return Ok((true, false));
    };
    let cfg = &ctx.config.processing;
    let mut run = VideoRun { stats, video_id: video_id.to_string(), failed: false };

    let integrity = run
        .stage(Stage::Integrity, async {
            integrity::check(ctx, services.codec.as_ref(), &mut current, disk)
        })
        .await;
    let path = match integrity {
        Some(Integrity::Ready(path)) => path,
        Some(Integrity::NeedsDownload) => {
            let downloaded = run
                .stage(
                    Stage::Download,
                    download::download(ctx, &services.videos, services.codec.as_ref(), &mut current),
                )
                .await;
            match downloaded.flatten() {
                Some(path) => path,
                None => return Ok((false, run.failed)),
            }
        }
        Some(Integrity::Skip) => {
            debug!("[Pipeline] Skipping '{video_id}' ({})", current.status_or_default());
            return Ok((true, false));
        }
        None => return Ok((false, true)),
    };

    if current.recompute_yt_info == Some(true) || cfg.force_recompute_yt_info {
        run.stage(Stage::YtInfo, download::refresh_info(ctx, &services.videos, &mut current))
            .await;
    }
    if cfg.use_sponsorblock {
        run.stage(
            Stage::Sponsor,
            sponsor::run(ctx, &services.segments, services.cutter.as_ref(), &mut current, &path),
        )
        .await;
    }
    if cfg.get_remix_of {
        run.stage(Stage::Remix, async { lyrics::resolve_remix(ctx, &mut current) })
            .await;
    }
    if cfg.get_lyrics {
        run.stage(
            Stage::Lyrics,
            lyrics::run(ctx, &services.lyrics, services.cutter.as_ref(), &mut current, &path),
        )
        .await;
    }
    if cfg.get_thumbnail {
        run.stage(
            Stage::Thumbnail,
            thumbnail::run(ctx, &services.thumbnails, services.codec.as_ref(), &mut current, &path),
        )
        .await;
    }
    if cfg.add_tags {
        run.stage(Stage::Tags, async { tags::run(ctx, services.codec.as_ref(), &mut current, &path) })
            .await;
    }
    if cfg.add_album {
        run.stage(Stage::Album, async { album::run(ctx, services.codec.as_ref(), &mut current, &path) })
            .await;
    }
    if cfg.embed_metadata {
        run.stage(Stage::Metadata, async {
            metadata::run(ctx, services.codec.as_ref(), &current, &path)
        })
        .await;
    }

    Ok((false, run.failed))
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {prefix:.bold}▕{bar:40.blue}▏{pos}/{len} {wide_msg}")
    {
        pb.set_style(style.progress_chars("█▓▒░  "));
    }
    pb.set_prefix("sync");
    pb
}

/// Processes every tracked video in store order, one at a time
pub async fn process_all<V, S, L, T>(
    ctx: &Context<'_>,
    services: &Services<V, S, L, T>,
    disk: &ScanReport,
) -> Result<RunStats, SyncError>
where
    V: VideoSource,
    S: SegmentLookup,
    L: LyricsSearch,
    T: ThumbnailSource,
{
    let ids = ctx.store.list_tracked(ctx.config.processing.include_non_downloaded())?;
    info!("[Pipeline] {} videos to process", ids.len());

    let mut stats = RunStats::default();
    let pb = progress_bar(ids.len());
    for (i, video_id) in ids.iter().enumerate() {
        pb.set_message(video_id.clone());
        let start = Instant::now();
        let (skipped, failed) =
            match process_video(ctx, services, &mut stats, video_id, disk.infos.get(video_id)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("[Pipeline] '{video_id}': {e}");
                    (false, true)
                }
            };
        stats.record_video(start.elapsed(), skipped, failed);
        pb.inc(1);

        if let Some(eta) = stats.eta(ids.len() - i - 1) {
            debug!("[Pipeline] {}/{} done, ETA {}", i + 1, ids.len(), format_duration(eta));
        }
    }
    pb.finish_and_clear();
    Ok(stats)
}

/// Library-wide counts for the end-of-run summary
pub fn summarize(store: &Store, disk: &ScanReport) -> Result<Summary, SyncError> {
    let db_ids: HashSet<String> = store.list_tracked(true)?.into_iter().collect();
    let non_downloaded = store
        .status_counts()?
        .into_iter()
        .filter(|(status, _)| *status != Status::Downloaded)
        .map(|(_, n)| n)
        .sum();

    Ok(Summary {
        db_ids: db_ids.len(),
        dir_ids: disk.infos.len(),
        non_downloaded,
        files_not_in_db: disk.infos.keys().filter(|id| !db_ids.contains(*id)).count(),
        invalid_files: disk.removed.len(),
    })
}
