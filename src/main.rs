use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tracing::{error, info, warn};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::database::Store;
use crate::errors::SyncError;
use crate::library::reconcile::{add_new_ids, remove_ids_not_in_list, ReconcileOptions};
use crate::library::scan::{scan_download_dir, ScanOptions};
use crate::lyrics::LyricsQueryBuilder;
use crate::patterns::PatternSet;
use crate::pipeline::stats::log_summary;
use crate::pipeline::Context;
use crate::remix::SongQueryCleaner;
use crate::sources::ffmpeg::FfmpegCutter;
use crate::sources::id3_codec::Id3Codec;
use crate::sources::lrclib::Lrclib;
use crate::sources::manifest::{dump_manifest, load_manifest};
use crate::sources::sponsorblock::SponsorBlock;
use crate::sources::thumbnail::HttpThumbnails;
use crate::sources::youtube::YoutubeApi;
use crate::sources::ytdlp::YtDlp;
use crate::sources::{http_client, PlaylistProvider, Services};

mod classifier;
mod config;
mod database;
mod errors;
mod library;
mod logging;
mod lyrics;
mod patterns;
mod pipeline;
mod remix;
mod sources;
mod text;
mod types;

#[derive(Parser, Debug)]
#[command(version, about = "Keeps a local MP3 library in sync with a YouTube playlist")]
struct PrgmArgs {
    /// Configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Decide everything but keep the database and the files untouched
    #[arg(long, global = true)]
    test_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile the playlist with the library and process every video
    Sync,

    /// Download the playlist entries into the manifest file
    FetchPlaylist {
        /// Overrides `processing.playlist_id`
        #[arg(long)]
        playlist_id: Option<String>,
    },

    /// Write a commented sample configuration
    InitConfig,

    /// Print the stored record of a video as JSON
    Show { video_id: String },

    /// Delete a video's files and its record
    Purge {
        video_id: String,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

fn open_store(config: &Config) -> Result<Store, SyncError> {
    Store::open(config.paths.db_path.as_deref(), config.processing.test_run)
}

async fn sync(config: &Config) -> Result<(), SyncError> {
    let cfg = &config.processing;
    let dir = config.paths.library_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| SyncError::PathCreationFailed(format!("{}: {e}", dir.display())))?;
    let store = open_store(config)?;

    let unwanted = PatternSet::load(&config.pattern_file(&config.patterns.unwanted_patterns_file))?;
    let remix = PatternSet::load(&config.pattern_file(&config.patterns.remix_patterns_file))?;
    let classifier = Classifier::load(
        &config.paths.tags_dir(),
        &config.pattern_file(&config.patterns.private_patterns_file),
        &config.pattern_file(&config.patterns.trusted_artists_file),
    )?;
    let cleaner = SongQueryCleaner::new(unwanted);
    let queries = LyricsQueryBuilder::new(&remix, classifier.trusted(), cleaner.clone());

    let scan_opts = ScanOptions {
        force_mp3_presence: cfg.force_mp3_presence,
        remove_malformatted: cfg.remove_malformatted,
        test_run: cfg.test_run,
    };
    let disk = scan_download_dir(&dir, &Id3Codec, scan_opts)?;
    info!("[Sync] {} valid files in '{}'", disk.infos.len(), dir.display());

    let manifest_path = &config.paths.playlist_videos_file;
    let entries = if manifest_path.exists() {
        load_manifest(manifest_path)?
    } else {
        warn!("[Sync] No manifest at '{}', run fetch-playlist first", manifest_path.display());
        Vec::new()
    };

    let reconcile_opts = ReconcileOptions { add_folder_files_not_in_list: cfg.add_folder_files_not_in_list };
    add_new_ids(&store, &entries, &disk.infos, reconcile_opts)?;
    if cfg.remove_no_longer_in_playlist {
        if entries.is_empty() {
            warn!("[Sync] Empty manifest, not removing anything");
        } else {
            let removed = remove_ids_not_in_list(&store, &entries, &dir, &disk.infos, cfg.test_run)?;
            info!("[Sync] {} videos no longer in the playlist", removed.len());
        }
    }

    let client = http_client(config.tools.http_timeout_secs)?;
    let services = Services {
        videos: YtDlp::new(config.tools.yt_dlp.clone(), client.clone()),
        segments: SponsorBlock::new(client.clone(), config.tools.sponsorblock_api.clone()),
        lyrics: Lrclib::new(client.clone(), config.tools.lrclib_api.clone()),
        thumbnails: HttpThumbnails::new(client),
        cutter: Box::new(FfmpegCutter::new(config.tools.ffmpeg.clone(), config.tools.ffprobe.clone())),
        codec: Box::new(Id3Codec),
    };

    let ctx = Context {
        store: &store,
        config,
        classifier: &classifier,
        queries: &queries,
        cleaner: &cleaner,
        dir: &dir,
    };
    let stats = pipeline::process_all(&ctx, &services, &disk).await?;
    let summary = pipeline::summarize(&store, &disk)?;
    log_summary(&summary, &stats);
    Ok(())
}

async fn fetch_playlist(config: &Config, playlist_id: Option<String>) -> Result<(), SyncError> {
    let playlist_id = playlist_id
        .or_else(|| config.processing.playlist_id.clone())
        .ok_or_else(|| SyncError::Config("no playlist id given".to_string()))?;
    let api_key = config
        .tools
        .youtube_api_key
        .clone()
        .ok_or_else(|| SyncError::Config("tools.youtube_api_key is not set".to_string()))?;

    let api = YoutubeApi::new(http_client(config.tools.http_timeout_secs)?, api_key);
    let entries = api.fetch(&playlist_id).await?;
    if config.processing.test_run {
        info!("[Playlist] Test run, fetched {} entries, manifest left untouched", entries.len());
        return Ok(());
    }
    dump_manifest(&config.paths.playlist_videos_file, &entries)?;
    info!(
        "[Playlist] Wrote {} entries to '{}'",
        entries.len(),
        config.paths.playlist_videos_file.display()
    );
    Ok(())
}

fn show(config: &Config, video_id: &str) -> Result<(), SyncError> {
    let store = open_store(config)?;
    match store.get(video_id)? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("'{video_id}' is not tracked"),
    }
    Ok(())
}

fn purge(config: &Config, video_id: &str, yes: bool) -> Result<(), SyncError> {
    let store = open_store(config)?;
    let Some(record) = store.get(video_id)? else {
        println!("'{video_id}' is not tracked");
        return Ok(());
    };

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete '{}' ({video_id}) and its files?", record.title_or_empty()))
            .default(false)
            .interact()
            .map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))?;
        if !confirmed {
            return Ok(());
        }
    }

    if let Some(filename) = &record.filename {
        let mp3 = config.paths.library_dir().join(filename);
        for path in [mp3.with_extension("lrc"), mp3.with_extension("png"), mp3] {
            remove_artifact(&path, config.processing.test_run);
        }
    }
    store.delete(video_id)?;
    Ok(())
}

fn remove_artifact(path: &Path, test_run: bool) {
    if !path.exists() {
        return;
    }
    if test_run {
        info!("[Purge] Test run, would remove '{}'", path.display());
    } else if let Err(e) = std::fs::remove_file(path) {
        warn!("[Purge] Could not remove '{}': {e}", path.display());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = PrgmArgs::parse();

    if let Command::InitConfig = args.command {
        Config::create_sample(&args.config)?;
        println!("Sample configuration written to '{}'", args.config.display());
        return Ok(());
    }

    let mut config = Config::load(&args.config)?;
    config.processing.test_run |= args.test_run;
    logging::init_logging(&config.logging, &config.paths.logs_dir)?;

    let result = match args.command {
        Command::Sync => sync(&config).await,
        Command::FetchPlaylist { playlist_id } => fetch_playlist(&config, playlist_id).await,
        Command::Show { video_id } => show(&config, &video_id),
        Command::Purge { video_id, yes } => purge(&config, &video_id, yes),
        Command::InitConfig => Ok(()),
    };
    if let Err(e) = &result {
        error!("{e}");
    }
    Ok(result?)
}
