use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::database::Store;
use crate::errors::SyncError;
use crate::sources::manifest::manifest_ids;
use crate::types::{PlaylistEntry, VideoRecord};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Track mp3s of the download directory that the playlist does not list
    pub add_folder_files_not_in_list: bool,
}

#[derive(Debug, Default, PartialEq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    /// Tracked videos whose required information is all known
    pub complete: usize,
}

/// Union of what the store, the file on disk and the playlist know about one video.
/// The store wins whenever it holds a value.
pub fn fused_view(
    video_id: &str,
    stored: Option<&VideoRecord>,
    disk: Option<&VideoRecord>,
    entry: Option<&PlaylistEntry>,
) -> VideoRecord {
    let mut fused = stored.cloned().unwrap_or_else(|| VideoRecord::new(video_id));
    if let Some(disk) = disk {
        fused.fill_from(disk);
    }
    if let Some(entry) = entry {
        fused.fill_from(&entry.to_record());
    }
    fused
}

/// Inserts the videos the store does not know yet, then completes records
/// that the disk or the playlist can fill in.
pub fn add_new_ids(
    store: &Store,
    entries: &[PlaylistEntry],
    disk: &BTreeMap<String, VideoRecord>,
    opts: ReconcileOptions,
) -> Result<ReconcileReport, SyncError> {
    let mut report = ReconcileReport::default();
    let by_id: HashMap<&str, &PlaylistEntry> = entries.iter().map(|e| (e.video_id.as_str(), e)).collect();

    let mut candidates = manifest_ids(entries);
    if opts.add_folder_files_not_in_list {
        candidates.extend(disk.keys().filter(|id| !by_id.contains_key(id.as_str())).cloned());
    }

    for id in candidates {
        if store.contains(&id)? {
            continue;
        }
        let seed = fused_view(&id, None, disk.get(&id), by_id.get(id.as_str()).copied());
        if store.insert(&seed)? {
            debug!("[Reconcile] Added '{id}'");
            report.added.push(id);
        }
    }

    for id in store.list_tracked(true)? {
        let Some(current) = store.get(&id)? else {
            continue;
        };
        if current.has_required_info() {
            report.complete += 1;
            continue;
        }
        let fused = fused_view(&id, Some(&current), disk.get(&id), by_id.get(id.as_str()).copied());
        if fused.has_required_info() {
            if store.update_diff(&current, &fused)? {
                report.updated.push(id);
            }
            report.complete += 1;
        }
    }

    info!(
        "[Reconcile] {} added, {} completed, {} complete records",
        report.added.len(),
        report.updated.len(),
        report.complete
    );
    Ok(report)
}

/// Deletes the files and the row of every tracked video the playlist no longer lists.
/// File removal is best-effort.
pub fn remove_ids_not_in_list(
    store: &Store,
    entries: &[PlaylistEntry],
    dir: &Path,
    disk: &BTreeMap<String, VideoRecord>,
    test_run: bool,
) -> Result<Vec<String>, SyncError> {
    let listed: HashSet<String> = manifest_ids(entries).into_iter().collect();
    let mut removed = Vec::new();

    for id in store.list_tracked(true)? {
        if listed.contains(&id) {
            continue;
        }
        let filename = store
            .get(&id)?
            .and_then(|r| r.filename)
            .or_else(|| disk.get(&id).and_then(|r| r.filename.clone()));

        if let Some(filename) = filename {
            let mp3 = dir.join(&filename);
            for path in [mp3.clone(), mp3.with_extension("lrc"), mp3.with_extension("png")] {
                if !path.exists() {
                    continue;
                }
                if test_run {
                    info!("[Reconcile] Test run, would remove '{}'", path.display());
                } else if let Err(e) = std::fs::remove_file(&path) {
                    warn!("[Reconcile] Could not remove '{}': {e}", path.display());
                }
            }
        }

        store.delete(&id)?;
        info!("[Reconcile] Removed '{id}', no longer in the playlist");
        removed.push(id);
    }
    Ok(removed)
}
