use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tracing::info;

use super::Stage;

const ETA_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub ran: usize,
    pub failed: usize,
}

/// Timings and outcomes of one sync run
#[derive(Debug, Default)]
pub struct RunStats {
    pub stage_durations: BTreeMap<Stage, Duration>,
    pub stage_counts: BTreeMap<Stage, StageCounts>,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    recent: VecDeque<Duration>,
}

impl RunStats {
    pub fn record_stage(&mut self, stage: Stage, elapsed: Duration, ok: bool) {
        *self.stage_durations.entry(stage).or_default() += elapsed;
        let counts = self.stage_counts.entry(stage).or_default();
        counts.ran += 1;
        if !ok {
            counts.failed += 1;
        }
    }

    /// One video done. `failed` when at least one of its stages failed.
    pub fn record_video(&mut self, elapsed: Duration, skipped: bool, failed: bool) {
        if skipped {
            self.skipped += 1;
        } else if failed {
            self.failed += 1;
        } else {
            self.succeeded += 1;
        }
        self.recent.push_back(elapsed);
        if self.recent.len() > ETA_WINDOW {
            self.recent.pop_front();
        }
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    /// Remaining time for `remaining` videos, from the average of the last few
    pub fn eta(&self, remaining: usize) -> Option<Duration> {
        if self.recent.is_empty() {
            return None;
        }
        let total: Duration = self.recent.iter().sum();
        let avg = total / self.recent.len() as u32;
        Some(avg * remaining as u32)
    }
}

/// Library-wide figures printed at the end of a run
#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub db_ids: usize,
    pub dir_ids: usize,
    pub non_downloaded: usize,
    pub files_not_in_db: usize,
    pub invalid_files: usize,
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

pub fn log_summary(summary: &Summary, stats: &RunStats) {
    info!("========== Sync summary ==========");
    info!(
        "Videos: {} ok, {} skipped, {} with errors",
        stats.succeeded, stats.skipped, stats.failed
    );
    info!(
        "Library: {} ids in DB, {} in the download directory, {} not downloaded",
        summary.db_ids, summary.dir_ids, summary.non_downloaded
    );
    if summary.files_not_in_db > 0 || summary.invalid_files > 0 {
        info!(
            "Files: {} not tracked in DB, {} invalid",
            summary.files_not_in_db, summary.invalid_files
        );
    }
    for (stage, elapsed) in &stats.stage_durations {
        let counts = stats.stage_counts.get(stage).copied().unwrap_or_default();
        info!(
            "  {:<10} {:>10} ({} runs, {} failed)",
            stage.as_str(),
            format_duration(*elapsed),
            counts.ran,
            counts.failed
        );
    }
}
