pub mod remap;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::SyncError;
use crate::patterns::PatternSet;
use crate::remix::SongQueryCleaner;
use crate::text::{contains_whole_word, sanitize_text};

pub fn lrc_path_for(mp3: &Path) -> PathBuf {
    mp3.with_extension("lrc")
}

/// Contents of the `.lrc` next to `mp3`, None when missing or blank
pub fn read_lrc(mp3: &Path) -> Option<String> {
    let path = lrc_path_for(mp3);
    match std::fs::read_to_string(&path) {
        Ok(txt) if !txt.trim().is_empty() => Some(txt),
        Ok(_) => {
            warn!("[Lyrics] Empty .lrc file '{}'", path.display());
            None
        }
        Err(_) => None,
    }
}

pub fn write_lrc(mp3: &Path, lyrics: &str) -> Result<(), SyncError> {
    let path = lrc_path_for(mp3);
    std::fs::write(&path, lyrics)?;
    debug!("[Lyrics] Wrote '{}'", path.display());
    Ok(())
}

/// Removes the `.lrc` next to `mp3`. Returns whether a file was there.
pub fn remove_lrc(mp3: &Path) -> Result<bool, SyncError> {
    let path = lrc_path_for(mp3);
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    Ok(true)
}

/// Builds the text sent to the lyrics search provider
#[derive(Debug, Clone, Default)]
pub struct LyricsQueryBuilder {
    remix_markers: Vec<String>,
    trusted_artists: Vec<String>,
    cleaner: SongQueryCleaner,
}

impl LyricsQueryBuilder {
    /// `remix` patterns drop the uploader from the query (remixes are rarely uploaded by the artist)
    pub fn new(remix: &PatternSet, trusted: &PatternSet, cleaner: SongQueryCleaner) -> Self {
        Self {
            remix_markers: remix.literals().map(str::to_lowercase).collect(),
            trusted_artists: trusted.literals().map(str::to_string).collect(),
            cleaner,
        }
    }

    pub fn build(&self, title: &str, uploader: &str) -> String {
        let title_lc = title.to_lowercase();
        let artist_lc = uploader.to_lowercase();
        let mut query = format!("{title_lc} {artist_lc}");

        if self.remix_markers.iter().any(|m| query.contains(m.as_str())) {
            query = title_lc.clone();
        }
        if !artist_lc.is_empty() && title_lc.contains(&artist_lc) {
            query = title_lc.clone();
        }

        let sanitized_title = sanitize_text(title);
        let sanitized_artist = sanitize_text(uploader);
        for trusted in &self.trusted_artists {
            if contains_whole_word(&sanitized_title, trusted)
                && !contains_whole_word(&sanitized_title, &sanitized_artist)
            {
                query = format!("{title_lc} {trusted}");
            }
        }

        self.cleaner.clean(&query)
    }
}
