use std::io::Write;
use std::path::Path;

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::errors::SyncError;
use crate::types::{ApiEntity, PlaylistEntry};

/// Reads the playlist manifest, a JSON list of playlist items
pub fn load_manifest(path: &Path) -> Result<Vec<PlaylistEntry>, SyncError> {
    let contents = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;
    let items = value
        .as_array()
        .ok_or_else(|| SyncError::Parse(format!("'{}' is not a JSON list", path.display())))?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match PlaylistEntry::parse(item) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("[Manifest] Skipping entry: {e}"),
        }
    }
    debug!("[Manifest] Loaded {} entries from '{}'", entries.len(), path.display());
    Ok(entries)
}

/// Writes the manifest atomically: readers see the old file or the new one, never a partial one
pub fn dump_manifest(path: &Path, entries: &[PlaylistEntry]) -> Result<(), SyncError> {
    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(d) => d,
        None => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let list: Vec<Value> = entries.iter().map(ApiEntity::serialize).collect();
    // dropped (and deleted) on any early return
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, &list)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| SyncError::Io(e.error))?;

    debug!("[Manifest] Wrote {} entries to '{}'", entries.len(), path.display());
    Ok(())
}

/// Video ids of the manifest in playlist order, duplicates removed
pub fn manifest_ids(entries: &[PlaylistEntry]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    entries
        .iter()
        .filter(|e| seen.insert(e.video_id.as_str()))
        .map(|e| e.video_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str) -> PlaylistEntry {
        PlaylistEntry { video_id: id.to_string(), title: Some(format!("t{id}")), ..Default::default() }
    }

    #[test]
    fn test_dump_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("JSON").join("playlist.json");
        dump_manifest(&path, &[entry("a"), entry("b")]).unwrap();
        let loaded = load_manifest(&path).unwrap();
        assert_eq!(loaded, vec![entry("a"), entry("b")]);
        // no temp file left behind
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_and_malformed_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(load_manifest(&dir.path().join("none.json")).is_err());
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(load_manifest(&path), Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_ids_deduplicated_in_order() {
        assert_eq!(manifest_ids(&[entry("b"), entry("a"), entry("b")]), vec!["b", "a"]);
    }
}
