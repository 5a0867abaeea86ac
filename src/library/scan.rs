use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::sources::TagCodec;
use crate::types::VideoRecord;

pub const REASON_NOT_MP3: &str = "Not MP3";
pub const REASON_MALFORMED: &str = "Missing or malformed metadata";
pub const REASON_UNREADABLE: &str = "Corrupted or unreadable file";
pub const REASON_EMPTY: &str = "Empty data";
pub const REASON_NO_ID: &str = "Missing video ID in metadata";

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Sidecars without their mp3 are invalid
    pub force_mp3_presence: bool,
    pub remove_malformatted: bool,
    pub test_run: bool,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    /// Metadata embedded in every valid mp3, by video id
    pub infos: BTreeMap<String, VideoRecord>,
    /// Invalid files and why
    pub removed: Vec<(String, &'static str)>,
    pub kept_sidecars: Vec<PathBuf>,
}

/// Decodes the `metadata` blob of an mp3. A legacy `id` key stands for `video_id`.
pub fn parse_metadata_blob(blob: &str) -> Result<VideoRecord, &'static str> {
    if blob.trim().is_empty() {
        return Err(REASON_EMPTY);
    }
    let mut value: Value = serde_json::from_str(blob).map_err(|_| REASON_MALFORMED)?;
    let map = value.as_object_mut().ok_or(REASON_MALFORMED)?;
    if map.is_empty() {
        return Err(REASON_EMPTY);
    }
    if !map.contains_key("video_id") {
        if let Some(id) = map.remove("id") {
            map.insert("video_id".to_string(), id);
        }
    }
    let has_id = map.get("video_id").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    if !has_id {
        return Err(REASON_NO_ID);
    }
    if !map.get("filename").is_some_and(Value::is_string) {
        return Err(REASON_MALFORMED);
    }
    serde_json::from_value(value).map_err(|_| REASON_MALFORMED)
}

fn inspect_mp3(path: &Path, codec: &dyn TagCodec) -> Result<VideoRecord, &'static str> {
    let tags = codec.read(path).map_err(|e| {
        debug!("[Scan] '{}': {e}", path.display());
        REASON_UNREADABLE
    })?;
    let blob = tags.metadata.ok_or(REASON_MALFORMED)?;
    parse_metadata_blob(&blob)
}

/// Reads every file of the download directory and sorts valid mp3s from invalid files
pub fn scan_download_dir(dir: &Path, codec: &dyn TagCodec, opts: ScanOptions) -> Result<ScanReport, SyncError> {
    let mut report = ScanReport::default();
    if !dir.exists() {
        warn!("[Scan] Download directory does not exist: '{}'", dir.display());
        return Ok(report);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut invalid = Vec::new();
    for path in files {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let verdict = match ext.as_str() {
            "lrc" | "png" => {
                if opts.force_mp3_presence && !path.with_extension("mp3").is_file() {
                    Err(REASON_NOT_MP3)
                } else {
                    report.kept_sidecars.push(path.clone());
                    continue;
                }
            }
            "mp3" => inspect_mp3(&path, codec),
            _ => Err(REASON_NOT_MP3),
        };

        match verdict {
            Ok(mut record) => {
                let file_name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
                if file_name.is_some() {
                    record.filename = file_name;
                }
                if let Some(previous) = report.infos.get(&record.video_id) {
                    warn!(
                        "[Scan] '{}' already found in '{}'",
                        record.video_id,
                        previous.filename.as_deref().unwrap_or("?")
                    );
                }
                report.infos.insert(record.video_id.clone(), record);
            }
            Err(reason) => invalid.push((path, reason)),
        }
    }

    for (path, reason) in invalid {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        warn!("[Scan] Invalid file '{name}': {reason}");
        if opts.remove_malformatted && !opts.test_run {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("[Scan] Could not remove '{name}': {e}");
            }
        }
        report.removed.push((name, reason));
    }

    info!(
        "[Scan] {} valid mp3, {} sidecars, {} invalid files",
        report.infos.len(),
        report.kept_sidecars.len(),
        report.removed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{AudioTags, TagUpdate};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves metadata blobs by file name, reads of unknown mp3s fail
    struct BlobCodec(HashMap<String, Option<String>>);

    impl TagCodec for BlobCodec {
        fn read(&self, path: &Path) -> Result<AudioTags, SyncError> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            match self.0.get(&name) {
                Some(blob) => Ok(AudioTags { metadata: blob.clone(), ..Default::default() }),
                None => Err(SyncError::AudioTag("unreadable".to_string())),
            }
        }
        fn write(&self, _: &Path, _: &TagUpdate) -> Result<(), SyncError> {
            Ok(())
        }
        fn cover(&self, _: &Path) -> Result<Option<Vec<u8>>, SyncError> {
            Ok(None)
        }
    }

    #[test]
    fn test_parse_blob_reasons() {
        assert_eq!(parse_metadata_blob(""), Err(REASON_EMPTY));
        assert_eq!(parse_metadata_blob("{}"), Err(REASON_EMPTY));
        assert_eq!(parse_metadata_blob("[1]"), Err(REASON_MALFORMED));
        assert_eq!(parse_metadata_blob(r#"{"title": "x"}"#), Err(REASON_NO_ID));
        assert_eq!(parse_metadata_blob(r#"{"video_id": "a"}"#), Err(REASON_MALFORMED));
        let legacy = parse_metadata_blob(r#"{"id": "a", "filename": "A.mp3", "title": "A"}"#).unwrap();
        assert_eq!(legacy.video_id, "a");
        assert_eq!(legacy.title.as_deref(), Some("A"));
    }

    #[test]
    fn test_scan_classifies_and_removes() {
        let dir = TempDir::new().unwrap();
        for name in ["good.mp3", "good.lrc", "orphan.png", "notes.txt", "broken.mp3", "bare.mp3"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let codec = BlobCodec(HashMap::from([
            ("good.mp3".to_string(), Some(r#"{"video_id": "g", "filename": "old.mp3"}"#.to_string())),
            ("bare.mp3".to_string(), None),
        ]));
        let opts = ScanOptions { force_mp3_presence: true, remove_malformatted: true, test_run: false };

        let report = scan_download_dir(dir.path(), &codec, opts).unwrap();
        assert_eq!(report.infos.len(), 1);
        assert_eq!(report.infos["g"].filename.as_deref(), Some("good.mp3"));
        assert_eq!(report.kept_sidecars, vec![dir.path().join("good.lrc")]);
        assert_eq!(
            report.removed,
            vec![
                ("bare.mp3".to_string(), REASON_MALFORMED),
                ("broken.mp3".to_string(), REASON_UNREADABLE),
                ("notes.txt".to_string(), REASON_NOT_MP3),
                ("orphan.png".to_string(), REASON_NOT_MP3),
            ]
        );
        assert!(!dir.path().join("notes.txt").exists());
        assert!(dir.path().join("good.mp3").exists());
    }

    #[test]
    fn test_scan_test_run_keeps_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let codec = BlobCodec(HashMap::new());
        let opts = ScanOptions { force_mp3_presence: false, remove_malformatted: true, test_run: true };
        let report = scan_download_dir(dir.path(), &codec, opts).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(dir.path().join("notes.txt").exists());
    }
}
