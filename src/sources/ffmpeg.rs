use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::errors::SyncError;
use crate::lyrics::remap::normalize_segments;
use crate::sources::AudioCutter;

/// Cuts audio with ffmpeg, probes durations with ffprobe
#[derive(Debug, Clone)]
pub struct FfmpegCutter {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegCutter {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
    }
}

fn path_str(path: &Path) -> Result<&str, SyncError> {
    path.to_str()
        .ok_or_else(|| SyncError::AudioCut(format!("Invalid path: {}", path.display())))
}

/// Parts of `[0, duration]` that survive once `removed` is cut out
pub fn keep_segments(duration: f64, removed: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut keep = Vec::new();
    let mut cursor = 0.0;
    for (start, end) in normalize_segments(removed) {
        let start = start.clamp(0.0, duration);
        let end = end.clamp(0.0, duration);
        if start > cursor {
            keep.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < duration {
        keep.push((cursor, duration));
    }
    keep
}

/// Total length of `removed`; inverted segments count for nothing
pub fn removed_duration(removed: &[(f64, f64)]) -> f64 {
    normalize_segments(removed)
        .iter()
        .map(|(s, e)| (e - s).max(0.0))
        .sum()
}

/// `-filter_complex` graph trimming every kept part and concatenating them
pub fn filter_graph(keep: &[(f64, f64)]) -> String {
    let mut graph = String::new();
    for (i, (start, end)) in keep.iter().enumerate() {
        graph.push_str(&format!("[0:a]atrim=start={start:.3}:end={end:.3},asetpts=PTS-STARTPTS[a{i}];"));
    }
    for i in 0..keep.len() {
        graph.push_str(&format!("[a{i}]"));
    }
    graph.push_str(&format!("concat=n={}:v=0:a=1[out]", keep.len()));
    graph
}

impl AudioCutter for FfmpegCutter {
    fn duration(&self, path: &Path) -> Result<f64, SyncError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v", "error",
                "-show_entries", "format=duration",
                "-of", "default=noprint_wrappers=1:nokey=1",
                path_str(path)?,
            ])
            .output()
            .map_err(|e| SyncError::AudioCut(format!("Failed to execute ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(SyncError::AudioCut(format!("ffprobe exited with status: {}", output.status)));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<f64>()
            .map_err(|_| SyncError::AudioCut(format!("Unexpected ffprobe output: '{}'", text.trim())))
    }

    fn cut(&self, input: &Path, output: &Path, segments: &[(f64, f64)]) -> Result<f64, SyncError> {
        let duration = self.duration(input)?;
        let keep = keep_segments(duration, segments);
        if keep.is_empty() {
            return Err(SyncError::AudioCut("Segments cover the whole file".to_string()));
        }

        let status = Command::new(&self.ffmpeg)
            .args([
                "-v", "error",
                "-i", path_str(input)?,
                "-filter_complex", &filter_graph(&keep),
                "-map", "[out]",
                "-map_metadata", "0",
                "-codec:a", "libmp3lame",
                "-q:a", "0",
                "-y",
                path_str(output)?,
            ])
            .status()
            .map_err(|e| SyncError::AudioCut(format!("Failed to execute ffmpeg: {e}")))?;

        if !status.success() {
            return Err(SyncError::AudioCut(format!("ffmpeg exited with status: {status}")));
        }

        let removed = removed_duration(segments);
        debug!("[ffmpeg] Cut {removed:.2}s out of '{}'", input.display());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_segments_complement() {
        assert_eq!(
            keep_segments(100.0, &[(30.0, 40.0), (0.0, 5.0)]),
            vec![(5.0, 30.0), (40.0, 100.0)]
        );
        assert_eq!(keep_segments(100.0, &[(90.0, 120.0)]), vec![(0.0, 90.0)]);
        assert_eq!(keep_segments(10.0, &[]), vec![(0.0, 10.0)]);
    }

    #[test]
    fn test_removed_duration_ignores_inverted() {
        assert_eq!(removed_duration(&[(5.0, 8.0), (20.0, 10.0), (30.0, 31.5)]), 4.5);
    }

    #[test]
    fn test_filter_graph() {
        let graph = filter_graph(&[(0.0, 5.0), (8.0, 10.0)]);
        assert_eq!(
            graph,
            "[0:a]atrim=start=0.000:end=5.000,asetpts=PTS-STARTPTS[a0];\
             [0:a]atrim=start=8.000:end=10.000,asetpts=PTS-STARTPTS[a1];\
             [a0][a1]concat=n=2:v=0:a=1[out]"
        );
    }
}
