use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::text::cached_regex;

/// One synchronized line on the timeline, in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Triplet {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Triplet {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self { start, end, text: text.into() }
    }
}

/// Window given to a line whose end cannot be inferred
const DEFAULT_LINE_WINDOW: f64 = 5.0;
const TEMPO_EPSILON: f64 = 0.001;

static LRC_STAMP: OnceLock<Option<Regex>> = OnceLock::new();
static SRT_ARROW: OnceLock<Option<Regex>> = OnceLock::new();
static VTT_HEADER: OnceLock<Option<Regex>> = OnceLock::new();
static CUE_TIMES: OnceLock<Option<Regex>> = OnceLock::new();
static BLANK_LINE: OnceLock<Option<Regex>> = OnceLock::new();

fn lrc_stamp() -> Option<&'static Regex> {
    cached_regex(&LRC_STAMP, r"\[(\d{1,2}:\d{2}(?:\.\d{1,3})?)\]")
}

fn srt_arrow() -> Option<&'static Regex> {
    cached_regex(&SRT_ARROW, r"\d{2}:\d{2}:\d{2}[.,]\d{3}\s*-->\s*\d{2}:\d{2}:\d{2}[.,]\d{3}")
}

fn vtt_header() -> Option<&'static Regex> {
    cached_regex(&VTT_HEADER, r"(?im)^\s*WEBVTT")
}

fn is_match(re: Option<&Regex>, text: &str) -> bool {
    re.is_some_and(|re| re.is_match(text))
}

/// Parses `mm:ss(.xx)` / `hh:mm:ss(.xx)` / `hh:mm:ss,xxx` into seconds
pub fn parse_timestamp(ts: &str) -> Option<f64> {
    let ts = ts.trim().replace(',', ".");
    let parts: Vec<&str> = ts.split(':').collect();
    match parts.as_slice() {
        [mm, ss] => Some(mm.parse::<u32>().ok()? as f64 * 60.0 + ss.parse::<f64>().ok()?),
        [hh, mm, ss] => Some(
            hh.parse::<u32>().ok()? as f64 * 3600.0
                + mm.parse::<u32>().ok()? as f64 * 60.0
                + ss.parse::<f64>().ok()?,
        ),
        _ => ts.parse().ok(),
    }
}

/// `[mm:ss.cc]`, or `[hh:mm:ss.cc]` from one hour on
pub fn format_timestamp(seconds: f64) -> String {
    let total_centis = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = total_centis / 360_000;
    let minutes = (total_centis / 6_000) % 60;
    let secs = (total_centis / 100) % 60;
    let centis = total_centis % 100;
    if hours > 0 {
        format!("[{hours:02}:{minutes:02}:{secs:02}.{centis:02}]")
    } else {
        format!("[{minutes:02}:{secs:02}.{centis:02}]")
    }
}

fn json_triplets(text: &str) -> Option<Vec<(f64, Option<f64>, String)>> {
    let Value::Array(items) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };
    if items.is_empty() {
        return None;
    }

    fn as_text(v: &Value) -> String {
        match v {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    items
        .iter()
        .map(|item| match item.as_array()?.as_slice() {
            [s, t] => Some((s.as_f64()?, None, as_text(t))),
            [s, e, t] => Some((s.as_f64()?, Some(e.as_f64()?), as_text(t))),
            _ => None,
        })
        .collect()
}

/// True for LRC, SRT/VTT and JSON `[start, (end,) text]` payloads
pub fn is_synchronized(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    is_match(lrc_stamp(), text)
        || is_match(srt_arrow(), text)
        || is_match(vtt_header(), text)
        || json_triplets(text).is_some()
}

/// Every `[stamp]` of a line yields one entry sharing the text after the last stamp
pub fn parse_lrc(text: &str) -> Vec<(f64, String)> {
    let Some(re) = lrc_stamp() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for line in text.lines() {
        let stamps: Vec<_> = re.captures_iter(line).collect();
        let Some(last) = stamps.last().and_then(|c| c.get(0)) else {
            continue;
        };
        let lyric = line[last.end()..].trim().to_string();
        for cap in &stamps {
            if let Some(t) = cap.get(1).and_then(|m| parse_timestamp(m.as_str())) {
                out.push((t, lyric.clone()));
            }
        }
    }
    out
}

fn line_end(start: f64, file_duration: f64) -> f64 {
    if file_duration > start {
        file_duration
    } else {
        start + DEFAULT_LINE_WINDOW
    }
}

fn triplets_from_lrc(text: &str, file_duration: f64) -> Vec<Triplet> {
    let pairs = parse_lrc(text);
    pairs
        .iter()
        .enumerate()
        .map(|(i, (start, lyric))| {
            let end = match pairs.get(i + 1) {
                Some((next, _)) => *next,
                None => line_end(*start, file_duration),
            };
            Triplet::new(*start, end, lyric.clone())
        })
        .collect()
}

/// SRT / VTT cues: blocks separated by blank lines, the time line among the first three
fn triplets_from_cues(text: &str) -> Vec<Triplet> {
    let (Some(times), Some(blank)) = (
        cached_regex(
            &CUE_TIMES,
            r"(\d{1,2}:\d{2}:\d{2}[.,]\d{1,3})\s*-->\s*(\d{1,2}:\d{2}:\d{2}[.,]\d{1,3})",
        ),
        cached_regex(&BLANK_LINE, r"\n\s*\n"),
    ) else {
        return Vec::new();
    };

    let normalized = text.replace("\r\n", "\n");
    let mut out = Vec::new();
    for block in blank.split(normalized.trim()) {
        let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let Some(idx) = lines.iter().take(3).position(|l| times.is_match(l)) else {
            continue;
        };
        let Some(caps) = times.captures(lines[idx]) else {
            continue;
        };
        let start = caps.get(1).and_then(|m| parse_timestamp(m.as_str()));
        let end = caps.get(2).and_then(|m| parse_timestamp(m.as_str()));
        if let (Some(start), Some(end)) = (start, end) {
            out.push(Triplet::new(start, end, lines[idx + 1..].join(" ")));
        }
    }
    out
}

/// JSON first, then SRT / VTT cues, then LRC
pub fn parse_triplets(text: &str, file_duration: f64) -> Vec<Triplet> {
    if let Some(items) = json_triplets(text) {
        return items
            .into_iter()
            .map(|(s, e, t)| Triplet::new(s, e.unwrap_or_else(|| line_end(s, file_duration)), t))
            .collect();
    }
    if is_match(vtt_header(), text) || is_match(srt_arrow(), text) {
        let cues = triplets_from_cues(text);
        if !cues.is_empty() {
            return cues;
        }
    }
    triplets_from_lrc(text, file_duration)
}

/// Sorted removed intervals with empty or inverted ones dropped
pub fn normalize_segments(skips: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut segments: Vec<(f64, f64)> = skips.iter().copied().filter(|(s, e)| e > s).collect();
    segments.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    segments
}

/// Seconds removed before `t`, or None when `t` lies inside a removed interval
fn removed_before(t: f64, segments: &[(f64, f64)]) -> Option<f64> {
    let mut acc = 0.0;
    for &(s, e) in segments {
        if t >= e {
            acc += e - s;
        } else if s <= t {
            return None;
        } else {
            break;
        }
    }
    Some(acc)
}

/// Moves triplets from the original timeline onto the cut one.
/// A line starting inside a removed interval is dropped; one ending inside collapses to its start.
pub fn apply_removed_segments(triplets: Vec<Triplet>, skips: &[(f64, f64)]) -> Vec<Triplet> {
    let segments = normalize_segments(skips);
    if segments.is_empty() {
        return triplets;
    }

    triplets
        .into_iter()
        .filter_map(|t| {
            let start = t.start - removed_before(t.start, &segments)?;
            let end = match removed_before(t.end, &segments) {
                Some(shift) => (t.end - shift).max(start),
                None => start,
            };
            Some(Triplet { start, end, text: t.text })
        })
        .collect()
}

/// Factor stretching the cut timeline onto the real file when the audio was re-timed.
/// None when no rescale is needed.
pub fn tempo_scale(original_duration: f64, skips: &[(f64, f64)], file_duration: f64) -> Option<f64> {
    if original_duration <= 0.0 {
        return None;
    }
    let removed: f64 = skips.iter().map(|(s, e)| (e - s).max(0.0)).sum();
    let expected_after = original_duration - removed;
    if expected_after <= 0.0 {
        return None;
    }
    let scale = file_duration / expected_after;
    ((scale - 1.0).abs() > TEMPO_EPSILON).then_some(scale)
}

/// Canonical LRC: sorted, exact `(time, text)` duplicates removed
pub fn compose_lrc(triplets: &[Triplet]) -> String {
    let mut entries: Vec<(f64, &str)> = triplets.iter().map(|t| (t.start.max(0.0), t.text.as_str())).collect();
    entries.sort_by(|a, b| a.0.total_cmp(&b.0));
    entries.dedup_by(|b, a| a.0 == b.0 && a.1 == b.1);
    entries
        .iter()
        .map(|(t, text)| format!("{}{}", format_timestamp(*t), text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns any lyrics payload into what gets written next to the mp3.
///
/// # Arguments
/// * `lyrics` - LRC, SRT, VTT, JSON triplets or plain text
/// * `skips` - intervals removed from the original audio
/// * `file_duration` - duration of the audio file as it is now
/// * `original_duration` - duration of the audio the timestamps were made for, if known
///
/// # Returns
/// Canonical LRC for synchronized payloads, the input untouched otherwise
pub fn sanitize_lyrics(
    lyrics: &str,
    skips: &[(f64, f64)],
    file_duration: f64,
    original_duration: Option<f64>,
) -> String {
    if lyrics.trim().is_empty() {
        return String::new();
    }
    if !is_synchronized(lyrics) {
        debug!("[Remap] Lyrics are not synchronized, keeping them as they are");
        return lyrics.to_string();
    }

    let mut triplets = parse_triplets(lyrics, file_duration);
    if triplets.is_empty() {
        warn!("[Remap] Synchronized lyrics could not be parsed, keeping the original text");
        return lyrics.to_string();
    }
    triplets.sort_by(|a, b| a.start.total_cmp(&b.start));

    let before = triplets.len();
    triplets = apply_removed_segments(triplets, skips);
    if triplets.len() != before {
        debug!("[Remap] Dropped {} lines inside removed segments", before - triplets.len());
    }

    if let Some(scale) = original_duration.and_then(|d| tempo_scale(d, skips, file_duration)) {
        debug!("[Remap] Applying tempo scale {scale:.4}");
        for t in triplets.iter_mut() {
            t.start *= scale;
            t.end *= scale;
        }
    }

    let lrc = compose_lrc(&triplets);
    info!("[Remap] Composed LRC with {} lines", lrc.lines().count());
    lrc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_after_removed_segment() {
        let triplets = vec![Triplet::new(10.0, 12.0, "a"), Triplet::new(20.0, 22.0, "b")];
        let mapped = apply_removed_segments(triplets, &[(5.0, 8.0)]);
        assert_eq!(mapped, vec![Triplet::new(7.0, 9.0, "a"), Triplet::new(17.0, 19.0, "b")]);
    }

    #[test]
    fn test_line_inside_segment_is_dropped() {
        let triplets = vec![Triplet::new(6.0, 7.0, "gone"), Triplet::new(9.0, 10.0, "kept")];
        let mapped = apply_removed_segments(triplets, &[(5.0, 8.0)]);
        assert_eq!(mapped, vec![Triplet::new(6.0, 7.0, "kept")]);
    }

    #[test]
    fn test_line_starting_on_segment_start_is_dropped() {
        let mapped = apply_removed_segments(vec![Triplet::new(5.0, 9.0, "x")], &[(5.0, 8.0)]);
        assert!(mapped.is_empty());
    }

    #[test]
    fn test_end_inside_segment_collapses_to_start() {
        let mapped = apply_removed_segments(vec![Triplet::new(3.0, 6.0, "x")], &[(5.0, 8.0)]);
        assert_eq!(mapped, vec![Triplet::new(3.0, 3.0, "x")]);
    }

    #[test]
    fn test_empty_skips_is_identity() {
        let triplets = vec![Triplet::new(1.0, 2.0, "a")];
        assert_eq!(apply_removed_segments(triplets.clone(), &[]), triplets);
    }

    #[test]
    fn test_tempo_scale() {
        let scale = tempo_scale(100.0, &[(0.0, 10.0)], 80.0).unwrap();
        assert!((scale - 80.0 / 90.0).abs() < 1e-9);
        assert_eq!(tempo_scale(100.0, &[(0.0, 10.0)], 90.0), None);
        assert_eq!(tempo_scale(0.0, &[], 80.0), None);
    }

    #[test]
    fn test_tempo_rescale_applied_to_output() {
        let lrc = "[00:45.00]mid\n[01:30.00]late";
        let out = sanitize_lyrics(lrc, &[(0.0, 10.0)], 80.0, Some(100.0));
        // 45-10=35 and 90-10=80, both scaled by 80/90
        assert_eq!(out, "[00:31.11]mid\n[01:11.11]late");
    }

    #[test]
    fn test_detection() {
        assert!(is_synchronized("[00:12.34]hello"));
        assert!(is_synchronized("1\n00:00:01,000 --> 00:00:02,000\nhi"));
        assert!(is_synchronized("WEBVTT\n\n00:01.000 --> 00:02.000\nhi"));
        assert!(is_synchronized("[[1.5, \"a\"], [2, 3, \"b\"]]"));
        assert!(!is_synchronized("just some words\nand more"));
        assert!(!is_synchronized("[1, 2, 3, 4]"));
    }

    #[test]
    fn test_plain_text_passthrough() {
        let plain = "no timestamps here";
        assert_eq!(sanitize_lyrics(plain, &[(1.0, 2.0)], 100.0, None), plain);
        assert_eq!(sanitize_lyrics("   ", &[], 100.0, None), "");
    }

    #[test]
    fn test_srt_blocks() {
        let srt = "1\n00:00:10,000 --> 00:00:12,000\nfirst\nline\n\n2\n00:00:20,500 --> 00:00:22,000\nsecond\n";
        let out = sanitize_lyrics(srt, &[(5.0, 8.0)], 0.0, None);
        assert_eq!(out, "[00:07.00]first line\n[00:17.50]second");
    }

    #[test]
    fn test_json_triplets() {
        let json = "[[10, 12, \"a\"], [20, \"b\"]]";
        let triplets = parse_triplets(json, 100.0);
        assert_eq!(triplets[0], Triplet::new(10.0, 12.0, "a"));
        assert_eq!(triplets[1], Triplet::new(20.0, 100.0, "b"));
    }

    #[test]
    fn test_multi_stamp_lines_and_dedup() {
        let lrc = "[00:10.00][00:30.00]chorus\n[00:10.00]chorus\n[00:20.00]verse";
        assert_eq!(
            sanitize_lyrics(lrc, &[], 60.0, None),
            "[00:10.00]chorus\n[00:20.00]verse\n[00:30.00]chorus"
        );
    }

    #[test]
    fn test_lrc_last_line_end() {
        let triplets = parse_triplets("[00:01.00]a\n[00:03.00]b", 0.0);
        assert_eq!(triplets[1].end, 8.0);
        let triplets = parse_triplets("[00:01.00]a\n[00:03.00]b", 60.0);
        assert_eq!(triplets[1].end, 60.0);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(7.0), "[00:07.00]");
        assert_eq!(format_timestamp(61.256), "[01:01.26]");
        assert_eq!(format_timestamp(3725.5), "[01:02:05.50]");
        assert_eq!(format_timestamp(-3.0), "[00:00.00]");
    }
}
