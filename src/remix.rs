use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::patterns::PatternSet;
use crate::text::{cached_regex, collapse_whitespace, fold_ascii, title_case};

static FEAT: OnceLock<Option<Regex>> = OnceLock::new();
static NOT_QUERY: OnceLock<Option<Regex>> = OnceLock::new();

/// Normalizes song titles into search / comparison queries
#[derive(Debug, Clone, Default)]
pub struct SongQueryCleaner {
    unwanted: PatternSet,
}

impl SongQueryCleaner {
    pub fn new(unwanted: PatternSet) -> Self {
        Self { unwanted }
    }

    /// "Beyoncé - Halo (Official Video) feat. Someone" -> "Beyonce - Halo"
    pub fn clean(&self, query: &str) -> String {
        let mut q = fold_ascii(&query.to_lowercase());

        for pattern in self.unwanted.iter() {
            q = pattern.strip_from(&q);
        }

        if let Some(re) = cached_regex(&FEAT, r"(?i)\b(feat|ft)\.? [\w\s]+") {
            q = re.replace_all(&q, "").into_owned();
        }
        if let Some(re) = cached_regex(&NOT_QUERY, r"[^a-zA-Z0-9\s'-]") {
            q = re.replace_all(&q, "").into_owned();
        }

        let cleaned = title_case(&collapse_whitespace(&q));
        debug!("[Song Query] Cleaned '{query}' to '{cleaned}'");
        cleaned
    }
}

fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // lengths of the match ending at (i-1, j-1), rolling over i
    let mut prev = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut cur = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        prev = cur;
    }
    (best_i, best_j, best_k)
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        stack.push((alo, i, blo, j));
        stack.push((i + k, ahi, j + k, bhi));
    }
    total
}

/// Ratcliff/Obershelp similarity in [0, 1]: twice the matched characters over the total length
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemixMatch {
    pub video_id: String,
    pub confidence: f64,
}

/// Best corpus entry for `candidate`, if it reaches `threshold`.
/// `own_id` is excluded so a track never matches itself.
pub fn find_remix_of<'a, I>(
    cleaner: &SongQueryCleaner,
    candidate: &str,
    corpus: I,
    threshold: f64,
    own_id: Option<&str>,
) -> Option<RemixMatch>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let cleaned_candidate = cleaner.clean(candidate);
    let mut best: Option<RemixMatch> = None;

    for (id, title) in corpus {
        if Some(id) == own_id {
            continue;
        }
        let score = similarity(&cleaned_candidate, &cleaner.clean(title));
        if best.as_ref().map_or(true, |b| score > b.confidence) {
            best = Some(RemixMatch { video_id: id.to_string(), confidence: score });
        }
    }

    match best {
        Some(m) if m.confidence >= threshold => Some(m),
        other => {
            debug!("[Remix Of] No confident match for '{candidate}' (best={other:?})");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> SongQueryCleaner {
        SongQueryCleaner::new(PatternSet::from_lines(["official video", "re:\\(.*?remix.*?\\)"]).unwrap())
    }

    #[test]
    fn test_clean_song_query() {
        let c = cleaner();
        assert_eq!(c.clean("Beyoncé - Halo (Official Video)"), "Beyonce - Halo");
        assert_eq!(c.clean("Song Name feat. Someone Else"), "Song Name");
        assert_eq!(c.clean("Track (Club Remix)"), "Track");
        assert_eq!(c.clean("  weird   spacing!! "), "Weird Spacing");
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert_eq!(similarity("", ""), 1.0);
        // difflib: SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_best_match_above_threshold() {
        let c = SongQueryCleaner::default();
        let corpus = vec![("a", "Halo"), ("b", "Single Ladies"), ("self", "Halo Remix")];
        let m = find_remix_of(&c, "Halo Remix", corpus, 0.5, Some("self")).unwrap();
        assert_eq!(m.video_id, "a");
        assert!((m.confidence - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_match_below_threshold_is_none() {
        let c = SongQueryCleaner::default();
        // "abcdefghi" vs "abcdefghXY" -> 2*8/19 ~ 0.842, under 0.85
        let corpus = vec![("a", "abcdefghXY")];
        let score = similarity(&c.clean("abcdefghi"), &c.clean("abcdefghXY"));
        assert!(score > 0.8 && score < 0.85);
        assert_eq!(find_remix_of(&c, "abcdefghi", corpus, 0.85, None), None);
    }
}
