use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::errors::SyncError;
use crate::text::{sanitize_text, whole_word_regex};

/// A single line of a pattern file
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Whole-word phrase, stored in sanitized form next to its compiled matcher
    Literal { word: String, re: Regex },
    /// `re:`-prefixed expression, compiled case-insensitive
    Regex(Regex),
}

impl Pattern {
    /// Parses a pattern line. Returns Ok(None) for lines that normalize to nothing.
    pub fn parse(line: &str) -> Result<Option<Self>, SyncError> {
        let line = line.trim();
        if let Some(expr) = line.strip_prefix("re:") {
            let expr = expr.trim();
            if expr.is_empty() {
                return Ok(None);
            }
            let re = Regex::new(&format!("(?i){expr}"))
                .map_err(|e| SyncError::Config(format!("invalid regex '{expr}': {e}")))?;
            return Ok(Some(Pattern::Regex(re)));
        }

        let word = sanitize_text(line);
        if word.is_empty() {
            return Ok(None);
        }
        let re = whole_word_regex(&word)
            .map_err(|e| SyncError::Config(format!("invalid pattern '{word}': {e}")))?;
        Ok(Some(Pattern::Literal { word, re }))
    }

    /// `raw` is searched by regexes, `normalized` (sanitized) by literals
    pub fn matches(&self, raw: &str, normalized: &str) -> bool {
        match self {
            Pattern::Regex(re) => !raw.is_empty() && re.is_match(raw),
            Pattern::Literal { re, .. } => !normalized.is_empty() && re.is_match(normalized),
        }
    }

    /// Removes every occurrence of this pattern from `text` (case-insensitive)
    pub fn strip_from(&self, text: &str) -> String {
        match self {
            Pattern::Regex(re) | Pattern::Literal { re, .. } => re.replace_all(text, "").into_owned(),
        }
    }
}

/// Meaningful lines of a pattern file: no blanks, no `#` comments
pub fn pattern_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}

#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn from_lines<'a, I>(lines: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut patterns = Vec::new();
        for line in lines {
            if let Some(p) = Pattern::parse(line)? {
                patterns.push(p);
            }
        }
        Ok(Self { patterns })
    }

    /// Loads a pattern file. A missing file is an empty set, a bad regex is an error.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            debug!("[Patterns] No pattern file at '{}'", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let set = Self::from_lines(pattern_lines(&contents))
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        debug!("[Patterns] Loaded {} patterns from '{}'", set.len(), path.display());
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// True iff any pattern matches `text`
    pub fn matches(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let normalized = sanitize_text(text);
        self.patterns.iter().any(|p| p.matches(text, &normalized))
    }

    /// Literal patterns in their sanitized form
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().filter_map(|p| match p {
            Pattern::Literal { word, .. } => Some(word.as_str()),
            Pattern::Regex(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_whole_word() {
        let set = PatternSet::from_lines(["DJ"]).unwrap();
        assert!(set.matches("Live DJ set"));
        assert!(!set.matches("DJohn in concert"));
    }

    #[test]
    fn test_literal_carries_its_matcher() {
        let Some(Pattern::Literal { word, re }) = Pattern::parse("Daft Punk").unwrap() else {
            panic!("expected a literal pattern");
        };
        assert_eq!(word, "Daft Punk");
        assert!(re.is_match("Around The World Daft Punk"));
        assert!(!re.is_match("daft punks"));
    }

    #[test]
    fn test_regex_pattern() {
        let set = PatternSet::from_lines(["re:dj\\d+"]).unwrap();
        assert!(set.matches("dj42"));
        assert!(set.matches("Mixed by DJ7 tonight"));
        assert!(!set.matches("dj"));
    }

    #[test]
    fn test_literal_is_normalized() {
        let set = PatternSet::from_lines(["Beyoncé"]).unwrap();
        assert!(set.matches("beyonce - halo"));
        assert!(set.matches("BEYONCÉ live"));
    }

    #[test]
    fn test_empty_inputs_never_match() {
        let set = PatternSet::from_lines(["x", "re:.*"]).unwrap();
        assert!(!set.matches(""));
        let empty = PatternSet::from_lines(["   ", "..."]).unwrap();
        assert!(empty.is_empty());
        assert!(!empty.matches("anything"));
    }

    #[test]
    fn test_comments_and_blanks_are_skipped() {
        let contents = "# header\n\nnightcore\n  # indented comment\nre:sped ?up\n";
        let set = PatternSet::from_lines(pattern_lines(contents)).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.matches("Song (Sped Up)"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let set = PatternSet::load(Path::new("/nonexistent/patterns.txt")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_malformed_regex_is_config_error() {
        let err = PatternSet::from_lines(["re:(unclosed"]).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_strip_from() {
        let p = Pattern::parse("official video").unwrap().unwrap();
        assert_eq!(p.strip_from("song official video"), "song ");
        let r = Pattern::parse("re:\\(.*?\\)").unwrap().unwrap();
        assert_eq!(r.strip_from("song (lyrics)"), "song ");
    }
}
