use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::Path;

use tracing::{debug, warn};

use crate::errors::SyncError;
use crate::patterns::{pattern_lines, Pattern, PatternSet};
use crate::text::sanitize_text;

/// Album a track is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Album {
    Public,
    Private,
}

impl Album {
    pub fn as_str(&self) -> &'static str {
        match self {
            Album::Public => "Public",
            Album::Private => "Private",
        }
    }
}

impl Display for Album {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct TagLine {
    negated: bool,
    pattern: Pattern,
}

#[derive(Debug, Clone)]
enum TagRule {
    /// `tag_<name>`: first matching line decides, `-` lines withhold the tag
    Presence(Vec<TagLine>),
    /// `notag_<name>`: tag applies when nothing matches
    Absence(PatternSet),
}

#[derive(Debug, Clone)]
struct TagDefinition {
    name: String,
    rule: TagRule,
}

impl TagDefinition {
    fn applies(&self, title: &str, uploader: &str) -> bool {
        let title_norm = sanitize_text(title);
        let uploader_norm = sanitize_text(uploader);
        match &self.rule {
            TagRule::Presence(lines) => lines
                .iter()
                .find(|l| {
                    l.pattern.matches(title, &title_norm) || l.pattern.matches(uploader, &uploader_norm)
                })
                .map(|l| !l.negated)
                .unwrap_or(false),
            TagRule::Absence(set) => !(set.matches(title) || set.matches(uploader)),
        }
    }
}

/// Normalizes a tag name for storage and for the artist frame: lowercase, alphanumeric only
pub fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Computes tags and album from pattern files
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    tags: Vec<TagDefinition>,
    private: PatternSet,
    trusted: PatternSet,
}

impl Classifier {
    pub fn new(private: PatternSet, trusted: PatternSet) -> Self {
        Self { tags: Vec::new(), private, trusted }
    }

    /// Loads every `tag_*.txt` / `notag_*.txt` file of `tags_dir` and the album pattern files
    pub fn load(tags_dir: &Path, private_file: &Path, trusted_file: &Path) -> Result<Self, SyncError> {
        let mut classifier = Self::new(PatternSet::load(private_file)?, PatternSet::load(trusted_file)?);

        if !tags_dir.exists() {
            warn!("[Classifier] Tags directory does not exist: '{}'", tags_dir.display());
            return Ok(classifier);
        }

        let mut files: Vec<_> = std::fs::read_dir(tags_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();

        for file in files {
            let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let contents = std::fs::read_to_string(&file)?;
            classifier
                .add_tag_file(stem, &contents)
                .map_err(|e| SyncError::Config(format!("{}: {e}", file.display())))?;
        }

        debug!("[Classifier] Loaded {} tag definitions", classifier.tags.len());
        Ok(classifier)
    }

    /// Registers a tag definition from a file's base name and contents.
    /// Files that are neither `tag_` nor `notag_` are ignored.
    pub fn add_tag_file(&mut self, stem: &str, contents: &str) -> Result<(), SyncError> {
        if let Some(name) = stem.strip_prefix("tag_") {
            let mut lines = Vec::new();
            for line in pattern_lines(contents) {
                let (negated, body) = match line.strip_prefix('-') {
                    Some(rest) => (true, rest.trim()),
                    None => (false, line),
                };
                if let Some(pattern) = Pattern::parse(body)? {
                    lines.push(TagLine { negated, pattern });
                }
            }
            self.push_tag(name, TagRule::Presence(lines));
        } else if let Some(name) = stem.strip_prefix("notag_") {
            let set = PatternSet::from_lines(pattern_lines(contents))?;
            self.push_tag(name, TagRule::Absence(set));
        } else {
            debug!("[Classifier] Ignoring '{stem}', not a tag file");
        }
        Ok(())
    }

    fn push_tag(&mut self, name: &str, rule: TagRule) {
        let name = normalize_tag(name);
        if name.is_empty() {
            warn!("[Classifier] Tag file with an empty name skipped");
            return;
        }
        self.tags.push(TagDefinition { name, rule });
    }

    pub fn compute_tags(&self, title: &str, uploader: &str) -> BTreeSet<String> {
        self.tags
            .iter()
            .filter(|t| t.applies(title, uploader))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Private patterns win over trusted ones; no match at all is Private
    pub fn compute_album(&self, title: &str, uploader: &str) -> Album {
        if self.private.matches(title) || self.private.matches(uploader) {
            return Album::Private;
        }
        if self.trusted.matches(title) || self.trusted.matches(uploader) {
            return Album::Public;
        }
        Album::Private
    }

    pub fn trusted(&self) -> &PatternSet {
        &self.trusted
    }
}
