use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Compiles a constant pattern once. Returns None only if the literal itself is invalid.
pub fn cached_regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn replace_all(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str, rep: &str) -> String {
    match cached_regex(cell, pattern) {
        Some(re) => re.replace_all(text, rep).into_owned(),
        None => text.to_string(),
    }
}

static FORBIDDEN: OnceLock<Option<Regex>> = OnceLock::new();
static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();
static UNSAFE: OnceLock<Option<Regex>> = OnceLock::new();

/// Decomposes accents and drops everything outside ASCII ("Café" -> "Cafe")
pub fn fold_ascii(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii)
        .collect()
}

/// Uppercases the first cased character of every word and lowercases the rest.
/// A word starts after any character that is not a letter, so "don't" becomes "Don'T".
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_cased = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(c);
            prev_cased = false;
        }
    }
    out
}

pub fn collapse_whitespace(text: &str) -> String {
    replace_all(&WHITESPACE, r"\s+", text, " ").trim().to_string()
}

/// Normalizes a title, uploader or pattern so that literal comparisons ignore
/// accents, punctuation and casing. The result is also safe as a file name.
pub fn sanitize_text(text: &str) -> String {
    let folded = fold_ascii(text.trim());
    let stripped = replace_all(&FORBIDDEN, r#"[\\/:*?"<>|~.\x00-\x1F]"#, &folded, "");
    let collapsed = replace_all(&WHITESPACE, r"\s+", &stripped, " ");
    let safe = replace_all(&UNSAFE, r"[^A-Za-z0-9 _\-().]", &collapsed, "");
    let trimmed = safe.trim_end_matches(['.', ' ']).trim();
    title_case(trimmed)
}

/// Case-insensitive matcher for `word` delimited by word boundaries
pub fn whole_word_regex(word: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
}

/// True when `word` appears in `text` delimited by word boundaries, ignoring case
pub fn contains_whole_word(text: &str, word: &str) -> bool {
    if text.is_empty() || word.is_empty() {
        return false;
    }
    whole_word_regex(word).is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  Beyoncé -  Halo (Live)... "), "Beyonce - Halo (Live)");
        assert_eq!(sanitize_text("AC/DC: Back in Black?"), "Acdc Back In Black");
        assert_eq!(sanitize_text("日本語 song"), "Song");
        assert_eq!(sanitize_text(""), "");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hello WORLD"), "Hello World");
        assert_eq!(title_case("don't stop"), "Don'T Stop");
        assert_eq!(title_case("dj42 remix"), "Dj42 Remix");
    }

    #[test]
    fn test_contains_whole_word() {
        assert!(contains_whole_word("The DJ Set", "dj"));
        assert!(!contains_whole_word("DJohn live", "DJ"));
        assert!(contains_whole_word("a (remix) b", "remix"));
        assert!(!contains_whole_word("", "dj"));
        assert!(!contains_whole_word("dj", ""));
    }
}
