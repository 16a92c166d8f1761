//! Query tokenization and result normalization.
//!
//! Everything here produces lowercase text with filename noise removed, so
//! that substring tests and edit distances compare like with like across
//! backends that format names differently (`Ubuntu_24.04-Desktop[x64].iso`
//! vs `ubuntu 24 04 desktop x64 iso`).

use once_cell::sync::Lazy;
use std::collections::HashSet;
use unicode_categories::UnicodeCategories;
use unicode_normalization::UnicodeNormalization;

use crate::results::SearchResult;

/// Fragments removed before character-level sanitizing
const NOISE_FRAGMENTS: &[&str] = &[".torrent", "www.", ".com", ".net"];

/// Characters that separate words inside filenames and titles
const NOISE_CHARS: &[char] = &[
    '\\', '/', '%', '_', ';', '-', '.', '(', ')', '[', ']', '\n', '\r', '\t', '&', '~', '{', '}',
    '*', '@', '^', '\'', '"', '=', '!', ',', '|', '#', '\u{00D0}', '\u{00A1}', '\u{00C0}',
    '\u{00C1}',
];

/// English, Spanish and German words that carry no ranking signal
pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "and", "the", "a", "on", "in", "of", "for", "to", "is", "it", "at", "by", "an", "or", "as",
        "be", "with", "this", "that", "these", "those", "from", "but", "about", "which", "some",
        "so", "out", "then", "than", "too",
        // Spanish
        "y", "el", "la", "los", "las", "un", "una", "unos", "unas", "en", "de", "para", "por",
        "con", "como", "sobre", "al", "lo", "es", "del", "más", "ya", "o", "sin", "sus", "le",
        "se", "me", "te", "tu", "mi", "esto", "eso", "estos", "esos", "aquel", "aquella",
        "aquellos", "aquellas",
        // German
        "und", "der", "die", "ein", "eine", "einer", "einem", "einen", "im", "auf", "am", "zu",
        "mit", "von", "über", "für", "ist", "war", "sein", "sie", "er", "wir", "ihr", "denn",
        "doch", "nicht", "weil", "als", "aber", "wenn", "dann", "dies", "diese", "dieser",
        "dieses", "das", "jenes", "solche",
    ]
    .into_iter()
    .collect()
});

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || NOISE_CHARS.contains(&c) || c.is_ascii_punctuation()
}

/// Splits already-lowercased text on whitespace and punctuation.
///
/// Empty tokens are discarded; duplicates are kept in order.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split(is_delimiter)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Replaces noise fragments and characters with single spaces and trims.
pub fn sanitize(text: &str) -> String {
    let mut text = text.to_owned();
    for fragment in NOISE_FRAGMENTS {
        if text.contains(fragment) {
            text = text.replace(fragment, " ");
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        let c = if NOISE_CHARS.contains(&c) || c.is_whitespace() {
            ' '
        } else {
            c
        };
        if c == ' ' {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Lowercases, decomposes (NFKD) and drops combining marks: `Niño` -> `nino`.
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !c.is_mark())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Deduplicated, folded query keywords, optionally without stopwords.
///
/// Order follows first occurrence.
pub fn tokenize_keywords(query: &str, remove_stopwords: bool) -> Vec<String> {
    let folded = fold(&sanitize(query));
    let mut seen = HashSet::new();
    folded
        .split(' ')
        .filter(|token| !token.is_empty())
        .filter(|token| !remove_stopwords || !STOPWORDS.contains(token))
        .filter(|token| seen.insert(*token))
        .map(str::to_owned)
        .collect()
}

/// Flattens a result into the lowercase haystack used for ranking.
///
/// Display name, the parent's display name for crawled results, and the
/// filename for file results are concatenated, sanitized and folded.
/// Callers ranking a batch compute this once per result and keep it for the
/// whole pass.
pub fn normalize_for_search(result: &dyn SearchResult) -> String {
    let mut text = String::with_capacity(128);
    text.push_str(result.display_name());
    if let Some(parent) = result.parent() {
        text.push(' ');
        text.push_str(parent.display_name());
    }
    if let Some(file) = result.as_file() {
        text.push(' ');
        text.push_str(file.filename());
    }
    fold(&sanitize(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultRecord;

    #[test]
    fn test_tokenize_splits_on_punctuation() {
        assert_eq!(
            tokenize("ubuntu 24.04 desktop-iso"),
            vec!["ubuntu", "24", "04", "desktop", "iso"]
        );
        assert_eq!(tokenize("a_b;c&d|e"), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_tokenize_keeps_duplicates_and_drops_empties() {
        assert_eq!(tokenize("  foo  foo,,bar "), vec!["foo", "foo", "bar"]);
        assert!(tokenize("").is_empty());
        assert!(tokenize(" ... --- ").is_empty());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(
            sanitize("www.example.com/Ubuntu_24.04-desktop[x64].torrent"),
            "example Ubuntu 24 04 desktop x64"
        );
        assert_eq!(sanitize("  a   b  "), "a b");
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("\"quoted\" {braces}"), "quoted braces");
    }

    #[test]
    fn test_fold_strips_accents() {
        assert_eq!(fold("Niño"), "nino");
        assert_eq!(fold("Über Café"), "uber cafe");
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            tokenize_keywords("The Lord of the Rings", true),
            vec!["lord", "rings"]
        );
        assert_eq!(
            tokenize_keywords("The Lord of the Rings", false),
            vec!["the", "lord", "of", "rings"]
        );
        assert!(tokenize_keywords("   ", true).is_empty());
    }

    #[test]
    fn test_normalize_for_search() {
        let r = ResultRecord::new("Timon of Athens", "MIT").with_file("timon_of_athens.txt", 0);
        assert_eq!(
            normalize_for_search(&r),
            "timon of athens timon of athens txt"
        );

        let parent = ResultRecord::new("Greatest Hits", "src").crawlable(false).into_shared();
        let child = ResultRecord::new("Track 01", "src").with_parent(parent);
        assert_eq!(normalize_for_search(&child), "track 01 greatest hits");
    }
}
