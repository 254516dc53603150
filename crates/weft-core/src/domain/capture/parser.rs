//! Tag and hyperlink extraction from capture text
//!
//! Pure functions with no failure modes; no matches means an empty result.
//! Duplicates are preserved in order of appearance — deduplication is the
//! upsert layer's concern, not the parser's.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|\s)#([a-zA-Z0-9]+)").expect("tag regex is valid")
});

static STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\S*").expect("strip regex is valid"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("link regex is valid"));

/// Extract hashtag-style tags: `#` at start of line or after whitespace,
/// followed by one or more alphanumerics.
pub fn parse_tags(text: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Remove every `#token` occurrence so tags are not mis-identified as
/// entities by the NLP collaborator. Broader than [`parse_tags`] on purpose:
/// anything hash-prefixed is noise to entity extraction.
pub fn strip_tags(text: &str) -> String {
    STRIP_RE.replace_all(text, "").into_owned()
}

/// Extract well-formed http/https hyperlink tokens, trimming trailing
/// punctuation that belongs to the surrounding sentence.
pub fn parse_links(text: &str) -> Vec<String> {
    LINK_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']).to_string())
        .filter(|url| !url.is_empty())
        .collect()
}
