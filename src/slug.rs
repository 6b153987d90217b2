//! Deterministic, URL-safe identifiers derived from video titles.
//!
//! Thumbnail filenames and page URLs are both built from these slugs, so the
//! transformation must stay byte-for-byte stable: changing it orphans every
//! thumbnail already written to disk.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Title used when a record has none.
pub const UNTITLED_VIDEO: &str = "untitled-video";

pub const THUMBNAIL_EXTENSION: &str = "webp";

// ECMAScript whitespace: Unicode `\s` without U+0085, plus U+FEFF. Slugs
// already published were produced with this class.
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\t\n\x0B\x0C\r \x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}]+")
        .unwrap()
});
// ASCII-only word characters; accented letters are already decomposed.
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());
static HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

fn is_slug_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | ' ' | '\u{A0}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Lowercase, hyphen-delimited ASCII token for `text`.
pub fn slugify(text: &str) -> String {
    let stripped: String = text.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = stripped.to_lowercase();
    let hyphenated = WHITESPACE_RUN.replace_all(lowered.trim_matches(is_slug_whitespace), "-");
    let word_only = NON_WORD.replace_all(&hyphenated, "");
    HYPHEN_RUN.replace_all(&word_only, "-").into_owned()
}

/// Slug of a record title, falling back to [`UNTITLED_VIDEO`] when empty.
pub fn title_slug(title: &str) -> String {
    if title.is_empty() {
        slugify(UNTITLED_VIDEO)
    } else {
        slugify(title)
    }
}

/// `{slug}-{id}`: the page path segment and the thumbnail file stem.
pub fn video_page_slug(title: &str, id: &str) -> String {
    format!("{}-{}", title_slug(title), id)
}

pub fn thumbnail_file_name(title: &str, id: &str) -> String {
    format!("{}.{THUMBNAIL_EXTENSION}", video_page_slug(title, id))
}
