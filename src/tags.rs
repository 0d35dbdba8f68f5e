//! Full-text sentinel tags
//!
//! The query translator marks a string constant for full-text search by
//! wrapping it in one of two sentinel pairs. By the time the value reaches a
//! command parameter the translator has also wrapped it in `%...%` for its
//! `LIKE` comparison, so a tagged value reads `OPEN%user text%CLOSE`.
//!
//! The sentinels contain none of `%`, `_`, `[`, `]` or `~`, so the
//! translator's LIKE escaping never alters them.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

pub const CONTAINS_OPEN: &str = "-FTSCONTAINS-";
pub const CONTAINS_CLOSE: &str = "-/FTSCONTAINS-";
pub const FREETEXT_OPEN: &str = "-FTSFREETEXT-";
pub const FREETEXT_CLOSE: &str = "-/FTSFREETEXT-";

/// Matches the outermost tag pair of either kind. The body is greedy so a
/// sentinel typed by the end user inside the search terms stays in the body.
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "(?s){}(?P<contains>.*){}|{}(?P<freetext>.*){}",
        regex::escape(CONTAINS_OPEN),
        regex::escape(CONTAINS_CLOSE),
        regex::escape(FREETEXT_OPEN),
        regex::escape(FREETEXT_CLOSE),
    ))
    .unwrap()
});

/// Kind of full-text tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FullTextTag {
    Contains,
    FreeText,
}

impl FullTextTag {
    pub fn open(&self) -> &'static str {
        match self {
            FullTextTag::Contains => CONTAINS_OPEN,
            FullTextTag::FreeText => FREETEXT_OPEN,
        }
    }

    pub fn close(&self) -> &'static str {
        match self {
            FullTextTag::Contains => CONTAINS_CLOSE,
            FullTextTag::FreeText => FREETEXT_CLOSE,
        }
    }

    /// Build the parameter value the translator produces for `term`
    pub fn wrap(&self, term: &str) -> String {
        format!("{}%{}%{}", self.open(), term, self.close())
    }
}

impl fmt::Display for FullTextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullTextTag::Contains => f.write_str("contains"),
            FullTextTag::FreeText => f.write_str("freetext"),
        }
    }
}

/// Result of finding a tag in a parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    /// Which tag matched; `None` means the match could not be classified
    pub tag: Option<FullTextTag>,
    /// The value with the first tag occurrence removed, `%` wrapping still present
    pub untagged: String,
}

/// Find the first tag in `value`
pub fn find_tag(value: &str) -> Option<TagMatch> {
    let caps = ANY_TAG.captures(value)?;
    let whole = caps.get(0)?;
    let (tag, body) = classify(&caps);

    let mut untagged = String::with_capacity(value.len());
    untagged.push_str(&value[..whole.start()]);
    untagged.push_str(body);
    untagged.push_str(&value[whole.end()..]);

    Some(TagMatch { tag, untagged })
}

fn classify<'v>(caps: &Captures<'v>) -> (Option<FullTextTag>, &'v str) {
    if let Some(body) = caps.name("contains") {
        (Some(FullTextTag::Contains), body.as_str())
    } else if let Some(body) = caps.name("freetext") {
        (Some(FullTextTag::FreeText), body.as_str())
    } else {
        (None, "")
    }
}

/// Undo the translator's `%...%` wrapping by dropping one character from each end.
///
/// Returns `None` when fewer than two characters remain.
pub fn strip_wildcard_escape(value: &str) -> Option<&str> {
    let mut chars = value.char_indices();
    let (_, first) = chars.next()?;
    let (last_start, _) = chars.next_back()?;
    Some(&value[first.len_utf8()..last_start])
}
