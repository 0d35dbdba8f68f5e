//! LIKE fragment patterns produced by the query translator
//!
//! The translator emits one of two shapes for a tagged parameter:
//!
//! ```sql
//! N'*' LIKE @p__linq__0 ESCAPE N'~'
//! [Extent1].[Title] LIKE @p__linq__0 ESCAPE N'~'
//! ```
//!
//! Each shape is compiled per parameter name and cached, since the same
//! generated names (`p__linq__0`, `p__linq__1`, ...) recur across commands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use regex::{Captures, Regex};

use super::FullTextOperation;

/// Entries kept before the cache is flushed
const CACHE_CAPACITY: usize = 256;

/// Body of a bracketed identifier: no `[` or `'`, with `]]` as an escaped `]`
const BRACKETED_NAME: &str = r"(?:[^\[\]']|\]\])+";

/// Which LIKE shape a rewrite matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentShape {
    /// `'*' LIKE @p ESCAPE '~'`
    Wildcard,
    /// `[table].[column] LIKE @p ESCAPE '~'`
    SingleColumn,
}

/// Compiled fragment patterns for a single parameter
#[derive(Debug)]
pub struct FragmentPatterns {
    placeholder: String,
    wildcard: Regex,
    single_column: Regex,
}

impl FragmentPatterns {
    /// Compile the patterns for the parameter `name` (without `@`)
    pub fn for_parameter(name: &str) -> Self {
        let like = format!(r"\s*LIKE\s*@{}\s*ESCAPE\s*N?'~'", regex::escape(name));

        // Escaped name inside a fixed pattern
        let wildcard = Regex::new(&format!(r"(?i)N?'\*'{}", like)).unwrap();
        let single_column = Regex::new(&format!(
            r"(?i)\[(?P<table>{ident})\]\.\[(?P<column>{ident})\]{like}",
            ident = BRACKETED_NAME,
            like = like
        ))
        .unwrap();

        Self {
            placeholder: format!("@{}", name),
            wildcard,
            single_column,
        }
    }

    /// Substitute the full-text predicate into `text`, trying the wildcard shape first.
    ///
    /// Returns `None` when neither shape references the parameter.
    pub fn apply(&self, text: &str, operation: FullTextOperation) -> Option<(FragmentShape, String)> {
        let keyword = operation.keyword();

        if self.wildcard.is_match(text) {
            let rewritten = self
                .wildcard
                .replace_all(text, |_: &Captures| format!("{}(*, {})", keyword, self.placeholder));
            return Some((FragmentShape::Wildcard, rewritten.into_owned()));
        }

        if self.single_column.is_match(text) {
            let rewritten = self.single_column.replace_all(text, |caps: &Captures| {
                format!(
                    "{}([{}].[{}], {})",
                    keyword, &caps["table"], &caps["column"], self.placeholder
                )
            });
            return Some((FragmentShape::SingleColumn, rewritten.into_owned()));
        }

        None
    }
}

/// Per-name cache of compiled fragment patterns
#[derive(Debug, Default)]
pub struct FragmentCache {
    entries: Mutex<HashMap<String, Arc<FragmentPatterns>>>,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the patterns for `name`, compiling them on first use
    pub fn get(&self, name: &str) -> Arc<FragmentPatterns> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(patterns) = entries.get(name) {
            return Arc::clone(patterns);
        }
        if entries.len() >= CACHE_CAPACITY {
            entries.clear();
        }
        let patterns = Arc::new(FragmentPatterns::for_parameter(name));
        entries.insert(name.to_string(), Arc::clone(&patterns));
        patterns
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
