//! Full-text query rewriting
//!
//! Turns the `LIKE` predicates an ORM translator emits for tagged string
//! constants back into SQL Server `CONTAINS` / `FREETEXT` predicates:
//!
//! ```sql
//! -- before, @p0 = '-FTSCONTAINS-%sql server%-/FTSCONTAINS-'
//! WHERE [Extent1].[Body] LIKE @p0 ESCAPE N'~'
//! -- after, @p0 = 'sql server' (AnsiStringFixedLength, size 4096)
//! WHERE CONTAINS([Extent1].[Body], @p0)
//! ```
//!
//! Parameters are processed in order against the cumulative text. All changes
//! are staged and only written back to the command once every tagged
//! parameter has been rewritten, so a failed call leaves the command as it was.

mod fragment;

use std::fmt;
use std::sync::LazyLock;

use tracing::{debug, trace};

use crate::command::{DbCommand, DbType, ParameterValue, FULL_TEXT_PARAMETER_SIZE};
use crate::error::{FullTextError, MalformedSqlReason};
use crate::tags::{self, FullTextTag};

pub use fragment::{FragmentCache, FragmentPatterns, FragmentShape};

/// Native full-text predicate a tagged parameter is rewritten into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FullTextOperation {
    Contains,
    FreeText,
}

impl FullTextOperation {
    pub fn keyword(&self) -> &'static str {
        match self {
            FullTextOperation::Contains => "CONTAINS",
            FullTextOperation::FreeText => "FREETEXT",
        }
    }
}

impl From<FullTextTag> for FullTextOperation {
    fn from(tag: FullTextTag) -> Self {
        match tag {
            FullTextTag::Contains => FullTextOperation::Contains,
            FullTextTag::FreeText => FullTextOperation::FreeText,
        }
    }
}

impl fmt::Display for FullTextOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A parameter that was rewritten into a full-text predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenParameter {
    pub name: String,
    pub operation: FullTextOperation,
    pub shape: FragmentShape,
}

/// Outcome of a successful rewrite call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Rewritten parameters, in parameter order
    pub rewritten: Vec<RewrittenParameter>,
}

impl RewriteSummary {
    pub fn is_empty(&self) -> bool {
        self.rewritten.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rewritten.len()
    }
}

struct StagedParameter {
    index: usize,
    value: String,
}

/// Rewrites tagged LIKE predicates into full-text predicates.
///
/// Holds only a cache of compiled fragment patterns, so one instance can be
/// shared by every thread executing commands.
#[derive(Debug, Default)]
pub struct FullTextRewriter {
    fragments: FragmentCache,
}

impl FullTextRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite every tagged parameter of `command` and its fragment in the text
    pub fn rewrite(&self, command: &mut DbCommand) -> Result<RewriteSummary, FullTextError> {
        let mut text = command.text.clone();
        let mut staged = Vec::new();
        let mut summary = RewriteSummary::default();

        for (index, parameter) in command.parameters.iter().enumerate() {
            if !parameter.db_type.is_textual() {
                continue;
            }
            let Some(value) = parameter.value.as_text() else {
                trace!(parameter = %parameter.name, "skipping parameter without text value");
                continue;
            };
            let Some(tag_match) = tags::find_tag(value) else {
                continue;
            };

            let operation = tag_match.tag.map(FullTextOperation::from).ok_or_else(|| {
                FullTextError::UnrecognizedTag {
                    parameter: parameter.name.clone(),
                }
            })?;

            let unescaped = tags::strip_wildcard_escape(&tag_match.untagged).ok_or_else(|| {
                FullTextError::MalformedParameterValue {
                    parameter: parameter.name.clone(),
                }
            })?;

            let patterns = self.fragments.get(&parameter.name);
            let (shape, rewritten) = patterns.apply(&text, operation).ok_or_else(|| {
                FullTextError::MalformedSql {
                    parameter: parameter.name.clone(),
                    reason: MalformedSqlReason::NoMatchingFragment,
                }
            })?;

            if rewritten == text {
                return Err(FullTextError::MalformedSql {
                    parameter: parameter.name.clone(),
                    reason: MalformedSqlReason::TextUnchanged,
                });
            }

            debug!(
                parameter = %parameter.name,
                %operation,
                ?shape,
                "rewrote LIKE predicate into full-text predicate"
            );

            text = rewritten;
            staged.push(StagedParameter {
                index,
                value: unescaped.to_string(),
            });
            summary.rewritten.push(RewrittenParameter {
                name: parameter.name.clone(),
                operation,
                shape,
            });
        }

        if staged.is_empty() {
            return Ok(summary);
        }

        for StagedParameter { index, value } in staged {
            let parameter = &mut command.parameters[index];
            parameter.size = FULL_TEXT_PARAMETER_SIZE;
            parameter.db_type = DbType::AnsiStringFixedLength;
            parameter.value = ParameterValue::Text(value);
        }
        command.text = text;

        Ok(summary)
    }
}

static DEFAULT_REWRITER: LazyLock<FullTextRewriter> = LazyLock::new(FullTextRewriter::new);

/// Rewrite a command with a process-wide rewriter.
///
/// An absent command is rejected before any parameter is inspected.
pub fn rewrite_full_text_query(
    command: Option<&mut DbCommand>,
) -> Result<RewriteSummary, FullTextError> {
    let command = command.ok_or(FullTextError::InvalidArgument {
        argument: "command",
    })?;
    DEFAULT_REWRITER.rewrite(command)
}
