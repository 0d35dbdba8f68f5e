//! Error types for fulltext-interceptor

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a tagged parameter could not be applied to the command text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedSqlReason {
    /// Neither the wildcard nor the single-column LIKE shape references the parameter
    NoMatchingFragment,
    /// A fragment matched but the substitution left the text as it was
    TextUnchanged,
}

impl fmt::Display for MalformedSqlReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedSqlReason::NoMatchingFragment => {
                f.write_str("no LIKE ... ESCAPE fragment references it")
            }
            MalformedSqlReason::TextUnchanged => f.write_str("substitution did not change the text"),
        }
    }
}

/// Errors raised while rewriting a command into a full-text query.
///
/// Every variant aborts the whole rewrite; the command is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FullTextError {
    #[error("Value cannot be null. Parameter name: {argument}")]
    InvalidArgument { argument: &'static str },

    #[error("Malformed full-text parameter @{parameter}: tag does not map to a full-text operation")]
    UnrecognizedTag { parameter: String },

    #[error("Malformed full-text SQL for parameter @{parameter}: {reason}")]
    MalformedSql {
        parameter: String,
        reason: MalformedSqlReason,
    },

    #[error("Malformed full-text parameter @{parameter}: tagged value is missing its % wrapping")]
    MalformedParameterValue { parameter: String },
}

/// Errors that can occur while reading or writing command capture files
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to read capture file: {path}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse capture file: {path}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid capture format in {path}: {message}")]
    InvalidFormat { path: PathBuf, message: String },

    #[error("Failed to write capture file to {path}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
