//! Command capture files
//!
//! Captures let recorded commands be replayed through the interceptor outside
//! a live pipeline: read the XML, dispatch the pre-execution hooks, and write
//! the rewritten command back out.

mod reader;
mod writer;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::command::DbCommand;
use crate::error::CaptureError;
use crate::interceptor::{CommandKind, InterceptionContext, InterceptionRegistry};

pub use reader::{parse_capture, parse_capture_str};
pub use writer::{write_capture, write_capture_file};

/// Minimum number of files to benefit from parallel processing.
/// Below this threshold, sequential processing is faster due to rayon overhead.
const PARALLEL_THRESHOLD: usize = 8;

/// A recorded command together with how it was executed
#[derive(Debug, Clone)]
pub struct CommandCapture {
    /// File the capture was read from
    pub source: PathBuf,
    pub kind: CommandKind,
    pub context: InterceptionContext,
    pub command: DbCommand,
}

/// What happened to one capture during replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    /// At least one parameter was rewritten
    Rewritten {
        /// Names of the rewritten parameters, in parameter order
        parameters: Vec<String>,
        /// Full-text predicates found in the rewritten text, when verified
        predicates: Option<usize>,
    },
    /// The hooks ran and left the command as it was
    Unchanged,
    /// The capture could not be read, rewritten or written
    Failed { message: String },
}

/// Result of replaying one capture file
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub source: PathBuf,
    pub status: CaptureStatus,
    /// Where the rewritten capture was written, if anywhere
    pub output: Option<PathBuf>,
    /// Rewritten command text, when the capture was read successfully
    pub text: Option<String>,
}

impl CaptureOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, CaptureStatus::Failed { .. })
    }
}

/// How captures are replayed
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Overrides the kind recorded in each capture
    pub kind: Option<CommandKind>,
    /// Overrides the provider recorded in each capture
    pub context: Option<InterceptionContext>,
    /// Directory rewritten captures are written to
    pub output_dir: Option<PathBuf>,
    /// Tokenize rewritten text and count full-text predicates
    pub verify: bool,
}

/// Expand inputs into capture files.
///
/// Directories are walked for `*.xml`; inputs containing glob metacharacters
/// are expanded as patterns. The result is sorted and free of duplicates.
pub fn discover_captures(inputs: &[String]) -> Result<Vec<PathBuf>, CaptureError> {
    let mut files = Vec::new();

    for input in inputs {
        if input.contains(['*', '?', '[']) {
            let paths = glob::glob(input).map_err(|e| CaptureError::InvalidFormat {
                path: PathBuf::from(input),
                message: format!("invalid glob pattern: {}", e),
            })?;
            files.extend(paths.flatten().filter(|p| p.is_file()));
            continue;
        }

        let path = PathBuf::from(input);
        if path.is_dir() {
            for entry in WalkDir::new(&path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if is_xml(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path);
        } else {
            return Err(CaptureError::ReadError {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "capture file or directory not found",
                ),
                path,
            });
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Replay every capture file through `registry`.
///
/// Each file is an independent command, so large sets are processed in parallel.
/// A failing capture is reported in its outcome and does not stop the others.
pub fn replay_captures(
    files: &[PathBuf],
    registry: &InterceptionRegistry,
    options: &ReplayOptions,
) -> Vec<CaptureOutcome> {
    if files.len() >= PARALLEL_THRESHOLD {
        files
            .par_iter()
            .map(|file| replay_capture(file, registry, options))
            .collect()
    } else {
        files
            .iter()
            .map(|file| replay_capture(file, registry, options))
            .collect()
    }
}

/// Replay a single capture file through `registry`
pub fn replay_capture(
    path: &Path,
    registry: &InterceptionRegistry,
    options: &ReplayOptions,
) -> CaptureOutcome {
    let mut capture = match parse_capture(path) {
        Ok(capture) => capture,
        Err(e) => return failed(path, None, &e),
    };
    if let Some(kind) = options.kind {
        capture.kind = kind;
    }
    if let Some(context) = &options.context {
        capture.context = context.clone();
    }

    let before = capture.command.clone();
    if let Err(e) = registry.dispatch_executing(capture.kind, &mut capture.command, &capture.context)
    {
        return failed(path, Some(capture.command.text), &e);
    }
    registry.dispatch_executed(capture.kind, &capture.command, &capture.context);

    let parameters: Vec<String> = capture
        .command
        .parameters
        .iter()
        .zip(&before.parameters)
        .filter(|(after, before)| after != before)
        .map(|(after, _)| after.name.clone())
        .collect();

    let status = if parameters.is_empty() && capture.command.text == before.text {
        CaptureStatus::Unchanged
    } else {
        let verified = options
            .verify
            .then(|| count_full_text_predicates(&capture.command.text));
        let predicates = match verified {
            Some(Ok(count)) => Some(count),
            Some(Err(message)) => return failed(path, Some(capture.command.text), &message),
            None => None,
        };
        CaptureStatus::Rewritten {
            parameters,
            predicates,
        }
    };

    let mut output = None;
    if let Some(dir) = &options.output_dir {
        let target = dir.join(path.file_name().unwrap_or(path.as_os_str()));
        if let Err(e) = write_capture_file(&target, &capture) {
            return failed(path, Some(capture.command.text), &e);
        }
        debug!(target = %target.display(), "wrote capture");
        output = Some(target);
    }

    match &status {
        CaptureStatus::Rewritten { parameters, .. } => {
            info!(
                "{}: rewrote {} parameter(s)",
                path.display(),
                parameters.len()
            );
        }
        _ => debug!("{}: no full-text parameters", path.display()),
    }

    CaptureOutcome {
        source: path.to_path_buf(),
        status,
        output,
        text: Some(capture.command.text),
    }
}

fn failed(path: &Path, text: Option<String>, error: &dyn std::fmt::Display) -> CaptureOutcome {
    warn!("{}: {}", path.display(), error);
    CaptureOutcome {
        source: path.to_path_buf(),
        status: CaptureStatus::Failed {
            message: error.to_string(),
        },
        output: None,
        text,
    }
}

/// Count `CONTAINS(` and `FREETEXT(` predicates in T-SQL text.
///
/// Fails if the text does not tokenize as T-SQL.
pub fn count_full_text_predicates(sql: &str) -> Result<usize, String> {
    let dialect = MsSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| format!("rewritten text does not tokenize: {}", e))?;

    let significant: Vec<&Token> = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect();

    let count = significant
        .windows(2)
        .filter(|pair| match (pair[0], pair[1]) {
            (Token::Word(w), Token::LParen) => {
                w.quote_style.is_none()
                    && (w.value.eq_ignore_ascii_case("CONTAINS")
                        || w.value.eq_ignore_ascii_case("FREETEXT"))
            }
            _ => false,
        })
        .count();

    Ok(count)
}
