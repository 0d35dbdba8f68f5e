//! fulltext-interceptor: SQL Server full-text search for ORM-generated queries
//!
//! An ORM translator has no notion of full-text search, so a caller marks a
//! search term with a sentinel tag and the translator emits an ordinary
//! `LIKE` predicate for it. This library intercepts the command just before
//! execution and rewrites those predicates into `CONTAINS` / `FREETEXT`.

pub mod capture;
pub mod command;
pub mod error;
pub mod interceptor;
pub mod rewriter;
pub mod tags;

use std::path::PathBuf;

use anyhow::Result;

pub use command::{DbCommand, DbParameter, DbType, ParameterValue};
pub use error::{CaptureError, FullTextError, MalformedSqlReason};
pub use interceptor::{
    CommandInterceptor, CommandKind, FullTextInterceptor, InterceptionContext,
    InterceptionRegistry, InterceptorConfig, ProviderTag,
};
pub use rewriter::{rewrite_full_text_query, FullTextOperation, FullTextRewriter, RewriteSummary};
pub use tags::FullTextTag;

use capture::{CaptureOutcome, ReplayOptions};

/// Options for replaying command captures through the full-text interceptor
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Capture files, directories or glob patterns
    pub inputs: Vec<String>,
    /// Directory rewritten captures are written to
    pub output_dir: Option<PathBuf>,
    /// Provider whose commands are rewritten
    pub target_provider: ProviderTag,
    /// Provider to assume instead of the one recorded in each capture
    pub provider_override: Option<ProviderTag>,
    /// Command kind to assume instead of the one recorded in each capture
    pub kind_override: Option<CommandKind>,
    /// Tokenize rewritten text and count full-text predicates
    pub verify: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_dir: None,
            target_provider: ProviderTag::SqlServer,
            provider_override: None,
            kind_override: None,
            verify: false,
        }
    }
}

/// Replay captured commands through a registered [`FullTextInterceptor`]
pub fn rewrite_captures(options: RewriteOptions) -> Result<Vec<CaptureOutcome>> {
    // Step 1: Find capture files
    let files = capture::discover_captures(&options.inputs)?;
    tracing::info!("Found {} capture file(s)", files.len());

    // Step 2: Install the interceptor the way a pipeline would at startup
    let mut registry = InterceptionRegistry::new();
    registry.register(FullTextInterceptor::new(InterceptorConfig {
        target_provider: options.target_provider.clone(),
    }));

    // Step 3: Make sure the output directory exists
    if let Some(dir) = &options.output_dir {
        std::fs::create_dir_all(dir).map_err(|e| CaptureError::WriteError {
            path: dir.clone(),
            source: e,
        })?;
    }

    // Step 4: Replay
    let replay = ReplayOptions {
        kind: options.kind_override,
        context: options.provider_override.map(InterceptionContext::new),
        output_dir: options.output_dir,
        verify: options.verify,
    };
    let outcomes = capture::replay_captures(&files, &registry, &replay);

    let failures = outcomes.iter().filter(|o| o.is_failure()).count();
    tracing::info!(
        "Replayed {} capture(s), {} failed",
        outcomes.len(),
        failures
    );

    Ok(outcomes)
}
