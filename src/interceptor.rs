//! Command interception seam
//!
//! The execution pipeline calls registered interceptors around each command
//! it executes. [`FullTextInterceptor`] rewrites reader and scalar commands
//! before execution when the pipeline's provider is SQL Server; every other
//! hook is a no-op.

use std::any::{Any, TypeId};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::command::DbCommand;
use crate::error::FullTextError;
use crate::rewriter::{FullTextRewriter, RewriteSummary};

/// Provider invariant names that identify SQL Server
const SQL_SERVER_PROVIDERS: &[&str] = &["System.Data.SqlClient", "Microsoft.Data.SqlClient"];

/// Provider that produced a command, decided once by the pipeline from its configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ProviderTag {
    #[default]
    SqlServer,
    Other(String),
}

impl ProviderTag {
    /// Classify a provider invariant name such as `System.Data.SqlClient`
    pub fn from_invariant_name(name: &str) -> Self {
        if SQL_SERVER_PROVIDERS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(name.trim()))
        {
            ProviderTag::SqlServer
        } else {
            ProviderTag::Other(name.trim().to_string())
        }
    }
}

impl FromStr for ProviderTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("Provider name cannot be empty".to_string());
        }
        match s.to_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(ProviderTag::SqlServer),
            _ => Ok(ProviderTag::from_invariant_name(s)),
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderTag::SqlServer => f.write_str(SQL_SERVER_PROVIDERS[0]),
            ProviderTag::Other(name) => f.write_str(name),
        }
    }
}

/// Kind of command execution being intercepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Returns a row count (INSERT, UPDATE, DELETE)
    NonQuery,
    /// Returns a row set
    Reader,
    /// Returns a single value
    Scalar,
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nonquery" | "non-query" => Ok(CommandKind::NonQuery),
            "reader" => Ok(CommandKind::Reader),
            "scalar" => Ok(CommandKind::Scalar),
            _ => Err(format!("Unknown command kind: {}", s)),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::NonQuery => f.write_str("NonQuery"),
            CommandKind::Reader => f.write_str("Reader"),
            CommandKind::Scalar => f.write_str("Scalar"),
        }
    }
}

/// Per-execution context supplied by the pipeline
#[derive(Debug, Clone, Default)]
pub struct InterceptionContext {
    pub provider: ProviderTag,
}

impl InterceptionContext {
    pub fn new(provider: ProviderTag) -> Self {
        Self { provider }
    }
}

/// Hooks invoked by the execution pipeline around each command.
///
/// `*_executing` hooks may mutate the command; an error fails the execution.
pub trait CommandInterceptor: Any + Send + Sync {
    fn non_query_executing(
        &self,
        _command: Option<&mut DbCommand>,
        _context: &InterceptionContext,
    ) -> Result<(), FullTextError> {
        Ok(())
    }

    fn non_query_executed(&self, _command: Option<&DbCommand>, _context: &InterceptionContext) {}

    fn reader_executing(
        &self,
        _command: Option<&mut DbCommand>,
        _context: &InterceptionContext,
    ) -> Result<(), FullTextError> {
        Ok(())
    }

    fn reader_executed(&self, _command: Option<&DbCommand>, _context: &InterceptionContext) {}

    fn scalar_executing(
        &self,
        _command: Option<&mut DbCommand>,
        _context: &InterceptionContext,
    ) -> Result<(), FullTextError> {
        Ok(())
    }

    fn scalar_executed(&self, _command: Option<&DbCommand>, _context: &InterceptionContext) {}
}

/// Configuration for [`FullTextInterceptor`]
#[derive(Debug, Clone, Default)]
pub struct InterceptorConfig {
    /// Provider whose commands are rewritten
    pub target_provider: ProviderTag,
}

/// Rewrites tagged LIKE predicates into full-text predicates before reader and scalar execution
#[derive(Debug, Default)]
pub struct FullTextInterceptor {
    config: InterceptorConfig,
    rewriter: FullTextRewriter,
}

impl FullTextInterceptor {
    pub fn new(config: InterceptorConfig) -> Self {
        Self {
            config,
            rewriter: FullTextRewriter::new(),
        }
    }

    /// Rewrite `command` if it came from the target provider.
    ///
    /// Returns `None` when the provider is not targeted and the command was left alone.
    pub fn intercept(
        &self,
        command: Option<&mut DbCommand>,
        context: &InterceptionContext,
    ) -> Result<Option<RewriteSummary>, FullTextError> {
        let command = command.ok_or(FullTextError::InvalidArgument {
            argument: "command",
        })?;

        if context.provider != self.config.target_provider {
            debug!(provider = %context.provider, "provider not targeted, command passed through");
            return Ok(None);
        }

        self.rewriter.rewrite(command).map(Some)
    }
}

impl CommandInterceptor for FullTextInterceptor {
    fn reader_executing(
        &self,
        command: Option<&mut DbCommand>,
        context: &InterceptionContext,
    ) -> Result<(), FullTextError> {
        self.intercept(command, context).map(|_| ())
    }

    fn scalar_executing(
        &self,
        command: Option<&mut DbCommand>,
        context: &InterceptionContext,
    ) -> Result<(), FullTextError> {
        self.intercept(command, context).map(|_| ())
    }
}

/// Ordered list of interceptors installed into an execution pipeline.
///
/// Registration is idempotent per interceptor type.
#[derive(Default)]
pub struct InterceptionRegistry {
    interceptors: Vec<(TypeId, Arc<dyn CommandInterceptor>)>,
}

impl InterceptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `interceptor` unless one of the same type is already installed.
    ///
    /// Returns `true` if it was added.
    pub fn register<I: CommandInterceptor>(&mut self, interceptor: I) -> bool {
        let type_id = TypeId::of::<I>();
        if self.interceptors.iter().any(|(id, _)| *id == type_id) {
            return false;
        }
        self.interceptors.push((type_id, Arc::new(interceptor)));
        true
    }

    /// Whether an interceptor of type `I` is installed
    pub fn contains<I: CommandInterceptor>(&self) -> bool {
        let type_id = TypeId::of::<I>();
        self.interceptors.iter().any(|(id, _)| *id == type_id)
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run every interceptor's pre-execution hook for `kind`, stopping at the first error
    pub fn dispatch_executing(
        &self,
        kind: CommandKind,
        command: &mut DbCommand,
        context: &InterceptionContext,
    ) -> Result<(), FullTextError> {
        for (_, interceptor) in &self.interceptors {
            match kind {
                CommandKind::NonQuery => interceptor.non_query_executing(Some(&mut *command), context)?,
                CommandKind::Reader => interceptor.reader_executing(Some(&mut *command), context)?,
                CommandKind::Scalar => interceptor.scalar_executing(Some(&mut *command), context)?,
            }
        }
        Ok(())
    }

    /// Run every interceptor's post-execution hook for `kind`
    pub fn dispatch_executed(
        &self,
        kind: CommandKind,
        command: &DbCommand,
        context: &InterceptionContext,
    ) {
        for (_, interceptor) in &self.interceptors {
            match kind {
                CommandKind::NonQuery => interceptor.non_query_executed(Some(command), context),
                CommandKind::Reader => interceptor.reader_executed(Some(command), context),
                CommandKind::Scalar => interceptor.scalar_executed(Some(command), context),
            }
        }
    }
}

impl fmt::Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionRegistry")
            .field("len", &self.interceptors.len())
            .finish()
    }
}
