use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fulltext_interceptor::capture::CaptureStatus;
use fulltext_interceptor::{rewrite_captures, CommandKind, FullTextTag, ProviderTag, RewriteOptions};

#[derive(Parser)]
#[command(name = "fulltext-interceptor")]
#[command(author, version, about = "Rewrite tagged LIKE predicates into SQL Server full-text predicates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay command captures through the full-text interceptor
    Rewrite {
        /// Capture files, directories or glob patterns
        #[arg(short, long = "input", required = true)]
        inputs: Vec<String>,

        /// Directory to write rewritten captures to (prints command text when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Provider whose commands are rewritten
        #[arg(long, default_value = "System.Data.SqlClient")]
        provider: ProviderTag,

        /// Treat every capture as coming from this provider
        #[arg(long)]
        assume_provider: Option<ProviderTag>,

        /// Treat every capture as this kind of command (Reader, Scalar, NonQuery)
        #[arg(short, long)]
        kind: Option<CommandKind>,

        /// Tokenize rewritten text and count full-text predicates
        #[arg(long)]
        verify: bool,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the tagged parameter value the translator produces for a search term
    Tag {
        /// Search term
        term: String,

        /// Use FREETEXT instead of CONTAINS
        #[arg(long)]
        freetext: bool,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("fulltext_interceptor=debug")
    } else {
        EnvFilter::new("fulltext_interceptor=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rewrite {
            inputs,
            output,
            provider,
            assume_provider,
            kind,
            verify,
            verbose,
        } => {
            init_logging(verbose);

            let print_text = output.is_none();
            let options = RewriteOptions {
                inputs,
                output_dir: output,
                target_provider: provider,
                provider_override: assume_provider,
                kind_override: kind,
                verify,
            };

            let outcomes = rewrite_captures(options)?;
            let mut failures = 0;
            for outcome in &outcomes {
                match &outcome.status {
                    CaptureStatus::Rewritten {
                        parameters,
                        predicates,
                    } => {
                        let verified = predicates
                            .map(|n| format!(", {} full-text predicate(s)", n))
                            .unwrap_or_default();
                        println!(
                            "rewritten  {} ({}{})",
                            outcome.source.display(),
                            parameters.join(", "),
                            verified
                        );
                    }
                    CaptureStatus::Unchanged => {
                        println!("unchanged  {}", outcome.source.display());
                    }
                    CaptureStatus::Failed { message } => {
                        failures += 1;
                        eprintln!("failed     {}: {}", outcome.source.display(), message);
                    }
                }
                if print_text {
                    if let Some(text) = &outcome.text {
                        println!("{}\n", text);
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{} of {} capture(s) failed", failures, outcomes.len());
            }
        }
        Commands::Tag { term, freetext } => {
            let tag = if freetext {
                FullTextTag::FreeText
            } else {
                FullTextTag::Contains
            };
            println!("{}", tag.wrap(&term));
        }
    }

    Ok(())
}
