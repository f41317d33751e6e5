use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rust_sqllineage::lineage::{KnownTables, TableReferenceClassifier};
use rust_sqllineage::parser::identifier_utils::base_identifier;
use rust_sqllineage::{analyze_snapshot, parse_routine, AnalyzeOptions, LineageError, ParseResult};

#[derive(Parser)]
#[command(name = "rust-sqllineage")]
#[command(author, version, about = "Routine-level data lineage for SQL Server databases")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph model document from a catalog snapshot
    Analyze {
        /// Path to the snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Output path for the model document (defaults to <snapshot>.model.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Classify triggers as well as procedures and functions
        #[arg(long)]
        include_triggers: bool,

        /// Pretty-print the model document
        #[arg(long)]
        pretty: bool,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the table references of a single routine file
    Lineage {
        /// Path to the routine definition (.sql)
        #[arg(short, long)]
        routine: PathBuf,

        /// Known table names; references to any other name are ignored
        #[arg(short, long = "table", required = true)]
        tables: Vec<String>,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            snapshot,
            output,
            include_triggers,
            pretty,
            verbose,
        } => {
            init_logging(verbose);
            let options = AnalyzeOptions {
                snapshot_path: snapshot,
                output_path: output,
                include_triggers,
                pretty,
                verbose,
            };

            analyze_snapshot(options)?;
        }
        Commands::Lineage {
            routine,
            tables,
            verbose,
        } => {
            init_logging(verbose);
            let bytes = std::fs::read(&routine).map_err(|e| LineageError::RoutineReadError {
                path: routine.clone(),
                source: e,
            })?;
            let text = rust_sqllineage::snapshot::decode_text(&bytes).map_err(|message| {
                anyhow::anyhow!("Failed to decode {}: {}", routine.display(), message)
            })?;

            match parse_routine(&text) {
                ParseResult::Parsed(ast) => {
                    // --table may be schema-qualified; the inventory holds bare names
                    let known = KnownTables::new(tables.iter().map(|t| base_identifier(t)));
                    for reference in TableReferenceClassifier::new(&known).classify(&ast) {
                        println!(
                            "{}\t{}\t{}",
                            reference.direction, reference.table_name, reference.line
                        );
                    }
                }
                ParseResult::Failed(errors) => {
                    for error in &errors {
                        eprintln!("{}: {}", routine.display(), error);
                    }
                    anyhow::bail!("{} failed to parse", routine.display());
                }
            }
        }
    }

    Ok(())
}
