//! rust-sqllineage: routine-level data lineage for SQL Server databases
//!
//! This library reads a catalog introspection snapshot, classifies every table
//! reference in each stored routine as a read or a write, and merges the result with
//! the schema facts into one graph model document for the diagram front end.

pub mod ast;
pub mod error;
pub mod export;
pub mod lineage;
pub mod model;
pub mod parser;
pub mod snapshot;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

pub use error::{LineageError, RoutineParseError};
pub use lineage::{Direction, KnownTables, LineageIndex, RoutineLineage, TableReference};
pub use model::{build_graph_model, GraphModel, ModelInputs};
pub use parser::{parse_routine, ParseResult, RoutineSource};
pub use snapshot::Snapshot;

/// Options for analyzing a snapshot
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Path to the snapshot JSON document
    pub snapshot_path: PathBuf,
    /// Output path for the model document (defaults to `<snapshot stem>.model.json`)
    pub output_path: Option<PathBuf>,
    /// Classify triggers as well as procedures and functions
    pub include_triggers: bool,
    /// Pretty-print the model document
    pub pretty: bool,
    /// Enable verbose output
    pub verbose: bool,
}

/// Analyze a snapshot file and write the model document. Returns the output path.
pub fn analyze_snapshot(options: AnalyzeOptions) -> Result<PathBuf> {
    info!("Analyzing snapshot: {}", options.snapshot_path.display());

    // Step 1: Load the snapshot
    let snapshot = snapshot::load_snapshot(&options.snapshot_path)?;

    // Step 2: Build the model
    let model = build_model_from_snapshot(&snapshot, options.include_triggers);

    if options.verbose {
        for insight in &model.performance_insights {
            info!("{}", insight);
        }
    }

    // Step 3: Determine output path
    let output_path = options
        .output_path
        .unwrap_or_else(|| default_output_path(&options.snapshot_path));

    // Step 4: Write the document
    export::write_model(&model, &output_path, options.pretty)?;

    info!("Wrote model: {}", output_path.display());
    Ok(output_path)
}

/// Parse, classify and aggregate every routine in `snapshot` into a graph model.
pub fn build_model_from_snapshot(snapshot: &Snapshot, include_triggers: bool) -> GraphModel {
    info!(
        "Found {} tables, {} views, {} routines, {} triggers",
        snapshot.table_names().count(),
        snapshot.view_names().count(),
        snapshot.routines.len(),
        snapshot.triggers.len()
    );

    let routines = parser::parse_routines(routine_bodies(snapshot, include_triggers));
    let failed = routines
        .iter()
        .filter(|r| !r.errors().is_empty())
        .count();
    info!(
        "Parsed {} routines ({} failed)",
        routines.len() - failed,
        failed
    );

    let known = KnownTables::new(snapshot.table_names());
    let lineage = lineage::classify_routines(&routines, &known);
    debug!(
        "Classified {} table references",
        lineage.iter().map(|l| l.references.len()).sum::<usize>()
    );

    let model = build_graph_model(ModelInputs::from_snapshot(snapshot, &lineage));
    info!(
        "Built model with {} nodes and {} edges",
        model.nodes.len(),
        model.edges.len()
    );
    model
}

/// `(name, body)` pairs for routines, then triggers when requested. Null names are skipped.
fn routine_bodies(snapshot: &Snapshot, include_triggers: bool) -> Vec<(String, Option<String>)> {
    let triggers: &[snapshot::RoutineRecord] = if include_triggers {
        &snapshot.triggers
    } else {
        &[]
    };

    snapshot
        .routines
        .iter()
        .chain(triggers)
        .filter_map(|record| match &record.name {
            Some(name) => Some((name.clone(), record.definition.clone())),
            None => {
                warn!("Skipping routine with null name");
                None
            }
        })
        .collect()
}

fn default_output_path(snapshot_path: &Path) -> PathBuf {
    let dir = snapshot_path.parent().unwrap_or(Path::new("."));
    let stem = snapshot_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("snapshot");
    dir.join(format!("{}.model.json", stem))
}
