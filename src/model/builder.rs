//! Build the graph model from snapshot facts and routine lineage
//!
//! A pure function of its inputs. Records that would break the model's closure (an edge
//! or lineage key with no node, a duplicate node key, a dependency side that is null)
//! are logged and dropped, never propagated as errors.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::lineage::{KnownTables, LineageIndex, RoutineLineage};
use crate::snapshot::{
    ColumnRecord, DependencyRecord, IndexStatRecord, RelationshipRecord, Snapshot,
};

use super::insights::generate_performance_insights;
use super::{
    ColumnSpec, DependencySpec, EdgeKind, EdgeSpec, GraphModel, IoMapping, NodeKind, NodeSpec,
    RoutineMapping, TableLine,
};

/// Everything the builder consumes, borrowed from the snapshot and the classifier
#[derive(Debug, Clone, Copy)]
pub struct ModelInputs<'a> {
    pub tables: &'a [Option<String>],
    pub views: &'a [Option<String>],
    pub columns_by_table: &'a BTreeMap<String, Vec<ColumnRecord>>,
    pub relationships: &'a [RelationshipRecord],
    pub dependencies: &'a [DependencyRecord],
    /// In routine processing order; this order fixes `tableUsage` row order
    pub lineage_by_routine: &'a [RoutineLineage],
    pub execution_plans: &'a BTreeMap<String, Option<String>>,
    pub index_stats: &'a [IndexStatRecord],
}

impl<'a> ModelInputs<'a> {
    pub fn from_snapshot(snapshot: &'a Snapshot, lineage: &'a [RoutineLineage]) -> Self {
        Self {
            tables: &snapshot.tables,
            views: &snapshot.views,
            columns_by_table: &snapshot.columns,
            relationships: &snapshot.relationships,
            dependencies: &snapshot.dependencies,
            lineage_by_routine: lineage,
            execution_plans: &snapshot.execution_plans,
            index_stats: &snapshot.index_statistics,
        }
    }
}

/// Lowercase key -> node key spelling
struct NodeKeys {
    by_lower: HashMap<String, String>,
}

impl NodeKeys {
    fn resolve(&self, name: &str) -> Option<&str> {
        self.by_lower.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Build the graph model
pub fn build_graph_model(inputs: ModelInputs<'_>) -> GraphModel {
    let (nodes, keys) = build_nodes(&inputs);
    let known_tables = KnownTables::new(
        nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Table)
            .map(|n| n.key.as_str()),
    );

    let mut edges = build_foreign_key_edges(inputs.relationships, &keys);
    let (dependencies, dependency_edges) = build_dependencies(inputs.dependencies, &keys);
    edges.extend(dependency_edges);

    let io_mapping = build_io_mapping(inputs.lineage_by_routine, inputs.execution_plans);
    let table_usage = build_table_usage(&nodes, &known_tables, inputs.lineage_by_routine);
    let performance_insights = generate_performance_insights(inputs.index_stats);

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        routines = io_mapping.len(),
        insights = performance_insights.len(),
        "Built graph model"
    );

    GraphModel {
        nodes,
        edges,
        io_mapping,
        table_usage,
        dependencies,
        performance_insights,
    }
}

/// One node per table (with columns), then one per view. First spelling of a key wins.
fn build_nodes(inputs: &ModelInputs<'_>) -> (Vec<NodeSpec>, NodeKeys) {
    let columns_by_lower: HashMap<String, &Vec<ColumnRecord>> = inputs
        .columns_by_table
        .iter()
        .map(|(table, columns)| (table.to_lowercase(), columns))
        .collect();

    let mut nodes = Vec::with_capacity(inputs.tables.len() + inputs.views.len());
    let mut by_lower: HashMap<String, String> = HashMap::new();

    let candidates = inputs
        .tables
        .iter()
        .map(|t| (t, NodeKind::Table))
        .chain(inputs.views.iter().map(|v| (v, NodeKind::View)));

    for (name, kind) in candidates {
        let Some(name) = name.as_deref() else {
            warn!(kind = kind.category(), "Skipping object with null name");
            continue;
        };
        let lower = name.to_lowercase();
        if let Some(existing) = by_lower.get(&lower) {
            warn!(
                name,
                existing = existing.as_str(),
                "Skipping duplicate node key"
            );
            continue;
        }

        let columns = match kind {
            NodeKind::Table => columns_by_lower
                .get(&lower)
                .map(|columns| column_specs(columns))
                .unwrap_or_default(),
            NodeKind::View => Vec::new(),
        };

        by_lower.insert(lower, name.to_string());
        nodes.push(NodeSpec {
            key: name.to_string(),
            name: name.to_string(),
            columns,
            kind,
        });
    }

    (nodes, NodeKeys { by_lower })
}

fn column_specs(columns: &[ColumnRecord]) -> Vec<ColumnSpec> {
    columns
        .iter()
        .filter_map(|c| {
            Some(ColumnSpec {
                name: c.name.clone()?,
                data_type: c.data_type.clone().unwrap_or_default(),
            })
        })
        .collect()
}

fn build_foreign_key_edges(relationships: &[RelationshipRecord], keys: &NodeKeys) -> Vec<EdgeSpec> {
    relationships
        .iter()
        .filter_map(|rel| {
            let edge = resolve_edge(
                rel.referencing_table.as_deref(),
                rel.referenced_table.as_deref(),
                keys,
                EdgeKind::ForeignKey,
            );
            if edge.is_none() {
                warn!(
                    from = ?rel.referencing_table,
                    to = ?rel.referenced_table,
                    "Dropping foreign key edge that does not resolve to two nodes"
                );
            }
            edge
        })
        .collect()
}

/// The dependency list keeps every record with both sides present; edges are drawn only
/// between two nodes.
fn build_dependencies(
    records: &[DependencyRecord],
    keys: &NodeKeys,
) -> (Vec<DependencySpec>, Vec<EdgeSpec>) {
    let mut dependencies = Vec::with_capacity(records.len());
    let mut edges = Vec::new();

    for record in records {
        let (Some(referencing), Some(referenced)) = (
            record.referencing_object.as_deref(),
            record.referenced_object.as_deref(),
        ) else {
            warn!(
                referencing = ?record.referencing_object,
                referenced = ?record.referenced_object,
                "Dropping dependency with a null side"
            );
            continue;
        };

        dependencies.push(DependencySpec {
            referencing: referencing.to_string(),
            referenced: referenced.to_string(),
        });

        match resolve_edge(Some(referencing), Some(referenced), keys, EdgeKind::Dependency) {
            Some(edge) => edges.push(edge),
            None => warn!(
                referencing,
                referenced, "Dropping dependency edge that does not resolve to two nodes"
            ),
        }
    }

    (dependencies, edges)
}

fn resolve_edge(
    from: Option<&str>,
    to: Option<&str>,
    keys: &NodeKeys,
    kind: EdgeKind,
) -> Option<EdgeSpec> {
    Some(EdgeSpec {
        from: keys.resolve(from?)?.to_string(),
        to: keys.resolve(to?)?.to_string(),
        kind,
    })
}

fn build_io_mapping(
    lineage: &[RoutineLineage],
    execution_plans: &BTreeMap<String, Option<String>>,
) -> IoMapping {
    let plans_by_lower: HashMap<String, &Option<String>> = execution_plans
        .iter()
        .map(|(name, plan)| (name.to_lowercase(), plan))
        .collect();

    let mut mapping = IoMapping::new();
    for routine in lineage {
        let execution_plan = execution_plans
            .get(&routine.name)
            .or_else(|| plans_by_lower.get(&routine.name.to_lowercase()).copied())
            .cloned()
            .flatten()
            .unwrap_or_default();

        let entry = RoutineMapping {
            inputs: routine.inputs().map(table_line).collect(),
            outputs: routine.outputs().map(table_line).collect(),
            code: routine.code.clone(),
            execution_plan,
        };
        if !mapping.insert(routine.name.clone(), entry) {
            warn!(routine = %routine.name, "Skipping duplicate routine name");
        }
    }
    mapping
}

fn table_line(reference: &crate::lineage::TableReference) -> TableLine {
    TableLine {
        table: reference.table_name.clone(),
        line: reference.line,
    }
}

fn build_table_usage(
    nodes: &[NodeSpec],
    known_tables: &KnownTables,
    lineage: &[RoutineLineage],
) -> LineageIndex {
    let mut index = LineageIndex::with_tables(
        nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Table)
            .map(|n| n.key.as_str()),
    );
    for routine in lineage {
        index.aggregate(&routine.name, &routine.references);
    }
    for table in index.retain_known(known_tables) {
        warn!(table = %table, "Dropping lineage for a table with no node");
    }
    index
}
