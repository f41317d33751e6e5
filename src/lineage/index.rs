//! Case-insensitive per-table usage index

use std::collections::BTreeMap;

use serde::Serialize;

use super::classifier::{Direction, KnownTables, TableReference};
use crate::ast::Line;

/// One `(routine, line)` usage of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineReference {
    #[serde(rename = "RoutineName")]
    pub routine_name: String,
    #[serde(rename = "LineNumber")]
    pub line_number: Line,
    /// Filled in by the presentation layer; always `None` from the core
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableUsage {
    pub inputs: Vec<RoutineReference>,
    pub outputs: Vec<RoutineReference>,
}

impl TableUsage {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// Lowercase table name -> usage, accumulated across routines.
///
/// Appending is order-sensitive and not idempotent: aggregating the same routine twice
/// duplicates its rows. Call [`LineageIndex::aggregate`] once per routine per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineageIndex {
    entries: BTreeMap<String, TableUsage>,
}

impl LineageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index pre-seeded with an empty entry for every known table.
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = tables
            .into_iter()
            .map(|t| (t.as_ref().to_lowercase(), TableUsage::default()))
            .collect();
        Self { entries }
    }

    /// Append one routine's references, in order, under their lowercase table names.
    pub fn aggregate(&mut self, routine_name: &str, references: &[TableReference]) {
        for reference in references {
            let usage = self
                .entries
                .entry(reference.table_name.to_lowercase())
                .or_default();
            let row = RoutineReference {
                routine_name: routine_name.to_string(),
                line_number: reference.line,
                note: None,
            };
            match reference.direction {
                Direction::Input => usage.inputs.push(row),
                Direction::Output => usage.outputs.push(row),
            }
        }
    }

    /// Append every row of `other` after this index's rows for the same table.
    pub fn merge(&mut self, other: LineageIndex) {
        for (table, usage) in other.entries {
            let entry = self.entries.entry(table).or_default();
            entry.inputs.extend(usage.inputs);
            entry.outputs.extend(usage.outputs);
        }
    }

    /// Drop entries whose table is not in `known`, returning the dropped keys.
    pub fn retain_known(&mut self, known: &KnownTables) -> Vec<String> {
        let dropped: Vec<String> = self
            .entries
            .keys()
            .filter(|k| !known.contains(k))
            .cloned()
            .collect();
        for key in &dropped {
            self.entries.remove(key);
        }
        dropped
    }

    /// Usage for `table`, looked up case-insensitively.
    pub fn get(&self, table: &str) -> Option<&TableUsage> {
        self.entries.get(&table.to_lowercase())
    }

    pub fn contains_key(&self, table: &str) -> bool {
        self.entries.contains_key(&table.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableUsage)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
