//! Graph model element types
//!
//! Field names are the exporter's contract; serialization is hand-written where the
//! JSON shape depends on the element kind.

use std::collections::HashMap;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::ast::Line;

/// Vertex kind in the schema diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Table,
    View,
}

impl NodeKind {
    /// Category name used by the diagram templates
    pub fn category(&self) -> &'static str {
        match self {
            NodeKind::Table => "Table",
            NodeKind::View => "View",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            NodeKind::Table => "lightblue",
            NodeKind::View => "lightgreen",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// A table or view vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub key: String,
    pub name: String,
    /// Always empty for views
    pub columns: Vec<ColumnSpec>,
    pub kind: NodeKind,
}

impl Serialize for NodeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("NodeSpec", 5)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("columns", &self.columns)?;
        state.serialize_field("color", self.kind.color())?;
        state.serialize_field("category", self.kind.category())?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    ForeignKey,
    Dependency,
}

/// A foreign-key or object-dependency arc between two node keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

impl Serialize for EdgeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = match self.kind {
            EdgeKind::ForeignKey => 2,
            EdgeKind::Dependency => 3,
        };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("from", &self.from)?;
        map.serialize_entry("to", &self.to)?;
        if self.kind == EdgeKind::Dependency {
            map.serialize_entry("category", "Dependency")?;
        }
        map.end()
    }
}

/// `(table, line)` pair of a routine's input or output list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLine {
    #[serde(rename = "Item1")]
    pub table: String,
    #[serde(rename = "Item2")]
    pub line: Line,
}

/// Per-routine entry of `ioMapping`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineMapping {
    pub inputs: Vec<TableLine>,
    pub outputs: Vec<TableLine>,
    /// Raw body text; `null` when the catalog returned no definition
    pub code: Option<String>,
    /// Showplan XML; empty when none was retrieved
    pub execution_plan: String,
}

/// Routine name -> mapping, serialized as an object in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoMapping {
    entries: Vec<(String, RoutineMapping)>,
    /// Name -> position in `entries`
    positions: HashMap<String, usize>,
}

impl IoMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping. Returns `false` (keeping the existing one) if `name` is present.
    pub fn insert(&mut self, name: String, mapping: RoutineMapping) -> bool {
        if self.contains_key(&name) {
            return false;
        }
        self.positions.insert(name.clone(), self.entries.len());
        self.entries.push((name, mapping));
        true
    }

    pub fn get(&self, name: &str) -> Option<&RoutineMapping> {
        self.positions
            .get(name)
            .map(|&position| &self.entries[position].1)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for IoMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, mapping) in &self.entries {
            map.serialize_entry(name, mapping)?;
        }
        map.end()
    }
}

/// Object-level dependency pair, both sides non-null
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySpec {
    #[serde(rename = "ReferencingObject")]
    pub referencing: String,
    #[serde(rename = "ReferencedObject")]
    pub referenced: String,
}
