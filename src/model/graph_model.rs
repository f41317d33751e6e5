//! Graph model representation

use serde::Serialize;

use super::{DependencySpec, EdgeKind, EdgeSpec, IoMapping, NodeKind, NodeSpec};
use crate::lineage::LineageIndex;

/// The complete schema and lineage model handed to the exporter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphModel {
    #[serde(rename = "nodeDataArray")]
    pub nodes: Vec<NodeSpec>,
    #[serde(rename = "linkDataArray")]
    pub edges: Vec<EdgeSpec>,
    #[serde(rename = "ioMapping")]
    pub io_mapping: IoMapping,
    #[serde(rename = "tableUsage")]
    pub table_usage: LineageIndex,
    pub dependencies: Vec<DependencySpec>,
    #[serde(rename = "performanceInsights")]
    pub performance_insights: Vec<String>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node with `key`, compared case-insensitively
    pub fn node(&self, key: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.key.eq_ignore_ascii_case(key))
    }

    pub fn tables(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Table)
    }

    pub fn views(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::View)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &EdgeSpec> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }
}
