//! Introspection snapshot records
//!
//! One JSON document per run, produced by the catalog introspection layer. Every
//! collection may be missing or `null` and every scalar may be `null`; a bad record is
//! skipped or defaulted by its consumer, never rejected here.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// All introspection results for one database, taken at one point in time
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tables: Vec<Option<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub views: Vec<Option<String>>,
    /// Table name -> ordered columns
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: BTreeMap<String, Vec<ColumnRecord>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relationships: Vec<RelationshipRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub routines: Vec<RoutineRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub triggers: Vec<RoutineRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<DependencyRecord>,
    /// Routine name -> showplan XML
    #[serde(default, deserialize_with = "null_as_default")]
    pub execution_plans: BTreeMap<String, Option<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub index_statistics: Vec<IndexStatRecord>,
}

impl Snapshot {
    /// Non-null table names, in snapshot order
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().filter_map(|t| t.as_deref())
    }

    /// Non-null view names, in snapshot order
    pub fn view_names(&self) -> impl Iterator<Item = &str> {
        self.views.iter().filter_map(|v| v.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColumnRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub data_type: Option<String>,
}

/// Foreign key: referencing (child) table -> referenced (parent) table
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    #[serde(default)]
    pub referencing_table: Option<String>,
    #[serde(default)]
    pub referenced_table: Option<String>,
}

/// A procedure, function or trigger and its definition text
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutineRecord {
    #[serde(default)]
    pub name: Option<String>,
    /// `None` for encrypted modules or when the login lacks VIEW DEFINITION
    #[serde(default)]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRecord {
    #[serde(default)]
    pub referencing_object: Option<String>,
    #[serde(default)]
    pub referenced_object: Option<String>,
}

/// Index usage counters for one (table, index)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatRecord {
    #[serde(default)]
    pub table_name: Option<String>,
    /// `None` for heaps
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub index_type: Option<String>,
    #[serde(default)]
    pub user_seeks: Option<u64>,
    #[serde(default)]
    pub user_scans: Option<u64>,
    #[serde(default)]
    pub user_lookups: Option<u64>,
    #[serde(default)]
    pub user_updates: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_user_seek: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_user_scan: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_user_lookup: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_user_update: Option<NaiveDateTime>,
}

impl IndexStatRecord {
    pub fn seeks(&self) -> u64 {
        self.user_seeks.unwrap_or(0)
    }

    pub fn scans(&self) -> u64 {
        self.user_scans.unwrap_or(0)
    }

    pub fn lookups(&self) -> u64 {
        self.user_lookups.unwrap_or(0)
    }

    pub fn updates(&self) -> u64 {
        self.user_updates.unwrap_or(0)
    }

    /// Index name for display: its name, else its type (heaps), else `(unnamed)`
    pub fn display_index_name(&self) -> &str {
        self.index_name
            .as_deref()
            .or(self.index_type.as_deref())
            .unwrap_or("(unnamed)")
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Accepts ISO-8601 or SQL Server `datetime` text. Unparseable values become `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = text.trim().trim_end_matches('Z');
    Ok(TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok()))
}
