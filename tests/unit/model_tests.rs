//! Graph model builder tests

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::json;

use rust_sqllineage::model::{
    build_graph_model, generate_performance_insights, EdgeKind, ModelInputs, NodeKind,
};
use rust_sqllineage::snapshot::{
    ColumnRecord, DependencyRecord, IndexStatRecord, RelationshipRecord, RoutineRecord, Snapshot,
};
use rust_sqllineage::{build_model_from_snapshot, RoutineLineage};

fn names(items: &[&str]) -> Vec<Option<String>> {
    items.iter().map(|s| Some(s.to_string())).collect()
}

fn routine(name: &str, definition: Option<&str>) -> RoutineRecord {
    RoutineRecord {
        name: Some(name.to_string()),
        definition: definition.map(str::to_string),
    }
}

fn column(name: &str, data_type: &str) -> ColumnRecord {
    ColumnRecord {
        name: Some(name.to_string()),
        data_type: Some(data_type.to_string()),
    }
}

fn stat(seeks: u64, scans: u64, updates: u64) -> IndexStatRecord {
    IndexStatRecord {
        table_name: Some("Orders".to_string()),
        index_name: Some("IX_Orders_Customer".to_string()),
        index_type: Some("NONCLUSTERED".to_string()),
        user_seeks: Some(seeks),
        user_scans: Some(scans),
        user_lookups: Some(0),
        user_updates: Some(updates),
        ..Default::default()
    }
}

fn sample_snapshot() -> Snapshot {
    let mut columns = BTreeMap::new();
    columns.insert(
        "orders".to_string(),
        vec![column("Id", "int"), column("CustomerId", "int")],
    );
    columns.insert("Customers".to_string(), vec![column("Id", "int")]);

    Snapshot {
        tables: names(&["Orders", "Customers", "Staging"]),
        views: names(&["OpenOrders"]),
        columns,
        relationships: vec![RelationshipRecord {
            referencing_table: Some("Orders".to_string()),
            referenced_table: Some("Customers".to_string()),
        }],
        routines: vec![
            routine(
                "dbo.LoadOrders",
                Some("CREATE PROCEDURE dbo.LoadOrders AS\nINSERT INTO Orders\nSELECT * FROM Staging"),
            ),
            routine("dbo.Broken", Some("UPDATE Orders WHERE Id = 1")),
            routine("dbo.Encrypted", None),
        ],
        triggers: vec![routine(
            "trg_Orders",
            Some("CREATE TRIGGER trg_Orders ON Orders AFTER INSERT AS\nUPDATE Customers SET Id = Id"),
        )],
        dependencies: vec![
            DependencyRecord {
                referencing_object: Some("OpenOrders".to_string()),
                referenced_object: Some("Orders".to_string()),
            },
            DependencyRecord {
                referencing_object: Some("dbo.LoadOrders".to_string()),
                referenced_object: None,
            },
        ],
        execution_plans: BTreeMap::from([(
            "dbo.LoadOrders".to_string(),
            Some("<ShowPlanXML/>".to_string()),
        )]),
        index_statistics: vec![stat(0, 1500, 0)],
    }
}

// ============================================================================
// Nodes and edges
// ============================================================================

#[test]
fn test_nodes_for_tables_then_views() {
    let model = build_model_from_snapshot(&sample_snapshot(), false);
    let keys: Vec<(&str, NodeKind)> = model.nodes.iter().map(|n| (n.key.as_str(), n.kind)).collect();
    assert_eq!(
        keys,
        vec![
            ("Orders", NodeKind::Table),
            ("Customers", NodeKind::Table),
            ("Staging", NodeKind::Table),
            ("OpenOrders", NodeKind::View),
        ]
    );
    // Column lookup is case-insensitive; tables without columns get an empty list
    assert_eq!(model.node("orders").unwrap().columns.len(), 2);
    assert!(model.node("Staging").unwrap().columns.is_empty());
    assert!(model.node("OpenOrders").unwrap().columns.is_empty());
}

#[test]
fn test_duplicate_node_keys_keep_first() {
    let mut snapshot = sample_snapshot();
    snapshot.tables.push(Some("ORDERS".to_string()));
    snapshot.views.push(Some("orders".to_string()));
    snapshot.tables.push(None);
    let model = build_model_from_snapshot(&snapshot, false);
    assert_eq!(model.nodes.len(), 4);
    assert_eq!(model.node("orders").unwrap().kind, NodeKind::Table);
}

#[test]
fn test_foreign_key_and_dependency_edges() {
    let model = build_model_from_snapshot(&sample_snapshot(), false);
    let fks: Vec<(&str, &str)> = model
        .edges_of_kind(EdgeKind::ForeignKey)
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    assert_eq!(fks, vec![("Orders", "Customers")]);

    let deps: Vec<(&str, &str)> = model
        .edges_of_kind(EdgeKind::Dependency)
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    assert_eq!(deps, vec![("OpenOrders", "Orders")]);
}

#[test]
fn test_dangling_foreign_key_is_dropped() {
    let mut snapshot = sample_snapshot();
    snapshot.relationships.push(RelationshipRecord {
        referencing_table: Some("Orders".to_string()),
        referenced_table: Some("Ghost".to_string()),
    });
    snapshot.relationships.push(RelationshipRecord {
        referencing_table: None,
        referenced_table: Some("Orders".to_string()),
    });
    let model = build_model_from_snapshot(&snapshot, false);
    assert_eq!(model.edges_of_kind(EdgeKind::ForeignKey).count(), 1);
    for edge in &model.edges {
        assert!(model.node(&edge.from).is_some());
        assert!(model.node(&edge.to).is_some());
    }
}

#[test]
fn test_edge_endpoints_use_node_spelling() {
    let mut snapshot = sample_snapshot();
    snapshot.relationships = vec![RelationshipRecord {
        referencing_table: Some("ORDERS".to_string()),
        referenced_table: Some("customers".to_string()),
    }];
    let model = build_model_from_snapshot(&snapshot, false);
    assert_eq!(model.edges[0].from, "Orders");
    assert_eq!(model.edges[0].to, "Customers");
}

// ============================================================================
// Dependencies
// ============================================================================

#[test]
fn test_null_dependency_is_dropped() {
    let model = build_model_from_snapshot(&sample_snapshot(), false);
    assert_eq!(model.dependencies.len(), 1);
    assert_eq!(model.dependencies[0].referencing, "OpenOrders");
    assert_eq!(model.dependencies[0].referenced, "Orders");
}

#[test]
fn test_routine_dependency_is_listed_without_an_edge() {
    let mut snapshot = sample_snapshot();
    snapshot.dependencies.push(DependencyRecord {
        referencing_object: Some("dbo.LoadOrders".to_string()),
        referenced_object: Some("Staging".to_string()),
    });
    let model = build_model_from_snapshot(&snapshot, false);
    assert_eq!(model.dependencies.len(), 2);
    assert_eq!(model.edges_of_kind(EdgeKind::Dependency).count(), 1);
}

// ============================================================================
// ioMapping and tableUsage
// ============================================================================

#[test]
fn test_io_mapping_covers_every_routine() {
    let model = build_model_from_snapshot(&sample_snapshot(), false);
    let keys: Vec<&str> = model.io_mapping.keys().collect();
    assert_eq!(keys, vec!["dbo.LoadOrders", "dbo.Broken", "dbo.Encrypted"]);

    let load = model.io_mapping.get("dbo.LoadOrders").unwrap();
    assert_eq!(load.outputs.len(), 1);
    assert_eq!(load.outputs[0].table, "Orders");
    assert_eq!(load.outputs[0].line, 2);
    assert_eq!(load.inputs[0].table, "Staging");
    assert_eq!(load.inputs[0].line, 3);
    assert_eq!(load.execution_plan, "<ShowPlanXML/>");

    let broken = model.io_mapping.get("dbo.Broken").unwrap();
    assert!(broken.inputs.is_empty() && broken.outputs.is_empty());
    assert_eq!(broken.code.as_deref(), Some("UPDATE Orders WHERE Id = 1"));
    assert_eq!(broken.execution_plan, "");

    let encrypted = model.io_mapping.get("dbo.Encrypted").unwrap();
    assert!(encrypted.code.is_none());
    assert_eq!(encrypted.execution_plan, "");
}

#[test]
fn test_triggers_are_opt_in() {
    let without = build_model_from_snapshot(&sample_snapshot(), false);
    assert!(!without.io_mapping.contains_key("trg_Orders"));

    let with = build_model_from_snapshot(&sample_snapshot(), true);
    let trigger = with.io_mapping.get("trg_Orders").unwrap();
    assert_eq!(trigger.outputs[0].table, "Customers");
    assert_eq!(trigger.outputs[0].line, 2);
}

#[test]
fn test_table_usage_seeded_for_every_table_not_views() {
    let model = build_model_from_snapshot(&sample_snapshot(), false);
    let keys: Vec<&str> = model.table_usage.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["customers", "orders", "staging"]);
    assert!(model.table_usage.get("customers").unwrap().is_empty());
    assert_eq!(
        model.table_usage.get("orders").unwrap().outputs[0].routine_name,
        "dbo.LoadOrders"
    );
}

#[test]
fn test_lineage_for_unknown_table_is_dropped() {
    let snapshot = sample_snapshot();
    let lineage = vec![RoutineLineage {
        name: "p".to_string(),
        references: vec![rust_sqllineage::TableReference {
            table_name: "Ghost".to_string(),
            line: 1,
            direction: rust_sqllineage::Direction::Input,
        }],
        code: None,
    }];
    let model = build_graph_model(ModelInputs::from_snapshot(&snapshot, &lineage));
    assert!(model.table_usage.get("ghost").is_none());
    assert_eq!(model.table_usage.len(), 3);
}

#[test]
fn test_execution_plan_lookup_is_case_insensitive() {
    let mut snapshot = sample_snapshot();
    snapshot.execution_plans = BTreeMap::from([
        ("DBO.LOADORDERS".to_string(), Some("<plan/>".to_string())),
        ("dbo.Broken".to_string(), None),
    ]);
    let model = build_model_from_snapshot(&snapshot, false);
    assert_eq!(model.io_mapping.get("dbo.LoadOrders").unwrap().execution_plan, "<plan/>");
    assert_eq!(model.io_mapping.get("dbo.Broken").unwrap().execution_plan, "");
}

// ============================================================================
// Performance insights
// ============================================================================

#[test]
fn test_heavily_scanned_index() {
    let insights = generate_performance_insights(&[stat(0, 1500, 0)]);
    assert_eq!(
        insights,
        vec!["Table 'Orders' with index 'IX_Orders_Customer' is heavily scanned. Consider reviewing indexing strategy."]
    );
}

#[test]
fn test_frequently_updated_index() {
    let insights = generate_performance_insights(&[stat(0, 0, 2000)]);
    assert_eq!(
        insights,
        vec!["Index 'IX_Orders_Customer' on table 'Orders' is being updated frequently but not used for seeks. Consider dropping or modifying the index."]
    );
}

#[test]
fn test_both_insights_for_one_index() {
    let insights = generate_performance_insights(&[stat(0, 1500, 2000)]);
    assert_eq!(insights.len(), 2);
    assert!(insights[0].contains("heavily scanned"));
    assert!(insights[1].contains("updated frequently"));
}

#[test]
fn test_seeked_index_has_no_insights() {
    assert!(generate_performance_insights(&[stat(1, 1500, 2000)]).is_empty());
}

// ============================================================================
// Serialized shape
// ============================================================================

#[test]
fn test_document_shape() {
    let model = build_model_from_snapshot(&sample_snapshot(), false);
    let doc = serde_json::to_value(&model).unwrap();

    assert_eq!(
        doc["nodeDataArray"][0],
        json!({
            "key": "Orders",
            "name": "Orders",
            "columns": [{"name": "Id", "type": "int"}, {"name": "CustomerId", "type": "int"}],
            "color": "lightblue",
            "category": "Table"
        })
    );
    assert_eq!(doc["linkDataArray"][0], json!({"from": "Orders", "to": "Customers"}));
    assert_eq!(
        doc["linkDataArray"][1],
        json!({"from": "OpenOrders", "to": "Orders", "category": "Dependency"})
    );
    assert_eq!(
        doc["ioMapping"]["dbo.LoadOrders"]["inputs"],
        json!([{"Item1": "Staging", "Item2": 3}])
    );
    assert_eq!(doc["ioMapping"]["dbo.Encrypted"]["code"], json!(null));
    assert_eq!(
        doc["tableUsage"]["staging"]["inputs"],
        json!([{"RoutineName": "dbo.LoadOrders", "LineNumber": 3, "note": null}])
    );
    assert_eq!(
        doc["dependencies"],
        json!([{"ReferencingObject": "OpenOrders", "ReferencedObject": "Orders"}])
    );
    assert_eq!(doc["performanceInsights"].as_array().unwrap().len(), 1);
}

#[test]
fn test_dotted_table_name_is_kept_apart_from_its_suffix() {
    let snapshot = Snapshot {
        tables: names(&["odd.name", "Name"]),
        routines: vec![routine(
            "p1",
            Some("UPDATE [odd.name] SET a = 1;\nSELECT * FROM Name"),
        )],
        ..Default::default()
    };
    let model = build_model_from_snapshot(&snapshot, false);
    let doc = serde_json::to_value(&model).unwrap();

    assert_eq!(
        doc["ioMapping"]["p1"],
        json!({
            "inputs": [{"Item1": "Name", "Item2": 2}],
            "outputs": [{"Item1": "odd.name", "Item2": 1}],
            "code": "UPDATE [odd.name] SET a = 1;\nSELECT * FROM Name",
            "executionPlan": ""
        })
    );
    assert_eq!(
        doc["tableUsage"]["odd.name"]["outputs"],
        json!([{"RoutineName": "p1", "LineNumber": 1, "note": null}])
    );
    assert_eq!(
        doc["tableUsage"]["name"]["inputs"],
        json!([{"RoutineName": "p1", "LineNumber": 2, "note": null}])
    );
}
