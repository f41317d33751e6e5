//! Table reference classification tests

use pretty_assertions::assert_eq;

use rust_sqllineage::ast::Line;
use rust_sqllineage::lineage::{Direction, KnownTables, TableReferenceClassifier};
use rust_sqllineage::parser::StatementParser;

use Direction::{Input, Output};

/// Classify `sql` against `tables`, asserting the direction stack is balanced afterwards.
fn classify(sql: &str, tables: &[&str]) -> Vec<(String, Line, Direction)> {
    let ast = StatementParser::new(sql)
        .and_then(|mut p| p.parse_routine())
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
    let known = KnownTables::new(tables.iter().copied());
    let mut classifier = TableReferenceClassifier::new(&known);
    let references = classifier.classify(&ast);
    assert_eq!(classifier.stack_depth(), 1, "direction stack is unbalanced");
    references
        .into_iter()
        .map(|r| (r.table_name, r.line, r.direction))
        .collect()
}

fn r(table: &str, line: Line, direction: Direction) -> (String, Line, Direction) {
    (table.to_string(), line, direction)
}

// ============================================================================
// Statement kinds
// ============================================================================

#[test]
fn test_insert_select() {
    let refs = classify("INSERT INTO T1\nSELECT * FROM T2", &["T1", "T2"]);
    assert_eq!(refs, vec![r("T1", 1, Output), r("T2", 2, Input)]);
}

#[test]
fn test_update_with_set_subquery_and_where_in() {
    let refs = classify(
        "UPDATE T1\nSET c = (SELECT x FROM T2)\nWHERE id IN (SELECT id FROM T3)",
        &["T1", "T2", "T3"],
    );
    // WHERE is walked before the SET list
    assert_eq!(
        refs,
        vec![r("T1", 1, Output), r("T3", 3, Input), r("T2", 2, Input)]
    );
}

#[test]
fn test_delete_with_subquery() {
    let refs = classify("DELETE FROM T1\nWHERE id IN (SELECT id FROM T2)", &["T1", "T2"]);
    assert_eq!(refs, vec![r("T1", 1, Output), r("T2", 2, Input)]);
}

#[test]
fn test_bare_select_is_input() {
    let refs = classify("SELECT a FROM T1 JOIN T2 ON T1.id = T2.id", &["T1", "T2"]);
    assert_eq!(refs, vec![r("T1", 1, Input), r("T2", 1, Input)]);
}

#[test]
fn test_insert_values_subquery_is_input() {
    let refs = classify(
        "INSERT INTO Audit (Id, Total)\nVALUES (1, (SELECT SUM(Total) FROM Orders))",
        &["Audit", "Orders"],
    );
    assert_eq!(refs, vec![r("Audit", 1, Output), r("Orders", 2, Input)]);
}

#[test]
fn test_update_from_join() {
    let refs = classify(
        "UPDATE Orders\nSET Total = c.Total\nFROM Orders o\nJOIN Customers c ON c.Id = o.CustomerId",
        &["Orders", "Customers"],
    );
    assert_eq!(
        refs,
        vec![
            r("Orders", 1, Output),
            r("Orders", 3, Input),
            r("Customers", 4, Input)
        ]
    );
}

#[test]
fn test_delete_alias_target_with_from() {
    // The target `o` is an alias, not a known table name
    let refs = classify(
        "DELETE o\nFROM Orders o\nWHERE EXISTS (SELECT 1 FROM Archive a WHERE a.Id = o.Id)",
        &["Orders", "Archive"],
    );
    assert_eq!(refs, vec![r("Orders", 2, Input), r("Archive", 3, Input)]);
}

#[test]
fn test_with_cte_reads_are_input() {
    let refs = classify(
        "WITH recent AS (SELECT Id FROM Orders WHERE Date > @d)\nINSERT INTO Summary SELECT Id FROM recent",
        &["Orders", "Summary"],
    );
    assert_eq!(refs, vec![r("Orders", 1, Input), r("Summary", 2, Output)]);
}

// ============================================================================
// Nesting and control flow
// ============================================================================

#[test]
fn test_statements_inside_control_flow() {
    let sql = "CREATE PROCEDURE dbo.Sync @Id INT\nAS\nBEGIN\n  SET NOCOUNT ON;\n  IF EXISTS (SELECT 1 FROM Staging WHERE Id = @Id)\n  BEGIN\n    UPDATE Target SET Flag = 1 WHERE Id = @Id\n  END\n  ELSE\n    INSERT INTO Target (Id) VALUES (@Id)\n  WHILE (SELECT COUNT(*) FROM Queue) > 0\n    DELETE TOP (1) FROM Queue\nEND";
    let refs = classify(sql, &["Staging", "Target", "Queue"]);
    assert_eq!(
        refs,
        vec![
            r("Staging", 5, Input),
            r("Target", 7, Output),
            r("Target", 10, Output),
            r("Queue", 11, Input),
            r("Queue", 12, Output),
        ]
    );
}

#[test]
fn test_derived_table_and_apply() {
    let refs = classify(
        "SELECT *\nFROM (SELECT Id FROM Orders) o\nCROSS APPLY (SELECT TOP 1 * FROM Lines l WHERE l.OrderId = o.Id) x",
        &["Orders", "Lines"],
    );
    assert_eq!(refs, vec![r("Orders", 2, Input), r("Lines", 3, Input)]);
}

#[test]
fn test_set_variable_from_subquery() {
    let refs = classify(
        "DECLARE @n INT\nSET @n = (SELECT COUNT(*) FROM Orders)\nRETURN @n",
        &["Orders"],
    );
    assert_eq!(refs, vec![r("Orders", 2, Input)]);
}

#[test]
fn test_union_operands_are_input() {
    let refs = classify(
        "INSERT INTO AllNames\nSELECT Name FROM Customers\nUNION\nSELECT Name FROM Suppliers",
        &["AllNames", "Customers", "Suppliers"],
    );
    assert_eq!(
        refs,
        vec![
            r("AllNames", 1, Output),
            r("Customers", 2, Input),
            r("Suppliers", 4, Input)
        ]
    );
}

// ============================================================================
// Matching policy
// ============================================================================

#[test]
fn test_unknown_names_are_dropped() {
    let sql = "INSERT INTO #tmp SELECT * FROM Missing\nUPDATE @t SET a = 1\nDELETE FROM SomeView\nSELECT * FROM cte";
    let refs = classify(sql, &["Orders"]);
    assert!(refs.is_empty(), "{refs:?}");
}

#[test]
fn test_matching_is_case_insensitive_and_uses_inventory_spelling() {
    let refs = classify(
        "SELECT * FROM [dbo].[ORDERS] JOIN sales.dbo.orders o2 ON 1 = 1",
        &["Orders"],
    );
    assert_eq!(refs, vec![r("Orders", 1, Input), r("Orders", 1, Input)]);
}

#[test]
fn test_self_referencing_update_records_clause_walk() {
    let refs = classify("UPDATE T SET x = (SELECT MAX(y) FROM T)", &["T"]);
    assert_eq!(refs, vec![r("T", 1, Output), r("T", 1, Input)]);
}

#[test]
fn test_classifier_is_reusable() {
    let known = KnownTables::new(["T"]);
    let mut classifier = TableReferenceClassifier::new(&known);
    let ast = StatementParser::new("DELETE FROM T")
        .unwrap()
        .parse_routine()
        .unwrap();
    assert_eq!(classifier.classify(&ast).len(), 1);
    assert_eq!(classifier.classify(&ast).len(), 1);
    assert_eq!(classifier.stack_depth(), 1);
}
