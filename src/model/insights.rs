//! Index usage heuristics

use crate::snapshot::IndexStatRecord;

/// Scan and update counts above this are considered heavy
const HEAVY_USE_THRESHOLD: u64 = 1000;

/// Warnings for indexes that are scanned but never seeked, or maintained but never seeked.
///
/// Both warnings may fire for the same index; they are emitted in record order, scan
/// warning first.
pub fn generate_performance_insights(stats: &[IndexStatRecord]) -> Vec<String> {
    let mut insights = Vec::new();
    for stat in stats {
        let table = stat.table_name.as_deref().unwrap_or("(unknown)");
        let index = stat.display_index_name();

        if stat.seeks() == 0 && stat.scans() > HEAVY_USE_THRESHOLD {
            insights.push(format!(
                "Table '{table}' with index '{index}' is heavily scanned. Consider reviewing indexing strategy."
            ));
        }
        if stat.updates() > HEAVY_USE_THRESHOLD && stat.seeks() == 0 {
            insights.push(format!(
                "Index '{index}' on table '{table}' is being updated frequently but not used for seeks. Consider dropping or modifying the index."
            ));
        }
    }
    insights
}
