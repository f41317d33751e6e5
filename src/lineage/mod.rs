//! Routine lineage: per-routine table reference classification and the cross-routine
//! usage index

mod classifier;
mod index;

pub use classifier::{Direction, KnownTables, TableReference, TableReferenceClassifier};
pub use index::{LineageIndex, RoutineReference, TableUsage};

use rayon::prelude::*;

use crate::parser::RoutineSource;

/// Lineage of one routine, as handed to the model builder
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineLineage {
    pub name: String,
    /// Empty when the body failed to parse or was absent
    pub references: Vec<TableReference>,
    /// Raw body text, `None` when the catalog returned no definition
    pub code: Option<String>,
}

impl RoutineLineage {
    pub fn inputs(&self) -> impl Iterator<Item = &TableReference> {
        self.references
            .iter()
            .filter(|r| r.direction == Direction::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &TableReference> {
        self.references
            .iter()
            .filter(|r| r.direction == Direction::Output)
    }
}

/// Minimum number of routines to benefit from parallel classification
const PARALLEL_THRESHOLD: usize = 8;

/// Classify one routine. Failed or absent bodies yield no references.
pub fn classify_routine(routine: &RoutineSource, known: &KnownTables) -> RoutineLineage {
    let references = routine
        .ast()
        .map(|ast| TableReferenceClassifier::new(known).classify(ast))
        .unwrap_or_default();
    RoutineLineage {
        name: routine.name.clone(),
        references,
        code: routine.body_text.clone(),
    }
}

/// Classify every routine, in parallel for larger snapshots. Output order matches input order.
pub fn classify_routines(routines: &[RoutineSource], known: &KnownTables) -> Vec<RoutineLineage> {
    if routines.len() >= PARALLEL_THRESHOLD {
        routines
            .par_iter()
            .map(|routine| classify_routine(routine, known))
            .collect()
    } else {
        routines
            .iter()
            .map(|routine| classify_routine(routine, known))
            .collect()
    }
}
