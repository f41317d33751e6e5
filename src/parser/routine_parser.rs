//! Routine body parsing
//!
//! A routine's text is parsed once; the outcome is either a syntax tree or the list of
//! error messages the parser produced. A failed routine is never fatal to a run: it
//! still gets an `ioMapping` entry with empty inputs and outputs.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::ast::RoutineAst;

use super::statement_parser::StatementParser;

/// Outcome of parsing one routine body
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Parsed(RoutineAst),
    /// Error messages, each prefixed with `Line N:`
    Failed(Vec<String>),
}

impl ParseResult {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseResult::Parsed(_))
    }
}

/// One routine: its name, body text, and parse outcome
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineSource {
    pub name: String,
    /// `None` when the catalog returned no definition (encrypted or permission-filtered)
    pub body_text: Option<String>,
    /// `None` exactly when `body_text` is `None`
    pub parse_result: Option<ParseResult>,
}

impl RoutineSource {
    /// Parse `body_text` (if present) into a new routine record.
    pub fn new(name: impl Into<String>, body_text: Option<String>) -> Self {
        let parse_result = body_text.as_deref().map(parse_routine);
        Self {
            name: name.into(),
            body_text,
            parse_result,
        }
    }

    /// The syntax tree, if the body parsed.
    pub fn ast(&self) -> Option<&RoutineAst> {
        match &self.parse_result {
            Some(ParseResult::Parsed(ast)) => Some(ast),
            _ => None,
        }
    }

    /// Error messages, empty when the body parsed or is absent.
    pub fn errors(&self) -> &[String] {
        match &self.parse_result {
            Some(ParseResult::Failed(errors)) => errors,
            _ => &[],
        }
    }
}

/// Parse the full text of a routine definition.
///
/// Accepts either a complete `CREATE|ALTER PROCEDURE|FUNCTION|TRIGGER ... AS` definition
/// or a bare body. Line numbers are relative to the start of `text`.
pub fn parse_routine(text: &str) -> ParseResult {
    // Strip UTF-8 BOM if present
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

    let result = StatementParser::new(text).and_then(|mut parser| parser.parse_routine());
    match result {
        Ok(ast) => ParseResult::Parsed(ast),
        Err(err) => ParseResult::Failed(vec![err.to_string()]),
    }
}

/// Minimum number of routines to benefit from parallel parsing.
/// Below this threshold, sequential processing is faster due to rayon overhead.
const PARALLEL_THRESHOLD: usize = 8;

/// Parse every routine, in parallel for larger snapshots. Output order matches input order.
pub fn parse_routines(routines: Vec<(String, Option<String>)>) -> Vec<RoutineSource> {
    let parsed: Vec<RoutineSource> = if routines.len() >= PARALLEL_THRESHOLD {
        routines
            .into_par_iter()
            .map(|(name, body)| RoutineSource::new(name, body))
            .collect()
    } else {
        routines
            .into_iter()
            .map(|(name, body)| RoutineSource::new(name, body))
            .collect()
    };

    for routine in &parsed {
        match &routine.parse_result {
            Some(ParseResult::Failed(errors)) => {
                for error in errors {
                    warn!(routine = %routine.name, "Parse error: {}", error);
                }
            }
            None => debug!(routine = %routine.name, "No definition available"),
            Some(ParseResult::Parsed(_)) => {}
        }
    }

    parsed
}
