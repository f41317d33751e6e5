//! T-SQL routine parsing

pub mod identifier_utils;
mod routine_parser;
mod statement_parser;
mod token_parser_base;

pub use routine_parser::{parse_routine, parse_routines, ParseResult, RoutineSource};
pub use statement_parser::StatementParser;
pub use token_parser_base::TokenParser;
