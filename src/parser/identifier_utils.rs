//! Identifier handling utilities for T-SQL names.
//!
//! Routine bodies and metadata snapshots spell the same object in several ways
//! (`Orders`, `[Orders]`, `dbo.Orders`, `"dbo"."Orders"`). These helpers reduce them
//! to the bare base identifier that table matching works on.
//!
//! # Examples
//!
//! ```ignore
//! assert_eq!(normalize_identifier("[MyTable]"), "MyTable");
//! assert_eq!(base_identifier("[dbo].[MyTable]"), "MyTable");
//! ```

use sqlparser::tokenizer::Token;

/// Strips brackets `[]` and double quotes `""` from an identifier.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_identifier("[MyTable]"), "MyTable");
/// assert_eq!(normalize_identifier("\"MyColumn\""), "MyColumn");
/// assert_eq!(normalize_identifier("  [Trimmed]  "), "Trimmed");
/// ```
pub fn normalize_identifier(ident: &str) -> String {
    ident
        .trim()
        .trim_matches(|c| c == '[' || c == ']' || c == '"')
        .to_string()
}

/// Splits a dotted name into its parts, ignoring dots inside `[...]` or `"..."`.
pub fn split_name_parts(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;

    for c in name.trim().chars() {
        match closing {
            Some(close) if c == close => {
                closing = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None => match c {
                '[' => {
                    closing = Some(']');
                    current.push(c);
                }
                '"' => {
                    closing = Some('"');
                    current.push(c);
                }
                '.' => parts.push(normalize_identifier(&std::mem::take(&mut current))),
                _ => current.push(c),
            },
        }
    }
    parts.push(normalize_identifier(&current));
    parts
}

/// The last part of a possibly qualified, possibly bracketed name.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(base_identifier("[dbo].[Orders]"), "Orders");
/// assert_eq!(base_identifier("Orders"), "Orders");
/// ```
pub fn base_identifier(name: &str) -> String {
    split_name_parts(name).pop().unwrap_or_default()
}

fn format_word(word: &sqlparser::tokenizer::Word) -> String {
    match word.quote_style {
        Some('[') => format!("[{}]", word.value),
        Some('"') => format!("\"{}\"", word.value),
        _ => word.value.clone(),
    }
}

/// Token text for parser diagnostics. Bracketed identifiers keep their brackets.
pub fn format_token(token: &Token) -> String {
    match token {
        Token::Word(w) => format_word(w),
        Token::EOF => "end of input".to_string(),
        other => other.to_string(),
    }
}
