//! Base token parser providing navigation helpers over a routine body.
//!
//! The routine body is tokenized once with `MsSqlDialect`, whitespace and comments
//! are dropped, and every remaining token keeps its source span so parsers can
//! report the line each node starts on.
//!
//! ## Usage
//!
//! ```ignore
//! let mut base = TokenParser::new("UPDATE [dbo].[Orders] SET Total = 0")?;
//! if base.check_word("UPDATE") {
//!     base.advance();
//!     let (name, line) = base.parse_object_name().unwrap();
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};

use crate::ast::{Line, ObjectName};
use crate::error::RoutineParseError;

use super::identifier_utils::format_token;

static ERROR_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Line:\s*(\d+)").expect("static regex is valid"));

/// Extract line number from a tokenizer error message (format: "... at Line: X, Column: Y")
fn extract_line_from_error(error_msg: &str) -> Option<Line> {
    let caps = ERROR_LINE_RE.captures(error_msg)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Token parser over the significant (non-whitespace, non-comment) tokens of a body.
pub struct TokenParser {
    tokens: Vec<TokenWithSpan>,
    pos: usize,
}

impl TokenParser {
    /// Tokenize `sql` with MsSqlDialect, keeping token locations.
    pub fn new(sql: &str) -> Result<Self, RoutineParseError> {
        let dialect = MsSqlDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .tokenize_with_location()
            .map_err(|e| {
                let message = e.to_string();
                RoutineParseError {
                    line: extract_line_from_error(&message).unwrap_or(1),
                    message,
                }
            })?;

        Ok(Self::from_tokens(tokens))
    }

    /// Create a parser from pre-tokenized tokens. Whitespace tokens are discarded.
    pub fn from_tokens(tokens: Vec<TokenWithSpan>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Whitespace(_) | Token::EOF))
            .collect();
        Self { tokens, pos: 0 }
    }

    // ========================================================================
    // Position and state
    // ========================================================================

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn tokens(&self) -> &[TokenWithSpan] {
        &self.tokens
    }

    /// Line of the current token, or of the end of the body once exhausted.
    pub fn current_line(&self) -> Line {
        self.current_token()
            .map(|t| t.span.start.line)
            .or_else(|| self.tokens.last().map(|t| t.span.end.line))
            .unwrap_or(1)
    }

    // ========================================================================
    // Token access
    // ========================================================================

    #[inline]
    pub fn current_token(&self) -> Option<&TokenWithSpan> {
        self.tokens.get(self.pos)
    }

    /// Peek at a token at an offset from current position.
    #[inline]
    pub fn peek(&self, offset: usize) -> Option<&TokenWithSpan> {
        self.tokens.get(self.pos + offset)
    }

    #[inline]
    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    // ========================================================================
    // Token type checks
    // ========================================================================

    /// Check if the current token is the unquoted word `word` (case-insensitive).
    ///
    /// Bracketed or quoted identifiers never match, so `[End]` stays a column name.
    #[inline]
    pub fn check_word(&self, word: &str) -> bool {
        self.peek_word(0, word)
    }

    /// Check if the token at `offset` is the unquoted word `word` (case-insensitive).
    pub fn peek_word(&self, offset: usize, word: &str) -> bool {
        match self.peek(offset) {
            Some(t) => matches!(&t.token, Token::Word(w)
                if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word)),
            None => false,
        }
    }

    /// Check if the current token is any of the unquoted words in `words`.
    pub fn check_any_word(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.check_word(w))
    }

    /// The unquoted word at `offset`, if the token there is one.
    pub fn peek_unquoted_word(&self, offset: usize) -> Option<&str> {
        match self.peek(offset).map(|t| &t.token) {
            Some(Token::Word(w)) if w.quote_style.is_none() => Some(w.value.as_str()),
            _ => None,
        }
    }

    /// Check if current token matches a specific token type (by discriminant).
    #[inline]
    pub fn check_token(&self, expected: &Token) -> bool {
        self.peek_token(0, expected)
    }

    /// Check if the token at `offset` matches a token type (by discriminant).
    pub fn peek_token(&self, offset: usize, expected: &Token) -> bool {
        match self.peek(offset) {
            Some(t) => std::mem::discriminant(&t.token) == std::mem::discriminant(expected),
            None => false,
        }
    }

    // ========================================================================
    // Expect methods (check and advance)
    // ========================================================================

    /// Expect an unquoted word, advancing if found.
    pub fn expect_word(&mut self, word: &str) -> Option<()> {
        if self.check_word(word) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    /// Expect a specific token type, advancing if found.
    pub fn expect_token(&mut self, expected: &Token) -> Option<()> {
        if self.check_token(expected) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    /// Advance past every consecutive `;`.
    pub fn skip_semicolons(&mut self) {
        while self.check_token(&Token::SemiColon) {
            self.advance();
        }
    }

    // ========================================================================
    // Identifier parsing
    // ========================================================================

    /// Parse an identifier (bracketed or unbracketed).
    ///
    /// Returns the identifier value without brackets/quotes.
    pub fn parse_identifier(&mut self) -> Option<String> {
        let token = self.current_token()?;
        match &token.token {
            Token::Word(w) => {
                let name = w.value.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// Parse a dotted object name: `name`, `[schema].[name]`, `db.schema.name`, `db..name`,
    /// `@tableVariable` or `#temp`.
    ///
    /// Returns the name and the line of its first token.
    pub fn parse_object_name(&mut self) -> Option<(ObjectName, Line)> {
        let line = self.current_line();
        let start = self.pos;
        let mut parts = Vec::new();

        let prefix = match self.current_token().map(|t| &t.token) {
            Some(Token::AtSign) => Some('@'),
            Some(Token::Sharp) => Some('#'),
            _ => None,
        };
        if let Some(prefix) = prefix {
            self.advance();
            match self.parse_identifier() {
                Some(ident) => parts.push(format!("{prefix}{ident}")),
                None => {
                    self.pos = start;
                    return None;
                }
            }
        } else {
            parts.push(self.parse_identifier()?);
        }

        while self.check_token(&Token::Period) {
            self.advance();
            // db..table leaves the schema part empty
            while self.check_token(&Token::Period) {
                parts.push(String::new());
                self.advance();
            }
            match self.parse_identifier() {
                Some(ident) => parts.push(ident),
                None => break,
            }
        }

        Some((ObjectName::new(parts), line))
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Text of the current token, for diagnostics.
    pub fn current_text(&self) -> String {
        self.current_token()
            .map(|t| format_token(&t.token))
            .unwrap_or_else(|| "end of input".to_string())
    }

    // ========================================================================
    // Utility methods
    // ========================================================================

    /// Skip a parenthesized group, handling nested parentheses.
    ///
    /// Position should be at the opening parenthesis; afterwards it is just past the
    /// matching close. Returns `Err` with the line of the open parenthesis if the group
    /// never closes.
    pub fn skip_parenthesized(&mut self) -> Result<(), RoutineParseError> {
        if !self.check_token(&Token::LParen) {
            return Ok(());
        }

        let open_line = self.current_line();
        let mut depth = 0usize;
        while !self.is_at_end() {
            if self.check_token(&Token::LParen) {
                depth += 1;
            } else if self.check_token(&Token::RParen) {
                depth -= 1;
                if depth == 0 {
                    self.advance();
                    return Ok(());
                }
            }
            self.advance();
        }

        Err(RoutineParseError {
            line: open_line,
            message: "unbalanced parenthesis".to_string(),
        })
    }
}
