//! Token-based statement parsing for routine bodies
//!
//! Builds the [`crate::ast`] tree from the significant tokens of a procedure, function
//! or trigger definition. Only structure that can carry a table reference is kept:
//! DML targets, `FROM`/`JOIN`/`APPLY` sources, `USING` sources, and subqueries nested
//! anywhere inside an expression. Everything else is consumed.
//!
//! ## Supported Syntax
//!
//! ```sql
//! SELECT ... [INTO name] [FROM ...] [WHERE ...] [GROUP BY ...] [HAVING ...] [ORDER BY ...]
//!     [UNION [ALL] | EXCEPT | INTERSECT SELECT ...] [OPTION (...)] [FOR XML ...]
//! INSERT [TOP (n)] [INTO] target [(cols)] [OUTPUT ...] {VALUES (...) | SELECT ... | EXEC ... | DEFAULT VALUES}
//! UPDATE [TOP (n)] target SET a = ..., b = ... [OUTPUT ...] [FROM ...] [WHERE ...]
//! DELETE [TOP (n)] [FROM] target [OUTPUT ...] [FROM ...] [WHERE ...]
//! MERGE [INTO] target [AS t] USING source ON ... WHEN [NOT] MATCHED [BY ...] [AND ...] THEN ...
//! WITH cte [(cols)] AS (SELECT ...) [, ...] <statement>
//! BEGIN ... END | BEGIN TRY ... END TRY | BEGIN CATCH ... END CATCH
//! IF ... <statement> [ELSE <statement>]
//! WHILE ... <statement>
//! ```
//!
//! Statement boundaries follow T-SQL: semicolons are optional, so a statement ends
//! where the next statement keyword starts at parenthesis depth 0.

use sqlparser::tokenizer::{Token, TokenWithSpan};

use crate::ast::{
    Assignment, Cte, Delete, Expr, FromClause, Insert, InsertSource, Join, Line, Merge,
    MergeAction, MergeClause, NamedTable, ObjectName, Query, RoutineAst, Select, Statement,
    TableFactor, TableWithJoins, Update,
};
use crate::error::RoutineParseError;

use super::token_parser_base::TokenParser;

type PResult<T> = Result<T, RoutineParseError>;

/// Keywords that always start a new statement when unquoted
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "DECLARE", "SET", "IF", "ELSE", "WHILE",
    "BEGIN", "END", "RETURN", "EXEC", "EXECUTE", "RAISERROR", "TRUNCATE", "COMMIT", "ROLLBACK",
    "BREAK", "CONTINUE", "CREATE", "DROP", "ALTER",
];

/// Keywords that start a statement only when followed by an operand (`PRINT 'x'`, `OPEN cur`)
const OPERAND_STATEMENT_KEYWORDS: &[&str] = &[
    "PRINT", "THROW", "OPEN", "CLOSE", "FETCH", "DEALLOCATE", "GOTO", "WAITFOR", "SAVE", "USE",
    "GRANT", "REVOKE", "DENY",
];

/// Statement keywords that are also built-in function names (`IF UPDATE(col)`, `LEFT(s, 2)`)
const FUNCTION_KEYWORDS: &[&str] = &["UPDATE", "LEFT", "RIGHT"];

const SELECT_CLAUSE_KEYWORDS: &[&str] = &[
    "FROM", "INTO", "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "EXCEPT", "INTERSECT", "OPTION",
    "FOR",
];

/// Terminators for a join constraint: select clauses plus the next join
const JOIN_CONSTRAINT_TERMINATORS: &[&str] = &[
    "FROM", "INTO", "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "EXCEPT", "INTERSECT", "OPTION",
    "FOR", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER", "ON", "PIVOT", "UNPIVOT",
    "OUTPUT",
];

const UPDATE_SET_TERMINATORS: &[&str] = &["FROM", "WHERE", "OUTPUT", "OPTION"];

const OUTPUT_TERMINATORS: &[&str] = &["INTO", "VALUES", "DEFAULT", "FROM", "WHERE", "OPTION"];

const MERGE_ACTION_TERMINATORS: &[&str] = &["WHEN", "OUTPUT", "OPTION"];

/// Words that can never be a table alias
const NON_ALIAS_WORDS: &[&str] = &[
    "AS", "ON", "WITH", "USING", "WHEN", "THEN", "VALUES", "DEFAULT", "OUTPUT", "APPLY",
    "TABLESAMPLE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER", "PIVOT", "UNPIVOT",
    "FROM", "INTO", "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "EXCEPT", "INTERSECT", "OPTION",
    "FOR",
];

const TABLE_HINTS: &[&str] = &[
    "NOLOCK", "READUNCOMMITTED", "READCOMMITTED", "REPEATABLEREAD", "SERIALIZABLE", "UPDLOCK",
    "TABLOCK", "TABLOCKX", "PAGLOCK", "ROWLOCK", "NOWAIT", "READPAST", "XLOCK", "HOLDLOCK",
    "INDEX", "FORCESEEK", "FORCESCAN", "NOEXPAND", "SNAPSHOT",
];

const JOIN_HINTS: &[&str] = &["HASH", "LOOP", "MERGE", "REMOTE"];

/// Deepest combined nesting of statements, subqueries and parenthesized joins
const MAX_NESTING_DEPTH: usize = 64;

#[inline]
fn contains_word(list: &[&str], word: &str) -> bool {
    list.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_reserved(word: &str) -> bool {
    contains_word(STATEMENT_KEYWORDS, word) || contains_word(NON_ALIAS_WORDS, word)
}

/// Recursive-descent parser from routine tokens to [`RoutineAst`]
pub struct StatementParser {
    base: TokenParser,
    depth: usize,
}

impl StatementParser {
    pub fn new(sql: &str) -> PResult<Self> {
        Ok(Self {
            base: TokenParser::new(sql)?,
            depth: 0,
        })
    }

    pub fn from_tokens(tokens: Vec<TokenWithSpan>) -> Self {
        Self {
            base: TokenParser::from_tokens(tokens),
            depth: 0,
        }
    }

    /// Parse a full routine definition: optional `CREATE ... AS` header, then the body.
    pub fn parse_routine(&mut self) -> PResult<RoutineAst> {
        self.skip_routine_header()?;
        self.parse_statements_to_end()
    }

    /// Parse statements until the tokens are exhausted.
    pub fn parse_statements_to_end(&mut self) -> PResult<RoutineAst> {
        let mut statements = Vec::new();
        loop {
            self.base.skip_semicolons();
            if self.base.is_at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(RoutineAst { statements })
    }

    fn error(&self, message: impl Into<String>) -> RoutineParseError {
        RoutineParseError::new(self.base.current_line(), message)
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING_DEPTH`].
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!("nesting exceeds {MAX_NESTING_DEPTH} levels")));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ========================================================================
    // Routine header
    // ========================================================================

    /// Skip `CREATE [OR ALTER] PROCEDURE|FUNCTION|TRIGGER name ... AS`.
    ///
    /// The body starts after the first `AS` at parenthesis depth 0 that is neither
    /// part of `EXECUTE AS` nor a parameter type introducer (`@p AS INT`).
    pub fn skip_routine_header(&mut self) -> PResult<()> {
        if !self.base.check_word("CREATE") && !self.base.check_word("ALTER") {
            return Ok(());
        }

        let line = self.base.current_line();
        let mut depth = 0usize;
        let mut prev: Option<Token> = None;
        let mut prev2: Option<Token> = None;

        while let Some(token) = self.base.current_token().map(|t| t.token.clone()) {
            match &token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::Word(w)
                    if depth == 0 && w.quote_style.is_none() && w.value.eq_ignore_ascii_case("AS") =>
                {
                    let after_execute = matches!(&prev, Some(Token::Word(p))
                        if p.value.eq_ignore_ascii_case("EXECUTE") || p.value.eq_ignore_ascii_case("EXEC"));
                    let after_parameter = match (&prev2, &prev) {
                        (_, Some(Token::Word(p))) if p.value.starts_with('@') => true,
                        (Some(Token::AtSign), Some(Token::Word(_))) => true,
                        _ => false,
                    };
                    if !after_execute && !after_parameter {
                        self.base.advance();
                        return Ok(());
                    }
                }
                _ => {}
            }
            prev2 = prev.take();
            prev = Some(token);
            self.base.advance();
        }

        Err(RoutineParseError::new(
            line,
            "routine header has no AS before the body",
        ))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> PResult<Statement> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> PResult<Statement> {
        let line = self.base.current_line();
        if self.base.is_at_end() {
            return Err(self.error("expected a statement, found end of input"));
        }
        if self.base.check_token(&Token::RParen) {
            return Err(self.error("unexpected ')'"));
        }
        if self.starts_subquery(0) {
            let query = self.parse_query_in_parens()?;
            return Ok(Statement::Select(Box::new(query)));
        }

        let word = self.base.peek_unquoted_word(0).map(str::to_ascii_uppercase);
        match word.as_deref() {
            Some("SELECT") => Ok(Statement::Select(Box::new(self.parse_query()?))),
            Some("INSERT") => self.parse_insert().map(Statement::Insert),
            Some("UPDATE") if !self.base.peek_word(1, "STATISTICS") => {
                self.parse_update().map(Statement::Update)
            }
            Some("DELETE") => self.parse_delete().map(Statement::Delete),
            Some("MERGE") => self.parse_merge().map(Statement::Merge),
            Some("WITH") if self.is_cte_start() => self.parse_with(),
            Some("BEGIN") if !self.begins_transaction() => self.parse_block(),
            Some("IF") => self.parse_if(),
            Some("WHILE") => self.parse_while(),
            Some("ELSE") => Err(self.error("ELSE without a matching IF")),
            Some("END") => Err(self.error("END without a matching BEGIN")),
            _ => self.parse_other(line),
        }
    }

    /// Any statement without a dedicated rule; only its nested subqueries are kept.
    fn parse_other(&mut self, line: Line) -> PResult<Statement> {
        let keyword = if self.base.check_token(&Token::LParen) {
            "(".to_string()
        } else {
            let text = self.base.current_text().to_ascii_uppercase();
            self.base.advance();
            text
        };
        let expr = self.parse_expr(&[], false)?;
        Ok(Statement::Other {
            line,
            keyword,
            exprs: vec![expr],
        })
    }

    fn parse_block(&mut self) -> PResult<Statement> {
        let line = self.base.current_line();
        self.base.advance();

        let closer = if self.base.check_word("TRY") {
            Some("TRY")
        } else if self.base.check_word("CATCH") {
            Some("CATCH")
        } else {
            None
        };
        if closer.is_some() {
            self.base.advance();
        } else if self.base.check_word("ATOMIC") {
            self.base.advance();
            if self.base.check_word("WITH") && self.base.peek_token(1, &Token::LParen) {
                self.base.advance();
                self.base.skip_parenthesized()?;
            }
        }

        let mut statements = Vec::new();
        loop {
            self.base.skip_semicolons();
            if self.base.is_at_end() {
                return Err(RoutineParseError::new(line, "BEGIN without a matching END"));
            }
            if self.base.check_word("END") {
                self.base.advance();
                if let Some(closer) = closer {
                    self.base.expect_word(closer);
                }
                break;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Statement::Block { line, statements })
    }

    fn parse_if(&mut self) -> PResult<Statement> {
        let line = self.base.current_line();
        self.base.advance();
        let condition = self.parse_expr(&[], false)?;
        let then_branch = Box::new(self.parse_branch("IF")?);

        self.base.skip_semicolons();
        let else_branch = if self.base.check_word("ELSE") {
            self.base.advance();
            Some(Box::new(self.parse_branch("ELSE")?))
        } else {
            None
        };

        Ok(Statement::If {
            line,
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self) -> PResult<Statement> {
        let line = self.base.current_line();
        self.base.advance();
        let condition = self.parse_expr(&[], false)?;
        let body = Box::new(self.parse_branch("WHILE")?);
        Ok(Statement::While {
            line,
            condition,
            body,
        })
    }

    fn parse_branch(&mut self, context: &str) -> PResult<Statement> {
        self.base.skip_semicolons();
        if self.base.is_at_end() {
            return Err(self.error(format!("{context} without a statement")));
        }
        self.parse_statement()
    }

    fn parse_with(&mut self) -> PResult<Statement> {
        let line = self.base.current_line();
        self.base.advance();

        let mut ctes = Vec::new();
        loop {
            let name = self
                .base
                .parse_identifier()
                .ok_or_else(|| self.error("expected a CTE name after WITH"))?;
            if self.base.check_token(&Token::LParen) {
                self.base.skip_parenthesized()?;
            }
            if self.base.expect_word("AS").is_none() {
                return Err(self.error(format!("expected AS after CTE {name}")));
            }
            if !self.starts_subquery(0) {
                return Err(self.error(format!("expected (SELECT ...) for CTE {name}")));
            }
            let query = self.parse_query_in_parens()?;
            ctes.push(Cte { name, query });

            if self.base.expect_token(&Token::Comma).is_none() {
                break;
            }
        }

        let body = self.parse_branch("WITH")?;
        match body {
            Statement::Select(_)
            | Statement::Insert(_)
            | Statement::Update(_)
            | Statement::Delete(_)
            | Statement::Merge(_) => Ok(Statement::With {
                line,
                ctes,
                body: Box::new(body),
            }),
            other => Err(RoutineParseError::new(
                other.line(),
                format!("{} cannot follow a WITH clause", other.kind()),
            )),
        }
    }

    // ========================================================================
    // DML
    // ========================================================================

    fn parse_insert(&mut self) -> PResult<Insert> {
        let line = self.base.current_line();
        self.base.advance();
        self.skip_top()?;
        self.base.expect_word("INTO");

        let target = self.parse_target("INSERT")?;
        self.skip_table_hints()?;
        if self.base.check_token(&Token::LParen) && !self.starts_subquery(0) {
            self.base.skip_parenthesized()?;
        }
        self.skip_output_clause()?;
        let source = self.parse_insert_source()?;

        Ok(Insert {
            line,
            target,
            source,
        })
    }

    fn parse_insert_source(&mut self) -> PResult<Option<InsertSource>> {
        if self.base.check_word("VALUES") {
            self.base.advance();
            let mut rows = Vec::new();
            loop {
                rows.push(self.parse_expr(&[], true)?);
                if self.base.expect_token(&Token::Comma).is_none() {
                    break;
                }
            }
            return Ok(Some(InsertSource::Values(rows)));
        }
        if self.base.check_word("SELECT") {
            return Ok(Some(InsertSource::Query(Box::new(self.parse_query()?))));
        }
        if self.starts_subquery(0) {
            return Ok(Some(InsertSource::Query(Box::new(
                self.parse_query_in_parens()?,
            ))));
        }
        if self.base.check_any_word(&["EXEC", "EXECUTE"]) {
            self.base.advance();
            return Ok(Some(InsertSource::Execute(self.parse_expr(&[], false)?)));
        }
        if self.base.check_word("DEFAULT") && self.base.peek_word(1, "VALUES") {
            self.base.advance();
            self.base.advance();
            return Ok(Some(InsertSource::DefaultValues));
        }
        Ok(None)
    }

    fn parse_update(&mut self) -> PResult<Update> {
        let line = self.base.current_line();
        self.base.advance();
        self.skip_top()?;

        let target = self.parse_target("UPDATE")?;
        self.skip_table_hints()?;
        if self.base.expect_word("SET").is_none() {
            return Err(self.error(format!(
                "expected SET after UPDATE {}, found {}",
                target.name,
                self.base.current_text()
            )));
        }
        let assignments = self.parse_assignments(UPDATE_SET_TERMINATORS)?;
        self.skip_output_clause()?;

        let from = if self.base.check_word("FROM") {
            Some(self.parse_from_clause()?)
        } else {
            None
        };
        let selection = self.parse_where()?;
        self.skip_option_clause()?;

        Ok(Update {
            line,
            target,
            assignments,
            from,
            selection,
        })
    }

    fn parse_delete(&mut self) -> PResult<Delete> {
        let line = self.base.current_line();
        self.base.advance();
        self.skip_top()?;
        self.base.expect_word("FROM");

        let target = self.parse_target("DELETE")?;
        self.skip_table_hints()?;
        self.skip_output_clause()?;

        let from = if self.base.check_word("FROM") {
            Some(self.parse_from_clause()?)
        } else {
            None
        };
        let selection = self.parse_where()?;
        self.skip_option_clause()?;

        Ok(Delete {
            line,
            target,
            from,
            selection,
        })
    }

    fn parse_merge(&mut self) -> PResult<Merge> {
        let line = self.base.current_line();
        self.base.advance();
        self.skip_top()?;
        self.base.expect_word("INTO");

        let mut target = self.parse_target("MERGE")?;
        self.skip_table_hints()?;
        target.alias = self.parse_optional_alias()?;

        if self.base.expect_word("USING").is_none() {
            return Err(self.error(format!(
                "expected USING after MERGE {}, found {}",
                target.name,
                self.base.current_text()
            )));
        }
        let source = self.parse_table_factor()?;
        if self.base.expect_word("ON").is_none() {
            return Err(self.error("expected ON after MERGE source"));
        }
        let on = self.parse_expr(&["WHEN"], false)?;

        let mut clauses = Vec::new();
        while self.base.check_word("WHEN") {
            clauses.push(self.parse_merge_clause()?);
        }
        self.skip_output_clause()?;
        self.skip_option_clause()?;

        Ok(Merge {
            line,
            target,
            source,
            on,
            clauses,
        })
    }

    fn parse_merge_clause(&mut self) -> PResult<MergeClause> {
        self.base.advance();
        self.base.expect_word("NOT");
        if self.base.expect_word("MATCHED").is_none() {
            return Err(self.error("expected MATCHED after WHEN"));
        }
        if self.base.expect_word("BY").is_some() {
            self.base.advance();
        }

        let predicate = if self.base.expect_word("AND").is_some() {
            Some(self.parse_expr(&["THEN"], false)?)
        } else {
            None
        };
        if self.base.expect_word("THEN").is_none() {
            return Err(self.error("expected THEN in MERGE clause"));
        }

        let action = if self.base.expect_word("UPDATE").is_some() {
            if self.base.expect_word("SET").is_none() {
                return Err(self.error("expected SET after THEN UPDATE"));
            }
            MergeAction::Update(self.parse_assignments(MERGE_ACTION_TERMINATORS)?)
        } else if self.base.expect_word("DELETE").is_some() {
            MergeAction::Delete
        } else if self.base.expect_word("INSERT").is_some() {
            if self.base.check_token(&Token::LParen) {
                self.base.skip_parenthesized()?;
            }
            if self.base.expect_word("VALUES").is_some() {
                MergeAction::Insert(Some(self.parse_expr(MERGE_ACTION_TERMINATORS, false)?))
            } else if self.base.expect_word("DEFAULT").is_some() {
                self.base.expect_word("VALUES");
                MergeAction::Insert(None)
            } else {
                return Err(self.error("expected VALUES after THEN INSERT"));
            }
        } else {
            return Err(self.error(format!(
                "expected UPDATE, INSERT or DELETE after THEN, found {}",
                self.base.current_text()
            )));
        };

        Ok(MergeClause { predicate, action })
    }

    /// A DML write target: a plain object name (table, view, `@variable`, `#temp`)
    fn parse_target(&mut self, context: &str) -> PResult<NamedTable> {
        if self.is_statement_boundary() {
            return Err(self.error(format!(
                "expected a table name after {context}, found {}",
                self.base.current_text()
            )));
        }
        let (name, line) = self.base.parse_object_name().ok_or_else(|| {
            self.error(format!(
                "expected a table name after {context}, found {}",
                self.base.current_text()
            ))
        })?;
        Ok(NamedTable {
            name,
            alias: None,
            line,
        })
    }

    fn parse_assignments(&mut self, terminators: &[&str]) -> PResult<Vec<Assignment>> {
        let mut assignments = Vec::new();
        loop {
            let line = self.base.current_line();
            let value = self.parse_expr(terminators, true)?;
            assignments.push(Assignment { line, value });
            if self.base.expect_token(&Token::Comma).is_none() {
                break;
            }
        }
        Ok(assignments)
    }

    fn parse_where(&mut self) -> PResult<Option<Expr>> {
        if self.base.expect_word("WHERE").is_some() {
            Ok(Some(self.parse_expr(SELECT_CLAUSE_KEYWORDS, false)?))
        } else {
            Ok(None)
        }
    }

    fn skip_top(&mut self) -> PResult<()> {
        if self.base.expect_word("TOP").is_none() {
            return Ok(());
        }
        if self.base.check_token(&Token::LParen) {
            self.base.skip_parenthesized()?;
        } else {
            self.base.advance();
        }
        self.base.expect_word("PERCENT");
        if self.base.check_word("WITH") && self.base.peek_word(1, "TIES") {
            self.base.advance();
            self.base.advance();
        }
        Ok(())
    }

    fn skip_table_hints(&mut self) -> PResult<()> {
        if self.base.check_word("WITH") && self.base.peek_token(1, &Token::LParen) {
            self.base.advance();
            self.base.skip_parenthesized()?;
        }
        Ok(())
    }

    fn skip_option_clause(&mut self) -> PResult<()> {
        if self.base.check_word("OPTION") && self.base.peek_token(1, &Token::LParen) {
            self.base.advance();
            self.base.skip_parenthesized()?;
        }
        Ok(())
    }

    /// `OUTPUT <columns> [INTO target [(cols)]]`, consumed without classification
    fn skip_output_clause(&mut self) -> PResult<()> {
        if self.base.expect_word("OUTPUT").is_none() {
            return Ok(());
        }
        self.parse_expr(OUTPUT_TERMINATORS, false)?;
        if self.base.expect_word("INTO").is_some() {
            self.parse_target("OUTPUT INTO")?;
            if self.base.check_token(&Token::LParen) && !self.starts_subquery(0) {
                self.base.skip_parenthesized()?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn parse_query(&mut self) -> PResult<Query> {
        let body = self.parse_select()?;
        let mut set_operations = Vec::new();

        while self.base.check_any_word(&["UNION", "EXCEPT", "INTERSECT"]) {
            self.base.advance();
            self.base.expect_word("ALL");
            if self.starts_subquery(0) {
                let nested = self.parse_query_in_parens()?;
                set_operations.push(nested.body);
                set_operations.extend(nested.set_operations);
            } else if self.base.check_word("SELECT") {
                set_operations.push(self.parse_select()?);
            } else {
                return Err(self.error(format!(
                    "expected SELECT after set operator, found {}",
                    self.base.current_text()
                )));
            }
        }

        Ok(Query {
            body,
            set_operations,
        })
    }

    fn parse_query_in_parens(&mut self) -> PResult<Query> {
        let open_line = self.base.current_line();
        self.base.advance();
        let query = self.nested(Self::parse_query)?;
        if self.base.expect_token(&Token::RParen).is_none() {
            return Err(self.error(format!(
                "expected ')' to close subquery opened at line {open_line}, found {}",
                self.base.current_text()
            )));
        }
        Ok(query)
    }

    fn parse_select(&mut self) -> PResult<Select> {
        let line = self.base.current_line();
        self.base.advance();

        let mut select = Select {
            line,
            projection: self.parse_expr_list(SELECT_CLAUSE_KEYWORDS)?,
            into: None,
            from: None,
            selection: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
        };

        loop {
            if self.base.check_word("INTO") && select.into.is_none() {
                self.base.advance();
                let (name, _) = self
                    .base
                    .parse_object_name()
                    .ok_or_else(|| self.error("expected a name after SELECT ... INTO"))?;
                select.into = Some(name);
            } else if self.base.check_word("FROM") && select.from.is_none() {
                select.from = Some(self.parse_from_clause()?);
            } else if self.base.check_word("WHERE") && select.selection.is_none() {
                select.selection = self.parse_where()?;
            } else if self.base.check_word("GROUP") {
                self.base.advance();
                self.base.expect_word("BY");
                select.group_by = self.parse_expr_list(SELECT_CLAUSE_KEYWORDS)?;
            } else if self.base.check_word("HAVING") {
                self.base.advance();
                select.having = Some(self.parse_expr(SELECT_CLAUSE_KEYWORDS, false)?);
            } else if self.base.check_word("ORDER") {
                self.base.advance();
                self.base.expect_word("BY");
                select.order_by = self.parse_expr_list(SELECT_CLAUSE_KEYWORDS)?;
            } else if self.base.check_word("OPTION") && self.base.peek_token(1, &Token::LParen) {
                self.skip_option_clause()?;
            } else if self.base.check_word("FOR") {
                // FOR XML / FOR JSON / FOR BROWSE / FOR UPDATE [OF ...] / FOR READ ONLY
                self.base.advance();
                if self.base.check_any_word(&["UPDATE", "READ"]) {
                    self.base.advance();
                }
                self.parse_expr(SELECT_CLAUSE_KEYWORDS, false)?;
            } else {
                break;
            }
        }

        Ok(select)
    }

    fn parse_from_clause(&mut self) -> PResult<FromClause> {
        let line = self.base.current_line();
        self.base.advance();

        let mut tables = vec![self.parse_table_with_joins()?];
        while self.base.expect_token(&Token::Comma).is_some() {
            tables.push(self.parse_table_with_joins()?);
        }
        Ok(FromClause { line, tables })
    }

    fn parse_table_with_joins(&mut self) -> PResult<TableWithJoins> {
        let relation = self.parse_table_factor()?;
        let mut joins = Vec::new();

        loop {
            if self.base.check_any_word(&["PIVOT", "UNPIVOT"]) {
                self.base.advance();
                self.base.skip_parenthesized()?;
                self.parse_optional_alias()?;
                continue;
            }
            if !self.parse_join_operator()? {
                break;
            }
            let relation = self.parse_table_factor()?;
            let constraint = if self.base.expect_word("ON").is_some() {
                Some(self.parse_expr(JOIN_CONSTRAINT_TERMINATORS, true)?)
            } else {
                None
            };
            joins.push(Join {
                relation,
                constraint,
            });
        }

        Ok(TableWithJoins { relation, joins })
    }

    /// Consume a join operator if one starts here. Returns whether one was consumed.
    fn parse_join_operator(&mut self) -> PResult<bool> {
        if self.base.expect_word("JOIN").is_some() {
            return Ok(true);
        }
        if self.base.check_any_word(&["INNER", "LEFT", "RIGHT", "FULL"])
            && !self.base.peek_token(1, &Token::LParen)
        {
            self.base.advance();
            self.base.expect_word("OUTER");
            while self.base.check_any_word(JOIN_HINTS) {
                self.base.advance();
            }
            if self.base.expect_word("JOIN").is_none() {
                return Err(self.error(format!("expected JOIN, found {}", self.base.current_text())));
            }
            return Ok(true);
        }
        if self.base.expect_word("CROSS").is_some() {
            if self.base.expect_word("JOIN").is_some() || self.base.expect_word("APPLY").is_some() {
                return Ok(true);
            }
            return Err(self.error("expected JOIN or APPLY after CROSS"));
        }
        if self.base.check_word("OUTER") && self.base.peek_word(1, "APPLY") {
            self.base.advance();
            self.base.advance();
            return Ok(true);
        }
        Ok(false)
    }

    fn parse_table_factor(&mut self) -> PResult<TableFactor> {
        if self.base.check_token(&Token::LParen) {
            if self.starts_subquery(0) {
                let subquery = Box::new(self.parse_query_in_parens()?);
                let alias = self.parse_optional_alias()?;
                self.skip_column_aliases()?;
                return Ok(TableFactor::Derived { subquery, alias });
            }
            if self.base.peek_word(1, "VALUES") {
                let args = self.parse_parenthesized_expr()?;
                self.parse_optional_alias()?;
                self.skip_column_aliases()?;
                return Ok(TableFactor::Function {
                    name: ObjectName::new(vec!["VALUES".to_string()]),
                    args,
                });
            }

            let open_line = self.base.current_line();
            self.base.advance();
            let inner = self.nested(Self::parse_table_with_joins)?;
            if self.base.expect_token(&Token::RParen).is_none() {
                return Err(RoutineParseError::new(
                    open_line,
                    "unbalanced parenthesis in FROM clause",
                ));
            }
            self.parse_optional_alias()?;
            return Ok(TableFactor::NestedJoin(Box::new(inner)));
        }

        if self.is_statement_boundary() {
            return Err(self.error(format!(
                "expected a table name, found {}",
                self.base.current_text()
            )));
        }
        let (name, line) = self.base.parse_object_name().ok_or_else(|| {
            self.error(format!(
                "expected a table name, found {}",
                self.base.current_text()
            ))
        })?;

        if self.base.check_token(&Token::LParen) {
            if self.is_legacy_table_hint() {
                self.base.skip_parenthesized()?;
            } else {
                let args = self.parse_parenthesized_expr()?;
                // OPENJSON(...) WITH (schema)
                self.skip_table_hints()?;
                self.parse_optional_alias()?;
                self.skip_column_aliases()?;
                return Ok(TableFactor::Function { name, args });
            }
        }

        let alias = self.parse_optional_alias()?;
        self.skip_table_hints()?;
        Ok(TableFactor::Table(NamedTable { name, alias, line }))
    }

    fn parse_optional_alias(&mut self) -> PResult<Option<String>> {
        if self.base.expect_word("AS").is_some() {
            return self
                .base
                .parse_identifier()
                .map(Some)
                .ok_or_else(|| self.error("expected an alias after AS"));
        }
        if self.is_alias_candidate() {
            return Ok(self.base.parse_identifier());
        }
        Ok(None)
    }

    fn is_alias_candidate(&self) -> bool {
        match self.base.current_token().map(|t| &t.token) {
            Some(Token::Word(w)) if w.quote_style.is_some() => true,
            Some(Token::Word(w)) => {
                !w.value.starts_with('@')
                    && !w.value.starts_with('#')
                    && !is_reserved(&w.value)
                    && !self.is_statement_boundary()
            }
            _ => false,
        }
    }

    fn skip_column_aliases(&mut self) -> PResult<()> {
        if self.base.check_token(&Token::LParen) {
            self.base.skip_parenthesized()?;
        }
        Ok(())
    }

    /// `FROM T (NOLOCK)`
    fn is_legacy_table_hint(&self) -> bool {
        self.base.check_token(&Token::LParen)
            && self
                .base
                .peek_unquoted_word(1)
                .is_some_and(|w| contains_word(TABLE_HINTS, w))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expr_list(&mut self, terminators: &[&str]) -> PResult<Vec<Expr>> {
        let mut exprs = Vec::new();
        loop {
            exprs.push(self.parse_expr(terminators, true)?);
            if self.base.expect_token(&Token::Comma).is_none() {
                break;
            }
        }
        Ok(exprs)
    }

    /// `( ... )` as one expression; position must be at the opening parenthesis.
    fn parse_parenthesized_expr(&mut self) -> PResult<Expr> {
        let open_line = self.base.current_line();
        self.base.advance();
        let expr = self.parse_expr(&[], false)?;
        if self.base.expect_token(&Token::RParen).is_none() {
            return Err(RoutineParseError::new(open_line, "unbalanced parenthesis"));
        }
        Ok(expr)
    }

    /// Scan one expression, collecting the subqueries nested inside it.
    ///
    /// At parenthesis depth 0 (and outside any `CASE`) the scan stops before `;`, a
    /// closing parenthesis that belongs to the caller, a comma when `stop_at_comma`,
    /// any word in `terminators`, `ELSE`, or the start of a new statement.
    fn parse_expr(&mut self, terminators: &[&str], stop_at_comma: bool) -> PResult<Expr> {
        let line = self.base.current_line();
        let mut subqueries = Vec::new();
        let mut open_lines: Vec<Line> = Vec::new();
        let mut case_depth = 0usize;

        while let Some(token) = self.base.current_token().map(|t| t.token.clone()) {
            let at_top = open_lines.is_empty();
            match &token {
                Token::LParen => {
                    if self.starts_subquery(0) {
                        subqueries.push(self.parse_query_in_parens()?);
                        continue;
                    }
                    open_lines.push(self.base.current_line());
                }
                Token::RParen => {
                    if at_top {
                        break;
                    }
                    open_lines.pop();
                }
                Token::SemiColon if at_top => break,
                Token::Comma if at_top && stop_at_comma => break,
                Token::Word(w) if w.quote_style.is_none() => {
                    if w.value.eq_ignore_ascii_case("CASE") {
                        case_depth += 1;
                    } else if w.value.eq_ignore_ascii_case("END") && case_depth > 0 {
                        case_depth -= 1;
                    } else if at_top && case_depth == 0 && self.ends_expression(terminators) {
                        break;
                    }
                }
                _ => {}
            }
            self.base.advance();
        }

        if let Some(open_line) = open_lines.first() {
            return Err(RoutineParseError::new(*open_line, "unbalanced parenthesis"));
        }

        Ok(Expr { line, subqueries })
    }

    fn ends_expression(&self, terminators: &[&str]) -> bool {
        let Some(word) = self.base.peek_unquoted_word(0) else {
            return false;
        };
        if contains_word(terminators, word)
            && !(contains_word(FUNCTION_KEYWORDS, word) && self.base.peek_token(1, &Token::LParen))
        {
            return true;
        }
        word.eq_ignore_ascii_case("ELSE") || self.is_statement_boundary()
    }

    /// Whether the current token starts a new statement.
    fn is_statement_boundary(&self) -> bool {
        let Some(word) = self.base.peek_unquoted_word(0) else {
            return false;
        };
        if contains_word(STATEMENT_KEYWORDS, word) {
            return !(contains_word(FUNCTION_KEYWORDS, word)
                && self.base.peek_token(1, &Token::LParen));
        }
        if word.eq_ignore_ascii_case("WITH") {
            return self.is_cte_start();
        }
        if contains_word(OPERAND_STATEMENT_KEYWORDS, word) {
            return match self.base.peek(1).map(|t| &t.token) {
                Some(Token::Word(w)) => w.quote_style.is_some() || !is_reserved(&w.value),
                Some(Token::SingleQuotedString(_))
                | Some(Token::NationalStringLiteral(_))
                | Some(Token::Number(_, _)) => true,
                _ => false,
            };
        }
        false
    }

    /// `WITH name AS (` or `WITH name (cols) AS (`
    fn is_cte_start(&self) -> bool {
        self.base.check_word("WITH")
            && matches!(self.base.peek(1).map(|t| &t.token), Some(Token::Word(_)))
            && (self.base.peek_word(2, "AS") || self.base.peek_token(2, &Token::LParen))
    }

    fn begins_transaction(&self) -> bool {
        ["TRAN", "TRANSACTION", "DISTRIBUTED", "DIALOG", "CONVERSATION"]
            .iter()
            .any(|w| self.base.peek_word(1, w))
    }

    /// `(SELECT` at `offset`
    fn starts_subquery(&self, offset: usize) -> bool {
        self.base.peek_token(offset, &Token::LParen) && self.base.peek_word(offset + 1, "SELECT")
    }
}
