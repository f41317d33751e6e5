//! Table reference classification
//!
//! Walks one routine's syntax tree with a stack of directions. The top of the stack is
//! the direction given to every table-reference node reached; each statement kind pushes
//! `Output` around its write target and `Input` around everything it reads, and pops
//! immediately after. A `SELECT` always pushes `Input`, so nested subqueries read as
//! inputs whatever frame they sit in.

use std::collections::HashMap;

use serde::Serialize;

use crate::ast::{
    Expr, FromClause, InsertSource, Line, MergeAction, NamedTable, ObjectName, Query,
    RoutineAst, Select, Statement, TableFactor, TableWithJoins,
};
use crate::parser::identifier_utils::normalize_identifier;

/// Read or write classification of a table reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "Input"),
            Direction::Output => write!(f, "Output"),
        }
    }
}

/// One observed reference to a known table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReference {
    /// Table name as spelled in the schema inventory
    pub table_name: String,
    pub line: Line,
    pub direction: Direction,
}

/// Base table inventory. A reference matches when its base identifier equals an
/// inventory name case-insensitively. Inventory names are bare and may contain dots.
#[derive(Debug, Clone, Default)]
pub struct KnownTables {
    by_lower: HashMap<String, String>,
}

impl KnownTables {
    /// Build from inventory names. The first spelling of a name wins.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_lower = HashMap::new();
        for name in names {
            let name = name.as_ref();
            let key = inventory_key(name);
            if key.is_empty() {
                continue;
            }
            by_lower.entry(key).or_insert_with(|| name.to_string());
        }
        Self { by_lower }
    }

    /// Resolve a referenced name to its inventory spelling.
    pub fn resolve(&self, name: &ObjectName) -> Option<&str> {
        self.by_lower
            .get(&name.base_identifier().to_lowercase())
            .map(String::as_str)
    }

    /// Whether the bare inventory name `name` is known.
    pub fn contains(&self, name: &str) -> bool {
        self.by_lower.contains_key(&inventory_key(name))
    }

    pub fn len(&self) -> usize {
        self.by_lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lower.is_empty()
    }
}

fn inventory_key(name: &str) -> String {
    normalize_identifier(name).to_lowercase()
}

/// Context-stack traversal producing [`TableReference`]s for one routine
pub struct TableReferenceClassifier<'a> {
    known: &'a KnownTables,
    stack: Vec<Direction>,
    references: Vec<TableReference>,
}

impl<'a> TableReferenceClassifier<'a> {
    pub fn new(known: &'a KnownTables) -> Self {
        Self {
            known,
            stack: vec![Direction::Input],
            references: Vec::new(),
        }
    }

    /// Classify every table reference in `ast`, in traversal order.
    pub fn classify(&mut self, ast: &RoutineAst) -> Vec<TableReference> {
        for statement in &ast.statements {
            self.visit_statement(statement);
        }
        std::mem::take(&mut self.references)
    }

    /// Current number of frames on the direction stack (1 when idle)
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    fn current(&self) -> Direction {
        self.stack.last().copied().unwrap_or(Direction::Input)
    }

    fn with_direction(&mut self, direction: Direction, visit: impl FnOnce(&mut Self)) {
        self.stack.push(direction);
        visit(self);
        self.stack.pop();
    }

    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Select(query) => self.visit_query(query),
            Statement::Insert(insert) => {
                self.with_direction(Direction::Output, |c| c.visit_named(&insert.target));
                if let Some(source) = &insert.source {
                    self.with_direction(Direction::Input, |c| match source {
                        InsertSource::Query(query) => c.visit_query(query),
                        InsertSource::Values(rows) => rows.iter().for_each(|row| c.visit_expr(row)),
                        InsertSource::Execute(expr) => c.visit_expr(expr),
                        InsertSource::DefaultValues => {}
                    });
                }
            }
            Statement::Update(update) => {
                self.with_direction(Direction::Output, |c| c.visit_named(&update.target));
                self.with_direction(Direction::Input, |c| {
                    if let Some(selection) = &update.selection {
                        c.visit_expr(selection);
                    }
                    if let Some(from) = &update.from {
                        c.visit_from(from);
                    }
                    for assignment in &update.assignments {
                        c.visit_expr(&assignment.value);
                    }
                });
            }
            Statement::Delete(delete) => {
                self.with_direction(Direction::Output, |c| c.visit_named(&delete.target));
                self.with_direction(Direction::Input, |c| {
                    if let Some(from) = &delete.from {
                        c.visit_from(from);
                    }
                    if let Some(selection) = &delete.selection {
                        c.visit_expr(selection);
                    }
                });
            }
            Statement::Merge(merge) => {
                self.with_direction(Direction::Output, |c| c.visit_named(&merge.target));
                self.with_direction(Direction::Input, |c| {
                    c.visit_table_factor(&merge.source);
                    c.visit_expr(&merge.on);
                    for clause in &merge.clauses {
                        if let Some(predicate) = &clause.predicate {
                            c.visit_expr(predicate);
                        }
                        match &clause.action {
                            MergeAction::Update(assignments) => assignments
                                .iter()
                                .for_each(|assignment| c.visit_expr(&assignment.value)),
                            MergeAction::Insert(Some(values)) => c.visit_expr(values),
                            MergeAction::Insert(None) | MergeAction::Delete => {}
                        }
                    }
                });
            }
            Statement::With { ctes, body, .. } => {
                self.with_direction(Direction::Input, |c| {
                    ctes.iter().for_each(|cte| c.visit_query(&cte.query))
                });
                self.visit_statement(body);
            }
            Statement::Block { statements, .. } => {
                statements.iter().for_each(|s| self.visit_statement(s));
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.visit_expr(condition);
                self.visit_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_statement(else_branch);
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                self.visit_expr(condition);
                self.visit_statement(body);
            }
            Statement::Other { exprs, .. } => exprs.iter().for_each(|e| self.visit_expr(e)),
        }
    }

    fn visit_query(&mut self, query: &Query) {
        self.with_direction(Direction::Input, |c| {
            c.visit_select(&query.body);
            query
                .set_operations
                .iter()
                .for_each(|select| c.visit_select(select));
        });
    }

    fn visit_select(&mut self, select: &Select) {
        select.projection.iter().for_each(|e| self.visit_expr(e));
        if let Some(from) = &select.from {
            self.visit_from(from);
        }
        if let Some(selection) = &select.selection {
            self.visit_expr(selection);
        }
        select.group_by.iter().for_each(|e| self.visit_expr(e));
        if let Some(having) = &select.having {
            self.visit_expr(having);
        }
        select.order_by.iter().for_each(|e| self.visit_expr(e));
    }

    fn visit_from(&mut self, from: &FromClause) {
        from.tables
            .iter()
            .for_each(|table| self.visit_table_with_joins(table));
    }

    fn visit_table_with_joins(&mut self, table: &TableWithJoins) {
        self.visit_table_factor(&table.relation);
        for join in &table.joins {
            self.visit_table_factor(&join.relation);
            if let Some(constraint) = &join.constraint {
                self.visit_expr(constraint);
            }
        }
    }

    fn visit_table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table(table) => self.visit_named(table),
            TableFactor::Derived { subquery, .. } => self.visit_query(subquery),
            TableFactor::Function { args, .. } => self.visit_expr(args),
            TableFactor::NestedJoin(inner) => self.visit_table_with_joins(inner),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        expr.subqueries.iter().for_each(|q| self.visit_query(q));
    }

    fn visit_named(&mut self, table: &NamedTable) {
        if let Some(table_name) = self.known.resolve(&table.name) {
            self.references.push(TableReference {
                table_name: table_name.to_string(),
                line: table.line,
                direction: self.current(),
            });
        }
    }
}
