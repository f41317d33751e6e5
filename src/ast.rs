//! Routine syntax tree
//!
//! The minimal structural shape the lineage classifier consumes. Every statement kind
//! is a closed enum variant so the classifier's read/write policy is checked for
//! exhaustiveness by the compiler. Expressions are reduced to the subqueries they
//! contain; nothing else inside an expression can reference a table.

/// Source line, 1-based, relative to the start of the routine body text
pub type Line = u64;

/// A possibly qualified object name, e.g. `[dbo].[Orders]` -> `["dbo", "Orders"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName(pub Vec<String>);

impl ObjectName {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    /// The last name part (the object itself, without server/database/schema)
    pub fn base_identifier(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A table-reference node: a named object used as a row source or write target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTable {
    pub name: ObjectName,
    pub alias: Option<String>,
    /// Line of the first token of the name
    pub line: Line,
}

/// An expression fragment, kept only for the subqueries nested inside it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expr {
    pub line: Line,
    pub subqueries: Vec<Query>,
}

impl Expr {
    pub fn is_empty(&self) -> bool {
        self.subqueries.is_empty()
    }
}

/// A SELECT body with any set operations chained after it
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub body: Select,
    /// Operands of UNION / EXCEPT / INTERSECT, in source order
    pub set_operations: Vec<Select>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub line: Line,
    pub projection: Vec<Expr>,
    /// `SELECT ... INTO <name>`; a name, not a table-reference node
    pub into: Option<ObjectName>,
    pub from: Option<FromClause>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub line: Line,
    pub tables: Vec<TableWithJoins>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableWithJoins {
    pub relation: TableFactor,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub relation: TableFactor,
    pub constraint: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableFactor {
    /// `[schema].[table] [AS alias] [WITH (hints)]`
    Table(NamedTable),
    /// `(SELECT ...) [AS] alias`
    Derived {
        subquery: Box<Query>,
        alias: Option<String>,
    },
    /// `[schema].fn(args)`, `OPENJSON(...)`, etc.
    Function { name: ObjectName, args: Expr },
    /// `(a JOIN b ON ...)`
    NestedJoin(Box<TableWithJoins>),
}

/// One element of an UPDATE `SET` list or a MERGE `UPDATE SET` action
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub line: Line,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Query(Box<Query>),
    /// One expression per row list
    Values(Vec<Expr>),
    /// `INSERT ... EXEC proc ...`
    Execute(Expr),
    DefaultValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub line: Line,
    pub target: NamedTable,
    pub source: Option<InsertSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub line: Line,
    pub target: NamedTable,
    pub assignments: Vec<Assignment>,
    pub from: Option<FromClause>,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub line: Line,
    pub target: NamedTable,
    pub from: Option<FromClause>,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction {
    Update(Vec<Assignment>),
    Insert(Option<Expr>),
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    pub predicate: Option<Expr>,
    pub action: MergeAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub line: Line,
    pub target: NamedTable,
    pub source: TableFactor,
    pub on: Expr,
    pub clauses: Vec<MergeClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Query,
}

/// A routine body statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<Query>),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Merge(Merge),
    /// `WITH cte AS (...) <statement>`
    With {
        line: Line,
        ctes: Vec<Cte>,
        body: Box<Statement>,
    },
    /// `BEGIN ... END`, `BEGIN TRY ... END TRY`, `BEGIN CATCH ... END CATCH`
    Block { line: Line, statements: Vec<Statement> },
    If {
        line: Line,
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        line: Line,
        condition: Expr,
        body: Box<Statement>,
    },
    /// Any other statement (`DECLARE`, `SET`, `EXEC`, `RETURN`, ...)
    Other {
        line: Line,
        keyword: String,
        exprs: Vec<Expr>,
    },
}

impl Statement {
    /// Statement kind name used in diagnostics
    pub fn kind(&self) -> &str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::Merge(_) => "MERGE",
            Statement::With { .. } => "WITH",
            Statement::Block { .. } => "BEGIN",
            Statement::If { .. } => "IF",
            Statement::While { .. } => "WHILE",
            Statement::Other { keyword, .. } => keyword,
        }
    }

    /// Starting source line of the statement
    pub fn line(&self) -> Line {
        match self {
            Statement::Select(q) => q.body.line,
            Statement::Insert(s) => s.line,
            Statement::Update(s) => s.line,
            Statement::Delete(s) => s.line,
            Statement::Merge(s) => s.line,
            Statement::With { line, .. }
            | Statement::Block { line, .. }
            | Statement::If { line, .. }
            | Statement::While { line, .. }
            | Statement::Other { line, .. } => *line,
        }
    }
}

/// The parsed body of one routine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutineAst {
    pub statements: Vec<Statement>,
}
