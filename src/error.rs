//! Error types for the SQL engine.
//!
//! Errors are typed by kind, not by message: every variant carries its
//! structured arguments so hosts can map them onto MySQL error codes or
//! reformat them. Analysis errors surface before any row flows; runtime
//! errors terminate the iterator that produced them; storage errors are
//! passed through verbatim in `Storage`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // Catalog and resolution errors
    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    DuplicateTable(String),

    #[error("column \"{0}\" could not be found in any table in scope")]
    ColumnNotFound(String),

    #[error("table \"{table}\" does not have column \"{column}\"")]
    TableColumnNotFound { table: String, column: String },

    #[error("ambiguous column name \"{0}\"")]
    AmbiguousColumn(String),

    #[error("duplicate alias or table name \"{0}\"")]
    DuplicateAliasOrTable(String),

    #[error("view not found: {0}")]
    ViewNotFound(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    // Type and operand errors
    #[error("operand should contain {expected} column(s), not {actual}")]
    InvalidOperandColumns { expected: usize, actual: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("unable to convert \"{value}\" to {to}")]
    ConvertError { value: String, to: String },

    #[error("value \"{0}\" can't be converted to time.Time")]
    ConvertingToTime(String),

    #[error("invalid JSON path expression {0}")]
    InvalidJsonPath(String),

    #[error("invalid JSON text: {0}")]
    InvalidJsonText(String),

    #[error("SRID {value} does not match column SRID {expected}")]
    SridMismatch { value: u32, expected: u32 },

    #[error("numeric value out of range: {0}")]
    NumericOverflow(String),

    #[error("division by zero")]
    DivisionByZero,

    // Constraint errors
    #[error("duplicate unique key given: {0}")]
    UniqueKeyViolation(String),

    #[error("cannot add or update a child row: a foreign key constraint fails ({0})")]
    ForeignKeyViolation(String),

    #[error("column name \"{0}\" is non-nullable but attempted to set a value of null")]
    InsertIntoNonNullable(String),

    #[error("number of values does not match number of columns provided")]
    InsertIntoMismatchValueCount,

    #[error("unknown column \"{0}\" in insert column list")]
    InsertIntoNonexistentColumn(String),

    #[error("column \"{0}\" is a generated column and cannot be assigned a value")]
    GeneratedColumnValue(String),

    #[error("invalid length for index prefix on column {column}: {length}")]
    InvalidIndexPrefix { column: String, length: u16 },

    // Analyzer errors
    #[error("recursive common table expression {0} exceeded the recursion depth limit")]
    CteRecursionLimit(String),

    #[error("circular reference in common table expression {0}")]
    CteCircularReference(String),

    #[error("function: \"{0}\" not found")]
    FunctionNotFound(String),

    #[error("function {name} expected {expected} arguments, {actual} received")]
    FunctionArity {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("invalid use of group function")]
    InvalidGroupFunction,

    #[error("expression \"{0}\" is not in the GROUP BY clause")]
    ExpressionNotInGroupBy(String),

    #[error("the analyzer exceeded the iteration cap; plan did not stabilize at {0}")]
    AnalyzerFixpoint(String),

    #[error("unbound variable \"?{0}\" in prepared statement")]
    UnboundPreparedStatementVariable(usize),

    #[error("prepared statement not found: {0}")]
    PreparedStatementNotFound(String),

    // Statement errors
    #[error("syntax error: {0}")]
    SyntaxError(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("table {0} is not insertable")]
    TableNotInsertable(String),

    #[error("table {0} is not updatable")]
    TableNotUpdatable(String),

    #[error("REPLACE into table {0} which is not replaceable")]
    TableNotReplaceable(String),

    #[error("variable \"{0}\" is read-only")]
    ReadOnlyVariable(String),

    #[error("unknown system variable \"{0}\"")]
    UnknownSystemVariable(String),

    // Runtime errors
    #[error("query was cancelled")]
    QueryCancelled,

    #[error("invalid regular expression: {0}")]
    InvalidRegexp(String),

    #[error("incorrect arguments: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    // Storage errors surface verbatim
    #[error("{0}")]
    Storage(String),
}

impl Error {
    /// Whether evaluating this error in a WHERE context should be treated as
    /// a non-match instead of aborting the query. MySQL swallows conversion
    /// failures in filter predicates.
    pub fn filter_safe(&self) -> bool {
        matches!(self, Error::ConvertError { .. } | Error::ConvertingToTime(_))
    }
}
