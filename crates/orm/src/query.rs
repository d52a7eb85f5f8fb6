use sea_query::backend::{
    EscapeBuilder, OperLeftAssocDecider, PrecedenceDecider, QuotedBuilder, TableRefBuilder,
};
use sea_query::prepare::SqlWriter;
use sea_query::{BinOper, Oper, Quote, SimpleExpr, SubQueryStatement, Value};

/// A rendered SQL statement together with its positional parameters.
#[derive(Debug, Clone)]
pub struct Query {
    /// The SQL text, using the placeholder style of the target [`Dialect`].
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<DataType>,
}

/// Parameter values bound to a [`Query`].
///
/// Temporal values travel as text, so temporal fields live in text columns
/// (`TEXT`, `VARCHAR`) on every engine. The `sqlx` `Any` driver decodes no
/// native date or time column type.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DataType {
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Uint32(Option<u32>),
    Uint64(Option<u64>),
    Float(Option<f32>),
    Double(Option<f64>),
    Str(Option<String>),
    Binary(Option<Vec<u8>>),
    Date(Option<String>),
    Time(Option<String>),
    Timestamp(Option<String>),
}

/// SQL flavour a statement is rendered for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// `"ident"` quoting with `$1, $2, ...` placeholders.
    #[default]
    Postgres,
    /// Same rendering as [`Dialect::Postgres`]; `SQLite` accepts numbered placeholders.
    Sqlite,
    /// `` `ident` `` quoting with `?` placeholders.
    MySql,
}

impl Dialect {
    pub(crate) fn query_builder(self) -> QueryBuilder {
        match self {
            Self::Postgres | Self::Sqlite => QueryBuilder {
                quote: Quote::new(b'"'),
                placeholder: "$",
                numbered: true,
            },
            Self::MySql => QueryBuilder {
                quote: Quote::new(b'`'),
                placeholder: "?",
                numbered: false,
            },
        }
    }
}

pub struct QueryBuilder {
    quote: Quote,
    placeholder: &'static str,
    numbered: bool,
}

impl QuotedBuilder for QueryBuilder {
    fn quote(&self) -> Quote {
        self.quote
    }
}

impl EscapeBuilder for QueryBuilder {}

impl TableRefBuilder for QueryBuilder {}

impl OperLeftAssocDecider for QueryBuilder {
    fn well_known_left_associative(&self, op: &BinOper) -> bool {
        // mirrors sea-query 0.32.7 `common_well_known_left_associative`
        matches!(
            op,
            BinOper::And | BinOper::Or | BinOper::Add | BinOper::Sub | BinOper::Mul | BinOper::Mod
        )
    }
}

impl PrecedenceDecider for QueryBuilder {
    fn inner_expr_well_known_greater_precedence(
        &self, inner: &SimpleExpr, _outer_oper: &Oper,
    ) -> bool {
        // value lists and subqueries carry their own parentheses; everything
        // else is wrapped
        matches!(inner, SimpleExpr::Tuple(_) | SimpleExpr::SubQuery(..))
    }
}

impl sea_query::backend::QueryBuilder for QueryBuilder {
    fn prepare_query_statement(&self, query: &SubQueryStatement, sql: &mut dyn SqlWriter) {
        match query {
            SubQueryStatement::SelectStatement(s) => self.prepare_select_statement(s, sql),
            SubQueryStatement::InsertStatement(s) => self.prepare_insert_statement(s, sql),
            SubQueryStatement::UpdateStatement(s) => self.prepare_update_statement(s, sql),
            SubQueryStatement::DeleteStatement(s) => self.prepare_delete_statement(s, sql),
            SubQueryStatement::WithStatement(s) => self.prepare_with_query(s, sql),
        }
    }

    fn prepare_value(&self, value: &Value, sql: &mut dyn SqlWriter) {
        sql.push_param(value.clone(), self);
    }

    fn placeholder(&self) -> (&str, bool) {
        (self.placeholder, self.numbered)
    }
}

/// Render a `sea-query` statement and convert its values into parameters.
pub(crate) fn render(
    statement: &impl StatementBuild, dialect: Dialect, table: &'static str, kind: &'static str,
) -> Query {
    let (sql, values) = statement.render(dialect.query_builder());
    let params: Vec<DataType> = values.into_iter().map(into_param).collect();

    tracing::debug!(
        table,
        ?dialect,
        sql = %sql,
        param_count = params.len(),
        "{kind} generated SQL"
    );

    Query { sql, params }
}

/// Common `build` entry point of the `sea-query` statement types.
pub(crate) trait StatementBuild {
    fn render(&self, builder: QueryBuilder) -> (String, sea_query::Values);
}

macro_rules! statement_build {
    ($($statement:ty),*) => {
        $(
            impl StatementBuild for $statement {
                fn render(&self, builder: QueryBuilder) -> (String, sea_query::Values) {
                    self.build(builder)
                }
            }
        )*
    };
}

statement_build!(
    sea_query::SelectStatement,
    sea_query::InsertStatement,
    sea_query::UpdateStatement,
    sea_query::DeleteStatement
);

fn into_param(value: Value) -> DataType {
    match value {
        Value::Bool(v) => DataType::Boolean(v),
        Value::TinyInt(v) => DataType::Int32(v.map(i32::from)),
        Value::SmallInt(v) => DataType::Int32(v.map(i32::from)),
        Value::Int(v) => DataType::Int32(v),
        Value::BigInt(v) => DataType::Int64(v),
        Value::TinyUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::SmallUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::Unsigned(v) => DataType::Uint32(v),
        Value::BigUnsigned(v) => DataType::Uint64(v),
        Value::Float(v) => DataType::Float(v),
        Value::Double(v) => DataType::Double(v),
        Value::String(v) => DataType::Str(v.map(|s| *s)),
        Value::Char(v) => DataType::Str(v.map(|ch| ch.to_string())),
        Value::Bytes(v) => DataType::Binary(v.map(|bytes| *bytes)),
        Value::Json(v) => DataType::Str(v.map(|json| json.to_string())),
        Value::ChronoDate(v) => DataType::Date(v.map(|date| date.to_string())),
        Value::ChronoTime(v) => DataType::Time(v.map(|time| time.to_string())),
        Value::ChronoDateTime(v) => DataType::Timestamp(v.map(|dt| dt.to_string())),
        Value::ChronoDateTimeUtc(v) => DataType::Timestamp(v.map(|dt| dt.to_rfc3339())),
        Value::ChronoDateTimeLocal(v) => DataType::Timestamp(v.map(|dt| dt.to_rfc3339())),
        Value::ChronoDateTimeWithTimeZone(v) => {
            DataType::Timestamp(v.map(|dt| dt.to_rfc3339()))
        }
    }
}
