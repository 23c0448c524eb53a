use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Pool, Postgres, Row, Statement, TypeInfo};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::db::models::{QueryResult, StatementOutcome};
use crate::error::AgentError;

pub type PgPool = Pool<Postgres>;

/// Executes SQL on behalf of the `run_sql` tool.
#[async_trait]
pub trait SqlRunner: Send + Sync {
    async fn run_sql(&self, sql: &str) -> Result<StatementOutcome, AgentError>;
}

#[derive(Clone)]
pub struct PostgresRunner {
    pool: PgPool,
}

impl PostgresRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool without connecting; connections are opened on first use.
    pub fn connect_lazy(database_url: &str) -> Result<Self, AgentError> {
        let connect_opts = PgConnectOptions::from_str(database_url)?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(connect_opts);
        info!(
            max_connections = 5,
            "Postgres pool created (lazy connect)"
        );
        Ok(Self::new(pool))
    }

    async fn fetch_result(&self, statement: &str) -> Result<QueryResult, AgentError> {
        let rows = sqlx::query(statement).fetch_all(&self.pool).await?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => self
                .pool
                .prepare(statement)
                .await?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };

        let data = rows
            .iter()
            .map(row_to_values)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QueryResult::new(columns, data))
    }
}

#[async_trait]
impl SqlRunner for PostgresRunner {
    async fn run_sql(&self, sql: &str) -> Result<StatementOutcome, AgentError> {
        let statement = strip_trailing_semicolons(sql);
        if returns_rows(statement) {
            let result = self.fetch_result(statement).await?;
            debug!(rows = result.row_count, "query returned rows");
            Ok(StatementOutcome::Rows(result))
        } else {
            let done = sqlx::raw_sql(statement).execute(&self.pool).await?;
            debug!(rows_affected = done.rows_affected(), "statement executed");
            Ok(StatementOutcome::Affected(done.rows_affected()))
        }
    }
}

/// Trim whitespace and any trailing `;` so the statement can be prepared.
pub fn strip_trailing_semicolons(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Statements expected to produce a row set rather than an affected-row count.
/// Writes with a `RETURNING` clause count as row-returning.
pub fn returns_rows(sql: &str) -> bool {
    let head = sql
        .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        head.as_str(),
        "SELECT" | "WITH" | "SHOW" | "EXPLAIN" | "VALUES" | "TABLE"
    ) || has_returning_clause(sql)
}

fn has_returning_clause(sql: &str) -> bool {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case("RETURNING"))
}

fn row_to_values(row: &PgRow) -> Result<Vec<Value>, AgentError> {
    (0..row.columns().len())
        .map(|idx| decode_cell(row, idx))
        .collect()
}

fn opt<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}

fn decode_cell(row: &PgRow, idx: usize) -> Result<Value, AgentError> {
    let type_name = row.columns()[idx].type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(idx)?),
        "INT2" => opt(row.try_get::<Option<i16>, _>(idx)?),
        "INT4" => opt(row.try_get::<Option<i32>, _>(idx)?),
        "INT8" => opt(row.try_get::<Option<i64>, _>(idx)?),
        "FLOAT4" => opt(row.try_get::<Option<f32>, _>(idx)?),
        "FLOAT8" => opt(row.try_get::<Option<f64>, _>(idx)?),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)?
            .map(decimal_to_json)
            .unwrap_or(Value::Null),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            opt(row.try_get::<Option<String>, _>(idx)?)
        }
        "TIMESTAMP" => opt(row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => opt(row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|ts| ts.to_rfc3339())),
        "DATE" => opt(row
            .try_get::<Option<NaiveDate>, _>(idx)?
            .map(|d| d.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?.unwrap_or(Value::Null),
        "UUID" => opt(row
            .try_get::<Option<uuid::Uuid>, _>(idx)?
            .map(|u| u.to_string())),
        other => Value::String(format!("<{other}>")),
    };
    Ok(value)
}

fn decimal_to_json(d: Decimal) -> Value {
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}
