//! Database access: the analytics schema and the SQL runner behind `run_sql`.
//!
//! Layout:
//! - `models.rs`: query results as JSON rows
//! - `schema.rs`: DDL of the invoice database (reference only)
//! - `postgres.rs`: `SqlRunner` trait and its Postgres implementation

pub mod models;
pub mod postgres;
pub mod schema;

pub use models::{QueryResult, StatementOutcome};
pub use postgres::{PgPool, PostgresRunner, SqlRunner};
pub use schema::INVOICE_DDL;
