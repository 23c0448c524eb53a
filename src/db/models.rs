use serde::{Deserialize, Serialize};
use serde_json::Value;

static NULL: Value = Value::Null;

/// Rows returned by a query, with values already converted to JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    /// Assigned when the result is stored in a conversation; empty before that.
    #[serde(default)]
    pub id: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        Self {
            id: String::new(),
            columns,
            rows,
            row_count,
        }
    }

    /// Values of column `idx`, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| row.get(idx).unwrap_or(&NULL))
    }

    /// First `limit` rows as column-keyed objects, for showing to the model.
    pub fn preview(&self, limit: usize) -> Vec<Value> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                let obj = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<serde_json::Map<_, _>>();
                Value::Object(obj)
            })
            .collect()
    }
}

/// What running a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    Rows(QueryResult),
    Affected(u64),
}
