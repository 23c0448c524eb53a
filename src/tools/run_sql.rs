use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use super::{Tool, ToolContext, ToolOutput, parse_args};
use crate::db::{SqlRunner, StatementOutcome};
use crate::error::AgentError;
use crate::types::chat::ChatEvent;

pub const RUN_SQL: &str = "run_sql";

#[derive(Debug, Deserialize)]
struct RunSqlArgs {
    sql: String,
}

/// Runs model-written SQL. Row sets are kept in the conversation under a
/// `query_<n>` id so `visualize_data` can chart them; only a preview goes back
/// to the model.
pub struct RunSqlTool {
    runner: Arc<dyn SqlRunner>,
    max_rows_in_prompt: usize,
}

impl RunSqlTool {
    pub fn new(runner: Arc<dyn SqlRunner>, max_rows_in_prompt: usize) -> Self {
        Self {
            runner,
            max_rows_in_prompt,
        }
    }
}

#[async_trait]
impl Tool for RunSqlTool {
    fn name(&self) -> &str {
        RUN_SQL
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the PostgreSQL invoice database and return the result rows."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "A single PostgreSQL statement. Quote mixed-case identifiers, e.g. \"Invoice\".\"invoiceTotal\"."
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolOutput, AgentError> {
        let RunSqlArgs { sql } = parse_args(RUN_SQL, args)?;
        if sql.trim().is_empty() {
            return Err(AgentError::InvalidToolArgs {
                tool: RUN_SQL.to_string(),
                reason: "sql must not be empty".to_string(),
            });
        }

        info!(user = %ctx.user.id, sql = %sql, "running SQL");
        match self.runner.run_sql(&sql).await? {
            StatementOutcome::Rows(result) => {
                let result_id = ctx
                    .conversations
                    .store_result(&ctx.conversation_id, &ctx.user.id, result.clone())
                    .await?;
                let preview = result.preview(self.max_rows_in_prompt);
                let truncated = result.row_count > preview.len();

                let mut for_llm = json!({
                    "result_id": result_id,
                    "row_count": result.row_count,
                    "columns": result.columns,
                    "rows": preview,
                });
                if truncated {
                    for_llm["note"] = json!(format!(
                        "Only the first {} of {} rows are shown.",
                        self.max_rows_in_prompt, result.row_count
                    ));
                }

                let summary = format!("Query returned {} row(s) as {}", result.row_count, result_id);
                Ok(ToolOutput::new(for_llm, summary).with_component(ChatEvent::DataFrame {
                    result_id,
                    columns: result.columns,
                    rows: result.rows,
                    row_count: result.row_count,
                }))
            }
            StatementOutcome::Affected(n) => Ok(ToolOutput::new(
                json!({ "rows_affected": n }),
                format!("Statement executed, {n} row(s) affected"),
            )),
        }
    }
}
