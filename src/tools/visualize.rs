use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::chart::{build_figure, plan_chart};
use super::{Tool, ToolContext, ToolOutput, parse_args};
use crate::error::AgentError;
use crate::types::chat::ChatEvent;

pub const VISUALIZE_DATA: &str = "visualize_data";

#[derive(Debug, Deserialize)]
struct VisualizeArgs {
    result_id: String,
    #[serde(default)]
    title: Option<String>,
}

/// Charts a result previously produced by `run_sql` in the same conversation.
pub struct VisualizeDataTool;

#[async_trait]
impl Tool for VisualizeDataTool {
    fn name(&self) -> &str {
        VISUALIZE_DATA
    }

    fn description(&self) -> &str {
        "Create a chart from a query result returned by run_sql, referenced by its result_id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "result_id": {
                    "type": "string",
                    "description": "The result_id returned by run_sql, e.g. query_1."
                },
                "title": {
                    "type": "string",
                    "description": "Chart title."
                }
            },
            "required": ["result_id"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolOutput, AgentError> {
        let VisualizeArgs { result_id, title } = parse_args(VISUALIZE_DATA, args)?;
        let result = ctx
            .conversations
            .get_result(&ctx.conversation_id, &ctx.user.id, &result_id)
            .await?
            .ok_or_else(|| AgentError::ResultNotFound(result_id.clone()))?;

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Result {result_id}"));
        let plan = plan_chart(&result);
        let figure = build_figure(&result, &plan, &title);
        let chart_type = plan.chart_type.as_str();
        debug!(result_id = %result_id, chart_type, "chart built");

        Ok(ToolOutput::new(
            json!({ "result_id": result_id, "chart_type": chart_type, "title": title }),
            format!("Rendered {chart_type} chart for {result_id}"),
        )
        .with_component(ChatEvent::Chart {
            result_id,
            title,
            chart_type: chart_type.to_string(),
            figure,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::QueryResult;
    use crate::tools::test_support::context_for;

    #[tokio::test]
    async fn charts_a_stored_result() {
        let ctx = context_for("user@example.com").await;
        let result = QueryResult::new(
            vec!["vendor".into(), "spend".into()],
            vec![vec![json!("Acme"), json!(10)], vec![json!("Globex"), json!(4)]],
        );
        let id = ctx
            .conversations
            .store_result(&ctx.conversation_id, &ctx.user.id, result)
            .await
            .unwrap();

        let out = VisualizeDataTool
            .execute(&ctx, json!({"result_id": id, "title": "Spend"}))
            .await
            .unwrap();
        assert_eq!(out.result_for_llm["chart_type"], "bar");
        match &out.components[..] {
            [ChatEvent::Chart { title, figure, .. }] => {
                assert_eq!(title, "Spend");
                assert_eq!(figure["data"][0]["type"], "bar");
            }
            other => panic!("unexpected components: {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_title_names_the_result() {
        let ctx = context_for("user@example.com").await;
        let id = ctx
            .conversations
            .store_result(
                &ctx.conversation_id,
                &ctx.user.id,
                QueryResult::new(vec!["n".into()], vec![vec![json!(1)]]),
            )
            .await
            .unwrap();
        let out = VisualizeDataTool
            .execute(&ctx, json!({"result_id": id}))
            .await
            .unwrap();
        assert_eq!(out.result_for_llm["title"], "Result query_1");
    }

    #[tokio::test]
    async fn unknown_result_is_reported() {
        let ctx = context_for("user@example.com").await;
        let err = VisualizeDataTool
            .execute(&ctx, json!({"result_id": "query_9"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ResultNotFound(id) if id == "query_9"));
    }

    #[tokio::test]
    async fn results_of_another_user_are_not_charted() {
        let ctx = context_for("mallory@example.com").await;
        ctx.conversations
            .store_result(
                &ctx.conversation_id,
                "admin@example.com",
                QueryResult::new(vec!["n".into()], vec![vec![json!(1)]]),
            )
            .await
            .unwrap();
        let err = VisualizeDataTool
            .execute(&ctx, json!({"result_id": "query_1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ResultNotFound(_)));
    }
}
