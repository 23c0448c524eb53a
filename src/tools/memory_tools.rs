//! Tools over `AgentMemory`: save and search correct tool usages, keep notes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{Tool, ToolContext, ToolOutput, parse_args};
use crate::error::AgentError;
use crate::memory::UsageQuery;

pub const SAVE_QUESTION_TOOL_ARGS: &str = "save_question_tool_args";
pub const SEARCH_SAVED_CORRECT_TOOL_USES: &str = "search_saved_correct_tool_uses";
pub const SAVE_TEXT_MEMORY: &str = "save_text_memory";

fn invalid(tool: &str, reason: impl Into<String>) -> AgentError {
    AgentError::InvalidToolArgs {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Deserialize)]
struct SaveUsageArgs {
    question: String,
    tool_name: String,
    #[serde(default)]
    args: Value,
}

/// Records a question together with the tool call that answered it correctly.
pub struct SaveQuestionToolArgsTool;

#[async_trait]
impl Tool for SaveQuestionToolArgsTool {
    fn name(&self) -> &str {
        SAVE_QUESTION_TOOL_ARGS
    }

    fn description(&self) -> &str {
        "Save a question and the tool arguments that answered it correctly, so similar questions can reuse them."
    }

    // Gemini rejects OBJECT properties without declared fields, so `args` is
    // declared as a JSON-encoded string; a JSON object is accepted too.
    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "The user's original question."},
                "tool_name": {"type": "string", "description": "Tool that produced the correct answer."},
                "args": {"type": "string", "description": "JSON-encoded arguments passed to the tool."}
            },
            "required": ["question", "tool_name", "args"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolOutput, AgentError> {
        let SaveUsageArgs {
            question,
            tool_name,
            args,
        } = parse_args(SAVE_QUESTION_TOOL_ARGS, args)?;
        if question.trim().is_empty() || tool_name.trim().is_empty() {
            return Err(invalid(
                SAVE_QUESTION_TOOL_ARGS,
                "question and tool_name must not be empty",
            ));
        }
        let args = match args {
            Value::String(encoded) => serde_json::from_str(&encoded)
                .map_err(|e| invalid(SAVE_QUESTION_TOOL_ARGS, format!("args is not JSON: {e}")))?,
            Value::Null => json!({}),
            other => other,
        };

        let saved = ctx
            .memory
            .save_tool_usage(&question, &tool_name, args, &ctx.user)
            .await?;
        info!(memory_id = %saved.id, tool = %tool_name, user = %ctx.user.id, "tool usage saved");
        Ok(ToolOutput::new(
            json!({ "saved": true, "memory_id": saved.id }),
            format!("Saved usage of {tool_name}"),
        ))
    }
}

fn default_limit() -> usize {
    10
}

fn default_threshold() -> f64 {
    0.7
}

#[derive(Debug, Deserialize)]
struct SearchUsageArgs {
    question: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_threshold")]
    similarity_threshold: f64,
    #[serde(default)]
    tool_name_filter: Option<String>,
}

/// Looks up saved tool usages for questions similar to the current one.
pub struct SearchSavedCorrectToolUsesTool;

#[async_trait]
impl Tool for SearchSavedCorrectToolUsesTool {
    fn name(&self) -> &str {
        SEARCH_SAVED_CORRECT_TOOL_USES
    }

    fn description(&self) -> &str {
        "Search previously saved correct tool usages for questions similar to the given one."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string", "description": "Question to match against saved ones."},
                "limit": {"type": "integer", "description": "Maximum number of results (default 10)."},
                "similarity_threshold": {"type": "number", "description": "Minimum similarity between 0 and 1 (default 0.7)."},
                "tool_name_filter": {"type": "string", "description": "Only return usages of this tool."}
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolOutput, AgentError> {
        let args: SearchUsageArgs = parse_args(SEARCH_SAVED_CORRECT_TOOL_USES, args)?;
        if !(0.0..=1.0).contains(&args.similarity_threshold) {
            return Err(invalid(
                SEARCH_SAVED_CORRECT_TOOL_USES,
                "similarity_threshold must be between 0 and 1",
            ));
        }
        let query = UsageQuery {
            question: args.question,
            limit: args.limit,
            similarity_threshold: args.similarity_threshold,
            tool_name_filter: args.tool_name_filter.filter(|n| !n.is_empty()),
        };

        let hits = ctx.memory.search_similar_usage(&query).await?;
        let matches: Vec<Value> = hits
            .iter()
            .map(|hit| {
                json!({
                    "question": hit.memory.question,
                    "tool_name": hit.memory.tool_name,
                    "args": hit.memory.args,
                    "similarity": hit.similarity,
                })
            })
            .collect();
        let summary = format!("Found {} similar saved usage(s)", matches.len());
        Ok(ToolOutput::new(json!({ "matches": matches }), summary))
    }
}

#[derive(Debug, Deserialize)]
struct SaveTextArgs {
    content: String,
}

/// Keeps a free-form note that later prompts include.
pub struct SaveTextMemoryTool;

#[async_trait]
impl Tool for SaveTextMemoryTool {
    fn name(&self) -> &str {
        SAVE_TEXT_MEMORY
    }

    fn description(&self) -> &str {
        "Save a short note about the database or the user's preferences for future conversations."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "The note to remember."}
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolOutput, AgentError> {
        let SaveTextArgs { content } = parse_args(SAVE_TEXT_MEMORY, args)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(invalid(SAVE_TEXT_MEMORY, "content must not be empty"));
        }
        let saved = ctx.memory.save_text_memory(content, &ctx.user).await?;
        Ok(ToolOutput::new(
            json!({ "saved": true, "memory_id": saved.id }),
            "Saved note",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context_for;

    #[tokio::test]
    async fn saved_usage_is_found_by_similar_question() {
        let ctx = context_for("admin@example.com").await;
        SaveQuestionToolArgsTool
            .execute(
                &ctx,
                json!({
                    "question": "top 5 vendors by spend",
                    "tool_name": "run_sql",
                    "args": "{\"sql\": \"SELECT name FROM \\\"Vendor\\\" LIMIT 5\"}"
                }),
            )
            .await
            .unwrap();

        let out = SearchSavedCorrectToolUsesTool
            .execute(&ctx, json!({"question": "Top 5 vendors by spend"}))
            .await
            .unwrap();
        let matches = out.result_for_llm["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["tool_name"], "run_sql");
        assert_eq!(matches[0]["args"]["sql"], "SELECT name FROM \"Vendor\" LIMIT 5");
        assert_eq!(matches[0]["similarity"], 1.0);
    }

    #[tokio::test]
    async fn object_args_are_accepted_and_bad_json_rejected() {
        let ctx = context_for("admin@example.com").await;
        SaveQuestionToolArgsTool
            .execute(
                &ctx,
                json!({"question": "q", "tool_name": "run_sql", "args": {"sql": "SELECT 1"}}),
            )
            .await
            .unwrap();
        assert_eq!(ctx.memory.len().await, 1);

        let err = SaveQuestionToolArgsTool
            .execute(
                &ctx,
                json!({"question": "q", "tool_name": "run_sql", "args": "{not json"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolArgs { .. }));
    }

    #[tokio::test]
    async fn search_validates_threshold_and_applies_filter() {
        let ctx = context_for("user@example.com").await;
        let err = SearchSavedCorrectToolUsesTool
            .execute(&ctx, json!({"question": "q", "similarity_threshold": 1.5}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidToolArgs { .. }));

        ctx.memory
            .save_tool_usage("chart spend", "visualize_data", json!({}), &ctx.user)
            .await
            .unwrap();
        let out = SearchSavedCorrectToolUsesTool
            .execute(
                &ctx,
                json!({"question": "chart spend", "tool_name_filter": "run_sql"}),
            )
            .await
            .unwrap();
        assert_eq!(out.result_for_llm["matches"], json!([]));
    }

    #[tokio::test]
    async fn text_memory_is_saved_trimmed() {
        let ctx = context_for("user@example.com").await;
        SaveTextMemoryTool
            .execute(&ctx, json!({"content": "  amounts are in EUR "}))
            .await
            .unwrap();
        let recent = ctx.memory.recent_text_memories(1).await.unwrap();
        assert_eq!(recent[0].content, "amounts are in EUR");

        assert!(
            SaveTextMemoryTool
                .execute(&ctx, json!({"content": " "}))
                .await
                .is_err()
        );
    }
}
