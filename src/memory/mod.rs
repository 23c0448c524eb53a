//! Agent memory: questions that were answered correctly by a tool call, plus
//! free-form notes the model chose to keep.

mod demo;
pub mod similarity;

pub use demo::DemoAgentMemory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;
use crate::identity::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsageMemory {
    pub id: String,
    pub question: String,
    pub tool_name: String,
    pub args: Value,
    pub saved_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMemory {
    pub id: String,
    pub content: String,
    pub saved_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryEntry {
    ToolUsage(ToolUsageMemory),
    Text(TextMemory),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarUsage {
    pub memory: ToolUsageMemory,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct UsageQuery {
    pub question: String,
    pub limit: usize,
    pub similarity_threshold: f64,
    pub tool_name_filter: Option<String>,
}

impl UsageQuery {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            limit: 10,
            similarity_threshold: 0.7,
            tool_name_filter: None,
        }
    }
}

#[async_trait]
pub trait AgentMemory: Send + Sync {
    async fn save_tool_usage(
        &self,
        question: &str,
        tool_name: &str,
        args: Value,
        user: &User,
    ) -> Result<ToolUsageMemory, AgentError>;

    /// Saved usages ranked by question similarity, best first.
    async fn search_similar_usage(
        &self,
        query: &UsageQuery,
    ) -> Result<Vec<SimilarUsage>, AgentError>;

    async fn save_text_memory(&self, content: &str, user: &User)
    -> Result<TextMemory, AgentError>;

    /// Most recent text memories, newest first.
    async fn recent_text_memories(&self, limit: usize) -> Result<Vec<TextMemory>, AgentError>;

    async fn len(&self) -> usize;

    async fn clear(&self);
}
