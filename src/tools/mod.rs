//! Tools the model can call, and the registry that gates them by access group.

pub mod chart;
pub mod memory_tools;
pub mod registry;
pub mod run_sql;
pub mod visualize;

pub use memory_tools::{SaveQuestionToolArgsTool, SaveTextMemoryTool, SearchSavedCorrectToolUsesTool};
pub use registry::ToolRegistry;
pub use run_sql::RunSqlTool;
pub use visualize::VisualizeDataTool;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::error::AgentError;
use crate::identity::User;
use crate::llm::ToolSchema;
use crate::memory::AgentMemory;
use crate::service::ConversationHandle;
use crate::types::chat::ChatEvent;

/// Everything a tool may touch while serving one request.
#[derive(Clone)]
pub struct ToolContext {
    pub user: User,
    pub conversation_id: String,
    pub request_id: String,
    pub conversations: ConversationHandle,
    pub memory: Arc<dyn AgentMemory>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Returned to the model as the function response.
    pub result_for_llm: Value,
    /// One-line description for the client.
    pub summary: String,
    /// Rich output (tables, charts) forwarded to the client as-is.
    pub components: Vec<ChatEvent>,
}

impl ToolOutput {
    pub fn new(result_for_llm: Value, summary: impl Into<String>) -> Self {
        Self {
            result_for_llm,
            summary: summary.into(),
            components: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: ChatEvent) -> Self {
        self.components.push(component);
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema (OpenAPI subset understood by Gemini) of the arguments.
    fn parameters(&self) -> Value;

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<ToolOutput, AgentError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Deserialize model-supplied arguments, reporting failures against the tool.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, AgentError> {
    serde_json::from_value(args).map_err(|e| AgentError::InvalidToolArgs {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::identity::CookieUserResolver;
    use crate::memory::DemoAgentMemory;
    use crate::service::{ConversationLimits, conversation_actor};

    pub async fn context_for(email: &str) -> ToolContext {
        ToolContext {
            user: CookieUserResolver::user_for_email(email),
            conversation_id: "conv-test".to_string(),
            request_id: "req-test".to_string(),
            conversations: conversation_actor::spawn(ConversationLimits::default())
                .await
                .unwrap(),
            memory: Arc::new(DemoAgentMemory::new(100)),
        }
    }
}
