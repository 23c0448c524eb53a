//! Composition root: builds every service from a [`Config`].

use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::{Agent, AgentSettings};
use crate::config::Config;
use crate::db::{PostgresRunner, SqlRunner};
use crate::error::AgentError;
use crate::identity::{ADMIN_GROUP, CookieUserResolver, EMAIL_COOKIE, USER_GROUP};
use crate::llm::{GeminiLlmService, LlmService};
use crate::memory::{AgentMemory, DemoAgentMemory};
use crate::router::AppState;
use crate::service::{ConversationLimits, conversation_actor};
use crate::tools::{
    RunSqlTool, SaveQuestionToolArgsTool, SaveTextMemoryTool, SearchSavedCorrectToolUsesTool,
    ToolRegistry, VisualizeDataTool,
};

/// The tools offered to the model, with the groups allowed to call each.
pub fn default_registry(runner: Arc<dyn SqlRunner>, max_rows_in_prompt: usize) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register_local_tool(
        RunSqlTool::new(runner, max_rows_in_prompt),
        &[ADMIN_GROUP, USER_GROUP],
    );
    registry.register_local_tool(SaveQuestionToolArgsTool, &[ADMIN_GROUP]);
    registry.register_local_tool(SearchSavedCorrectToolUsesTool, &[ADMIN_GROUP, USER_GROUP]);
    registry.register_local_tool(SaveTextMemoryTool, &[ADMIN_GROUP, USER_GROUP]);
    registry.register_local_tool(VisualizeDataTool, &[ADMIN_GROUP, USER_GROUP]);
    registry
}

/// Build the production services: Gemini, a lazily connected Postgres pool and
/// in-process memory.
pub async fn build(cfg: &Config) -> Result<AppState, AgentError> {
    let llm = Arc::new(GeminiLlmService::new(cfg)?);
    let runner = Arc::new(PostgresRunner::connect_lazy(&cfg.database_url)?);
    let memory = Arc::new(DemoAgentMemory::new(cfg.memory_max_items));
    build_with(cfg, llm, runner, memory).await
}

/// Wire the given backends into an [`AppState`].
pub async fn build_with(
    cfg: &Config,
    llm: Arc<dyn LlmService>,
    runner: Arc<dyn SqlRunner>,
    memory: Arc<dyn AgentMemory>,
) -> Result<AppState, AgentError> {
    let registry = default_registry(runner, cfg.sql_max_rows_in_prompt);
    let conversations = conversation_actor::spawn(ConversationLimits::default()).await?;
    let settings = AgentSettings {
        max_tool_iterations: cfg.max_tool_iterations.max(1),
        include_schema: cfg.schema_in_prompt,
    };
    let agent = Agent::new(llm, Arc::new(registry), memory, conversations, settings);

    info!(
        tools = ?agent.registry().tool_names(),
        max_tool_iterations = settings.max_tool_iterations,
        schema_in_prompt = settings.include_schema,
        "agent ready"
    );
    warn!(
        "identities come from the unsigned `{}` cookie; any client can act as any user, including admin",
        EMAIL_COOKIE
    );

    Ok(AppState::new(Arc::new(agent), Arc::new(CookieUserResolver)))
}
