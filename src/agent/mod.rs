//! The agent loop: model turn, tool calls, repeat until the model answers.

pub mod prompt;

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::identity::User;
use crate::llm::{LlmRequest, LlmService, Message, ToolResponse};
use crate::memory::AgentMemory;
use crate::middleware::ChatTurn;
use crate::service::ConversationHandle;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::chat::ChatEvent;
use prompt::{PromptInputs, build_system_prompt};

/// Number of saved notes placed in the system prompt.
const PROMPT_NOTES: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub max_tool_iterations: usize,
    pub include_schema: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: 10,
            include_schema: false,
        }
    }
}

pub struct Agent {
    llm: Arc<dyn LlmService>,
    registry: Arc<ToolRegistry>,
    memory: Arc<dyn AgentMemory>,
    conversations: ConversationHandle,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmService>,
        registry: Arc<ToolRegistry>,
        memory: Arc<dyn AgentMemory>,
        conversations: ConversationHandle,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm,
            registry,
            memory,
            conversations,
            settings,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn conversations(&self) -> &ConversationHandle {
        &self.conversations
    }

    /// Answer one chat turn, streaming events into `events`. Always ends with
    /// `done`; failures are reported as an `error` event before it.
    pub async fn send_message(&self, user: &User, turn: &ChatTurn, events: &mpsc::Sender<ChatEvent>) {
        info!(
            user = %user.id,
            conversation = %turn.conversation_id,
            request = %turn.request_id,
            model = %self.llm.model(),
            metadata = ?turn.metadata,
            "chat turn started"
        );

        let mut pending = vec![Message::user(turn.message.clone())];
        if let Err(e) = self.run_turn(user, turn, &mut pending, events).await {
            warn!(request = %turn.request_id, error = %e, "chat turn failed");
            emit(events, ChatEvent::Error {
                message: e.to_string(),
            })
            .await;
        }

        if let Err(e) = self
            .conversations
            .append(&turn.conversation_id, &user.id, pending)
            .await
        {
            warn!(conversation = %turn.conversation_id, error = %e, "failed to persist conversation");
        }

        emit(events, ChatEvent::Done {
            conversation_id: turn.conversation_id.clone(),
            request_id: turn.request_id.clone(),
        })
        .await;
    }

    async fn run_turn(
        &self,
        user: &User,
        turn: &ChatTurn,
        pending: &mut Vec<Message>,
        events: &mpsc::Sender<ChatEvent>,
    ) -> Result<(), AgentError> {
        let history = self
            .conversations
            .load(&turn.conversation_id, &user.id)
            .await?;
        let tools = self.registry.schemas_for(user);
        let tool_names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        let notes = self.memory.recent_text_memories(PROMPT_NOTES).await?;
        let system_prompt = build_system_prompt(&PromptInputs {
            user,
            today: Utc::now().date_naive(),
            tool_names: &tool_names,
            notes: &notes,
            include_schema: self.settings.include_schema,
        });

        let ctx = ToolContext {
            user: user.clone(),
            conversation_id: turn.conversation_id.clone(),
            request_id: turn.request_id.clone(),
            conversations: self.conversations.clone(),
            memory: self.memory.clone(),
        };

        for iteration in 0..self.settings.max_tool_iterations {
            let messages = history.iter().chain(pending.iter()).cloned().collect();
            let response = self
                .llm
                .generate(LlmRequest {
                    system_prompt: system_prompt.clone(),
                    messages,
                    tools: tools.clone(),
                })
                .await?;
            debug!(
                iteration,
                calls = response.tool_calls.len(),
                finish_reason = ?response.finish_reason,
                "model turn"
            );

            let text = response.text.filter(|t| !t.trim().is_empty());
            if let Some(content) = text.as_ref() {
                emit(events, ChatEvent::Text {
                    content: content.clone(),
                })
                .await;
            }

            if response.tool_calls.is_empty() {
                if text.is_none() {
                    let reason = response.finish_reason.as_deref().unwrap_or("empty response");
                    emit(events, ChatEvent::Text {
                        content: format!("The model returned no answer ({reason})."),
                    })
                    .await;
                }
                pending.push(Message::Assistant {
                    text,
                    tool_calls: Vec::new(),
                });
                return Ok(());
            }

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                emit(events, ChatEvent::ToolCall {
                    tool: call.name.clone(),
                    args: call.args.clone(),
                })
                .await;

                let payload = match self.registry.execute(&ctx, call).await {
                    Ok(output) => {
                        emit(events, ChatEvent::ToolResult {
                            tool: call.name.clone(),
                            success: true,
                            summary: output.summary,
                        })
                        .await;
                        for component in output.components {
                            emit(events, component).await;
                        }
                        output.result_for_llm
                    }
                    Err(e) => {
                        debug!(tool = %call.name, error = %e, "tool call failed");
                        emit(events, ChatEvent::ToolResult {
                            tool: call.name.clone(),
                            success: false,
                            summary: e.to_string(),
                        })
                        .await;
                        json!({ "error": e.to_string() })
                    }
                };
                results.push(ToolResponse {
                    name: call.name.clone(),
                    response: payload,
                });
            }

            pending.push(Message::Assistant {
                text,
                tool_calls: response.tool_calls,
            });
            pending.push(Message::Tool { results });
        }

        warn!(
            request = %turn.request_id,
            limit = self.settings.max_tool_iterations,
            "tool iteration limit reached"
        );
        emit(events, ChatEvent::Text {
            content: format!(
                "Stopped after {} tool rounds without a final answer.",
                self.settings.max_tool_iterations
            ),
        })
        .await;
        Ok(())
    }
}

/// A closed receiver means the client went away; the turn still completes so
/// history stays consistent.
async fn emit(events: &mpsc::Sender<ChatEvent>, event: ChatEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver dropped");
    }
}
