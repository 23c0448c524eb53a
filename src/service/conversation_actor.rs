use crate::db::models::QueryResult;
use crate::error::AgentError;
use crate::llm::Message;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Bounds on what the actor keeps in memory.
#[derive(Debug, Clone, Copy)]
pub struct ConversationLimits {
    pub max_conversations: usize,
    pub max_messages: usize,
    pub max_results: usize,
}

impl Default for ConversationLimits {
    fn default() -> Self {
        Self {
            max_conversations: 1000,
            max_messages: 100,
            max_results: 20,
        }
    }
}

/// Public messages handled by the conversation actor. Every conversation
/// belongs to the user who created it; requests naming another owner are
/// refused.
#[derive(Debug)]
pub enum ConversationMessage {
    /// Full message history (empty if unknown); `None` when owned by someone else.
    Load(String, String, RpcReplyPort<Option<Vec<Message>>>),
    /// Append messages, creating the conversation if needed; `false` when refused.
    Append(String, String, Vec<Message>, RpcReplyPort<bool>),
    /// Keep a query result for later tools; replies with its assigned id.
    StoreResult(String, String, QueryResult, RpcReplyPort<Option<String>>),
    /// Look up a stored query result by id.
    GetResult(String, String, String, RpcReplyPort<Option<QueryResult>>),
    /// Number of conversations currently held.
    Count(RpcReplyPort<usize>),
}

/// Handle for interacting with the conversation actor.
#[derive(Clone)]
pub struct ConversationHandle {
    actor: ActorRef<ConversationMessage>,
}

impl ConversationHandle {
    pub async fn load(
        &self,
        conversation_id: impl AsRef<str>,
        owner: impl AsRef<str>,
    ) -> Result<Vec<Message>, AgentError> {
        let id = conversation_id.as_ref().to_string();
        ractor::call!(
            self.actor,
            ConversationMessage::Load,
            id.clone(),
            owner.as_ref().to_string()
        )
        .map_err(|e| AgentError::RactorError(format!("Load RPC failed: {e}")))?
        .ok_or(AgentError::ConversationNotOwned(id))
    }

    pub async fn append(
        &self,
        conversation_id: impl AsRef<str>,
        owner: impl AsRef<str>,
        messages: Vec<Message>,
    ) -> Result<(), AgentError> {
        let id = conversation_id.as_ref().to_string();
        let accepted = ractor::call!(
            self.actor,
            ConversationMessage::Append,
            id.clone(),
            owner.as_ref().to_string(),
            messages
        )
        .map_err(|e| AgentError::RactorError(format!("Append RPC failed: {e}")))?;
        if accepted {
            Ok(())
        } else {
            Err(AgentError::ConversationNotOwned(id))
        }
    }

    pub async fn store_result(
        &self,
        conversation_id: impl AsRef<str>,
        owner: impl AsRef<str>,
        result: QueryResult,
    ) -> Result<String, AgentError> {
        let id = conversation_id.as_ref().to_string();
        ractor::call!(
            self.actor,
            ConversationMessage::StoreResult,
            id.clone(),
            owner.as_ref().to_string(),
            result
        )
        .map_err(|e| AgentError::RactorError(format!("StoreResult RPC failed: {e}")))?
        .ok_or(AgentError::ConversationNotOwned(id))
    }

    pub async fn get_result(
        &self,
        conversation_id: impl AsRef<str>,
        owner: impl AsRef<str>,
        result_id: impl AsRef<str>,
    ) -> Result<Option<QueryResult>, AgentError> {
        ractor::call!(
            self.actor,
            ConversationMessage::GetResult,
            conversation_id.as_ref().to_string(),
            owner.as_ref().to_string(),
            result_id.as_ref().to_string()
        )
        .map_err(|e| AgentError::RactorError(format!("GetResult RPC failed: {e}")))
    }

    pub async fn count(&self) -> Result<usize, AgentError> {
        ractor::call!(self.actor, ConversationMessage::Count)
            .map_err(|e| AgentError::RactorError(format!("Count RPC failed: {e}")))
    }
}

struct Conversation {
    owner: String,
    messages: VecDeque<Message>,
    results: VecDeque<QueryResult>,
    next_result: u64,
}

impl Conversation {
    fn new(owner: String) -> Self {
        Self {
            owner,
            messages: VecDeque::new(),
            results: VecDeque::new(),
            next_result: 0,
        }
    }

    fn append(&mut self, messages: Vec<Message>, max_messages: usize) {
        self.messages.extend(messages);
        if self.messages.len() <= max_messages {
            return;
        }
        while self.messages.len() > max_messages {
            self.messages.pop_front();
        }
        // History must open on a user turn, never on a dangling tool exchange.
        while self.messages.front().is_some_and(|m| !m.is_user()) {
            self.messages.pop_front();
        }
    }

    fn store_result(&mut self, mut result: QueryResult, max_results: usize) -> String {
        self.next_result += 1;
        let id = format!("query_{}", self.next_result);
        result.id = id.clone();
        self.results.push_back(result);
        while self.results.len() > max_results {
            self.results.pop_front();
        }
        id
    }
}

/// Internal state held by the ractor-driven conversation actor
struct ConversationActorState {
    limits: ConversationLimits,
    conversations: HashMap<String, Conversation>,
    /// Creation order, used for eviction.
    order: VecDeque<String>,
}

impl ConversationActorState {
    /// Conversation `id` as seen by `owner`: `None` if another user owns it.
    fn owned(&self, id: &str, owner: &str) -> Option<Option<&Conversation>> {
        match self.conversations.get(id) {
            Some(c) if c.owner != owner => None,
            found => Some(found),
        }
    }

    /// Existing conversation of `owner`, or a new one; `None` if another user owns `id`.
    fn entry(&mut self, id: String, owner: &str) -> Option<&mut Conversation> {
        if let Some(existing) = self.conversations.get(&id) {
            if existing.owner != owner {
                warn!(conversation = %id, user = %owner, "conversation owned by another user");
                return None;
            }
        } else {
            while self.order.len() >= self.limits.max_conversations {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.conversations.remove(&oldest);
                debug!(conversation = %oldest, "evicted oldest conversation");
            }
            self.order.push_back(id.clone());
        }
        Some(
            self.conversations
                .entry(id)
                .or_insert_with(|| Conversation::new(owner.to_string())),
        )
    }
}

/// ractor-based conversation actor
struct ConversationActor;

#[ractor::async_trait]
impl Actor for ConversationActor {
    type Msg = ConversationMessage;
    type State = ConversationActorState;
    type Arguments = ConversationLimits;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        limits: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            max_conversations = limits.max_conversations,
            max_messages = limits.max_messages,
            "ConversationActor started"
        );
        Ok(ConversationActorState {
            limits: ConversationLimits {
                max_conversations: limits.max_conversations.max(1),
                max_messages: limits.max_messages.max(1),
                max_results: limits.max_results.max(1),
            },
            conversations: HashMap::new(),
            order: VecDeque::new(),
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ConversationMessage::Load(id, owner, rp) => {
                let history = state.owned(&id, &owner).map(|c| {
                    c.map(|c| c.messages.iter().cloned().collect())
                        .unwrap_or_default()
                });
                let _ = rp.send(history);
            }
            ConversationMessage::Append(id, owner, messages, rp) => {
                let max_messages = state.limits.max_messages;
                let added = messages.len();
                let accepted = match state.entry(id.clone(), &owner) {
                    Some(conversation) => {
                        conversation.append(messages, max_messages);
                        debug!(conversation = %id, added, "conversation appended");
                        true
                    }
                    None => false,
                };
                let _ = rp.send(accepted);
            }
            ConversationMessage::StoreResult(id, owner, result, rp) => {
                let max_results = state.limits.max_results;
                let result_id = state
                    .entry(id, &owner)
                    .map(|c| c.store_result(result, max_results));
                let _ = rp.send(result_id);
            }
            ConversationMessage::GetResult(id, owner, result_id, rp) => {
                let found = state
                    .owned(&id, &owner)
                    .flatten()
                    .and_then(|c| c.results.iter().find(|r| r.id == result_id).cloned());
                let _ = rp.send(found);
            }
            ConversationMessage::Count(rp) => {
                let _ = rp.send(state.conversations.len());
            }
        }
        Ok(())
    }
}

/// Async spawn of the conversation actor and return a handle.
pub async fn spawn(limits: ConversationLimits) -> Result<ConversationHandle, AgentError> {
    let (actor, _jh) = Actor::spawn(None, ConversationActor, limits)
        .await
        .map_err(|e| AgentError::RactorError(format!("failed to spawn ConversationActor: {e}")))?;
    Ok(ConversationHandle { actor })
}
