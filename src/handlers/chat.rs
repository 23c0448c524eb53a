use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tracing::debug;

use crate::identity::User;
use crate::middleware::{ChatPreprocess, ChatTurn, ResolvedUser};
use crate::router::AppState;
use crate::types::chat::{ChatEvent, ChatPollResponse};

/// Events buffered between the agent task and the response writer.
const EVENT_BUFFER: usize = 64;

/// Run the turn on its own task so a slow or vanished client never stalls the agent.
fn spawn_turn(state: &AppState, user: User, turn: ChatTurn) -> mpsc::Receiver<ChatEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let agent = state.agent.clone();
    tokio::spawn(async move {
        agent.send_message(&user, &turn, &tx).await;
    });
    rx
}

pub async fn chat_sse_handler(
    State(state): State<AppState>,
    ResolvedUser(user): ResolvedUser,
    ChatPreprocess(turn): ChatPreprocess,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    debug!(request = %turn.request_id, "chat_sse request");
    let rx = spawn_turn(&state, user, turn);
    let stream = ReceiverStream::new(rx)
        .map(|event| Event::default().event(event.kind()).json_data(&event));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn chat_poll_handler(
    State(state): State<AppState>,
    ResolvedUser(user): ResolvedUser,
    ChatPreprocess(turn): ChatPreprocess,
) -> Json<ChatPollResponse> {
    debug!(request = %turn.request_id, "chat_poll request");
    let conversation_id = turn.conversation_id.clone();
    let request_id = turn.request_id.clone();

    let mut rx = spawn_turn(&state, user, turn);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    Json(ChatPollResponse {
        conversation_id,
        request_id,
        events,
    })
}

/// Who the server believes the caller is.
pub async fn whoami_handler(ResolvedUser(user): ResolvedUser) -> Json<User> {
    Json(user)
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}
