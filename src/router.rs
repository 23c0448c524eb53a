use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use std::sync::Arc;

use crate::agent::Agent;
use crate::handlers::{chat_poll_handler, chat_sse_handler, health_handler, whoami_handler};
use crate::identity::SharedResolver;

/// Largest accepted request body.
pub const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub resolver: SharedResolver,
}

impl AppState {
    pub fn new(agent: Arc<Agent>, resolver: SharedResolver) -> Self {
        Self { agent, resolver }
    }
}

impl FromRef<AppState> for SharedResolver {
    fn from_ref(state: &AppState) -> Self {
        state.resolver.clone()
    }
}

pub fn app_router(state: AppState) -> Router {
    let chat = Router::new()
        .route("/chat_sse", post(chat_sse_handler))
        .route("/chat_poll", post(chat_poll_handler))
        .route("/whoami", get(whoami_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/vanna/v2", chat)
        .with_state(state)
}
