use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::AgentError;
use crate::types::chat::ChatRequest;

/// A validated chat turn with conversation and request ids filled in.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub message: String,
    pub conversation_id: String,
    pub request_id: String,
    /// Client-supplied context; carried into the turn's log records only.
    pub metadata: Option<Map<String, Value>>,
}

pub struct ChatPreprocess(pub ChatTurn);

impl<S> FromRequest<S> for ChatPreprocess
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = match Json::<ChatRequest>::from_request(req, state).await {
            Ok(v) => v,
            Err(rejection) => return Err(json_rejection_to_error(rejection).into_response()),
        };

        if body.message.trim().is_empty() {
            return Err(AgentError::EmptyMessage.into_response());
        }

        let conversation_id = non_empty(body.conversation_id)
            .unwrap_or_else(|| format!("conv_{}", Uuid::new_v4().simple()));
        let request_id = non_empty(body.request_id)
            .unwrap_or_else(|| format!("req_{}", Uuid::new_v4().simple()));

        Ok(ChatPreprocess(ChatTurn {
            message: body.message,
            conversation_id,
            request_id,
            metadata: body.metadata,
        }))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn json_rejection_to_error(rejection: JsonRejection) -> AgentError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AgentError::PayloadTooLarge
    } else {
        AgentError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    async fn preprocess(body: Value) -> Result<ChatTurn, Response> {
        let req = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        ChatPreprocess::from_request(req, &()).await.map(|ChatPreprocess(turn)| turn)
    }

    #[tokio::test]
    async fn ids_and_metadata_are_carried_into_the_turn() {
        let turn = preprocess(json!({
            "message": "top vendors",
            "conversation_id": "conv-9",
            "request_id": "req-9",
            "metaData": {"source": "dashboard"}
        }))
        .await
        .unwrap();
        assert_eq!(turn.conversation_id, "conv-9");
        assert_eq!(turn.request_id, "req-9");
        assert_eq!(turn.metadata.unwrap()["source"], "dashboard");
    }

    #[tokio::test]
    async fn blank_ids_are_replaced_and_blank_messages_rejected() {
        let turn = preprocess(json!({"message": "hi", "conversation_id": " "}))
            .await
            .unwrap();
        assert!(turn.conversation_id.starts_with("conv_"));
        assert!(turn.request_id.starts_with("req_"));
        assert!(turn.metadata.is_none());

        let resp = preprocess(json!({"message": ""})).await.unwrap_err();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
