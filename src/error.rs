use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::Error as SqlxError;
use std::collections::HashMap;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AgentError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Gemini API error: {0:?}")]
    GeminiServerError(GeminiError),

    #[error("unknown tool `{0}`")]
    ToolNotFound(String),

    #[error("user `{user}` is not allowed to call `{tool}`")]
    ToolAccessDenied { tool: String, user: String },

    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidToolArgs { tool: String, reason: String },

    #[error("conversation `{0}` belongs to another user")]
    ConversationNotOwned(String),

    #[error("no stored query result `{0}` in this conversation")]
    ResultNotFound(String),

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request body too large")]
    PayloadTooLarge,
}

impl From<figment::Error> for AgentError {
    fn from(e: figment::Error) -> Self {
        AgentError::Config(e.to_string())
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            AgentError::GeminiServerError(gemini_err) => {
                let status = StatusCode::from_u16(gemini_err.error.code as u16)
                    .unwrap_or(StatusCode::BAD_GATEWAY);

                let body = ApiErrorBody {
                    code: gemini_err.error.status,
                    message: gemini_err.error.message,
                };
                (status, body)
            }
            AgentError::DatabaseError(_)
            | AgentError::RactorError(_)
            | AgentError::Config(_)
            | AgentError::Json(_) => {
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                (status, body)
            }
            AgentError::ToolAccessDenied { .. } => {
                let status = StatusCode::FORBIDDEN;
                let body = ApiErrorBody {
                    code: "FORBIDDEN".to_string(),
                    message: "Tool is not available for this user.".to_string(),
                };
                (status, body)
            }
            e @ AgentError::ConversationNotOwned(_) => {
                let status = StatusCode::FORBIDDEN;
                let body = ApiErrorBody {
                    code: "FORBIDDEN".to_string(),
                    message: e.to_string(),
                };
                (status, body)
            }
            AgentError::ToolNotFound(_) | AgentError::ResultNotFound(_) => {
                let status = StatusCode::NOT_FOUND;
                let body = ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: "Requested resource was not found.".to_string(),
                };
                (status, body)
            }
            e @ (AgentError::InvalidToolArgs { .. }
            | AgentError::EmptyMessage
            | AgentError::BadRequest(_)) => {
                let status = StatusCode::BAD_REQUEST;
                let body = ApiErrorBody {
                    code: "BAD_REQUEST".to_string(),
                    message: e.to_string(),
                };
                (status, body)
            }
            AgentError::PayloadTooLarge => {
                let status = StatusCode::PAYLOAD_TOO_LARGE;
                let body = ApiErrorBody {
                    code: "PAYLOAD_TOO_LARGE".to_string(),
                    message: "request body too large".to_string(),
                };
                (status, body)
            }
            AgentError::Reqwest(_) | AgentError::UrlParse(_) => {
                let status = StatusCode::BAD_GATEWAY;
                let body = ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Upstream service is unavailable.".to_string(),
                };
                (status, body)
            }
            AgentError::UpstreamStatus(code) => {
                let (err_code, msg) = match code {
                    StatusCode::TOO_MANY_REQUESTS => {
                        ("RATE_LIMIT", "Upstream rate limit exceeded.")
                    }
                    StatusCode::UNAUTHORIZED => ("UNAUTHORIZED", "Upstream authentication failed."),
                    StatusCode::FORBIDDEN => ("FORBIDDEN", "Upstream permission denied."),
                    StatusCode::NOT_FOUND => ("NOT_FOUND", "Upstream resource not found."),
                    _ => ("UPSTREAM_ERROR", "An upstream error occurred."),
                };

                (
                    code,
                    ApiErrorBody {
                        code: err_code.to_string(),
                        message: msg.to_string(),
                    },
                )
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// Gemini API error response structure
#[derive(Deserialize, Debug)]
pub struct GeminiError {
    pub error: GeminiErrorBody,
}

#[derive(Deserialize, Debug)]
pub struct GeminiErrorBody {
    pub code: u32,
    pub message: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}
