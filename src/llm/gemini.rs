use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::{Value, json};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{LlmRequest, LlmResponse, LlmService, Message, ToolCall};
use crate::api::gemini_api::{GeminiApi, default_retry_policy};
use crate::config::Config;
use crate::error::{AgentError, GeminiError};
use crate::types::gemini::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GeminiTool,
    GenerateContentRequest, GenerateContentResponse, Part,
};

/// Gemini backend speaking the public `generateContent` REST API.
pub struct GeminiLlmService {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl GeminiLlmService {
    pub fn new(cfg: &Config) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("invoice-agent/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(120));
        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let client = builder.build()?;

        let endpoint = cfg
            .gemini_base_url
            .join(&format!("models/{}:generateContent", cfg.gemini_model))?;

        let per_minute = NonZeroU32::new(cfg.llm_requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        info!(
            model = %cfg.gemini_model,
            endpoint = %endpoint,
            rpm = per_minute.get(),
            "Gemini LLM service ready"
        );

        Ok(Self {
            client,
            endpoint,
            api_key: cfg.gemini_api_key.clone(),
            model: cfg.gemini_model.clone(),
            limiter,
        })
    }
}

#[async_trait]
impl LlmService for GeminiLlmService {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, AgentError> {
        self.limiter.until_ready().await;

        let body = build_request(&request);
        let resp = GeminiApi::try_post_generate(
            &self.client,
            &self.endpoint,
            &self.api_key,
            default_retry_policy(),
            &body,
        )
        .await?;

        let status = resp.status();
        if !status.is_success() {
            let bytes = resp.bytes().await?;
            return Err(match serde_json::from_slice::<GeminiError>(&bytes) {
                Ok(gemini_err) => AgentError::GeminiServerError(gemini_err),
                Err(_) => AgentError::UpstreamStatus(status),
            });
        }

        let payload: GenerateContentResponse = resp.json().await?;
        debug!(
            model_version = ?payload.modelVersion,
            usage = ?payload.usageMetadata,
            "Gemini response received"
        );
        Ok(parse_response(payload))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Translate the provider-neutral request into Gemini's schema.
pub(crate) fn build_request(request: &LlmRequest) -> GenerateContentRequest {
    let system_instruction = (!request.system_prompt.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part::text(request.system_prompt.clone())],
    });

    let contents = request.messages.iter().map(message_to_content).collect();

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: request
                .tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    };

    GenerateContentRequest {
        system_instruction,
        contents,
        tools,
        generation_config: Some(json!({ "temperature": 0.2 })),
    }
}

fn message_to_content(message: &Message) -> Content {
    match message {
        Message::User { text } => Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(text.clone())],
        },
        Message::Assistant { text, tool_calls } => {
            let mut parts = Vec::with_capacity(tool_calls.len() + 1);
            if let Some(text) = text.as_ref().filter(|t| !t.is_empty()) {
                parts.push(Part::text(text.clone()));
            }
            parts.extend(tool_calls.iter().map(|call| Part {
                function_call: Some(FunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                }),
                thought_signature: call.signature.clone(),
                ..Part::default()
            }));
            Content {
                role: Some("model".to_string()),
                parts,
            }
        }
        Message::Tool { results } => Content {
            role: Some("user".to_string()),
            parts: results
                .iter()
                .map(|r| Part {
                    function_response: Some(FunctionResponse {
                        name: r.name.clone(),
                        response: as_object(r.response.clone()),
                    }),
                    ..Part::default()
                })
                .collect(),
        },
    }
}

/// Gemini requires function responses to be JSON objects.
fn as_object(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "result": value })
    }
}

pub(crate) fn parse_response(payload: GenerateContentResponse) -> LlmResponse {
    let Some(candidate) = payload.candidates.into_iter().next() else {
        let blocked = payload
            .promptFeedback
            .as_ref()
            .and_then(|f| f.get("blockReason"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return LlmResponse {
            finish_reason: blocked,
            ..LlmResponse::default()
        };
    };

    let finish_reason = candidate
        .finishReason
        .as_ref()
        .and_then(|r| serde_json::to_value(r).ok())
        .and_then(|v| v.as_str().map(str::to_string));

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(call) = part.function_call {
            let args = if call.args.is_null() {
                json!({})
            } else {
                call.args
            };
            tool_calls.push(ToolCall {
                name: call.name,
                args,
                signature: part.thought_signature,
            });
        } else if let Some(text) = part.text
            && part.thought != Some(true)
        {
            texts.push(text);
        }
    }

    let text = (!texts.is_empty()).then(|| texts.concat());
    LlmResponse {
        text,
        tool_calls,
        finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ToolResponse, ToolSchema};

    #[test]
    fn request_maps_roles_and_function_parts() {
        let request = LlmRequest {
            system_prompt: "be brief".to_string(),
            messages: vec![
                Message::user("how many invoices?"),
                Message::Assistant {
                    text: None,
                    tool_calls: vec![ToolCall {
                        name: "run_sql".into(),
                        args: json!({"sql": "SELECT count(*) FROM \"Invoice\""}),
                        signature: Some("sig-1".into()),
                    }],
                },
                Message::Tool {
                    results: vec![ToolResponse {
                        name: "run_sql".into(),
                        response: json!(42),
                    }],
                },
            ],
            tools: vec![ToolSchema {
                name: "run_sql".into(),
                description: "Run SQL".into(),
                parameters: json!({"type": "object", "properties": {"sql": {"type": "string"}}}),
            }],
        };

        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(
            body["contents"][1]["parts"][0]["functionCall"]["name"],
            "run_sql"
        );
        assert_eq!(body["contents"][1]["parts"][0]["thoughtSignature"], "sig-1");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"],
            json!({"result": 42})
        );
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "run_sql"
        );
    }

    #[test]
    fn response_separates_text_calls_and_thoughts() {
        let payload: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "planning...", "thought": true},
                    {"text": "Let me check. "},
                    {"functionCall": {"name": "run_sql", "args": {"sql": "SELECT 1"}}, "thoughtSignature": "abc"},
                    {"functionCall": {"name": "visualize_data"}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 10},
            "modelVersion": "gemini-2.5-flash"
        }))
        .unwrap();

        let parsed = parse_response(payload);
        assert_eq!(parsed.text.as_deref(), Some("Let me check. "));
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_eq!(parsed.tool_calls[0].signature.as_deref(), Some("abc"));
        assert_eq!(parsed.tool_calls[1].args, json!({}));
        assert_eq!(parsed.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn blocked_prompt_yields_empty_response_with_reason() {
        let payload: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let parsed = parse_response(payload);
        assert!(parsed.text.is_none());
        assert!(parsed.tool_calls.is_empty());
        assert_eq!(parsed.finish_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn unknown_finish_reason_is_tolerated() {
        let payload: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}, "finishReason": "SOMETHING_NEW"}]
        }))
        .unwrap();
        assert_eq!(parse_response(payload).finish_reason.as_deref(), Some("OTHER"));
    }

    #[tokio::test]
    async fn endpoint_is_built_from_base_url_and_model() {
        let cfg = Config {
            gemini_api_key: "k".into(),
            database_url: "postgres://localhost/db".into(),
            ..Config::default()
        };
        let svc = GeminiLlmService::new(&cfg).unwrap();
        assert_eq!(
            svc.endpoint.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(svc.model(), "gemini-2.5-flash");
    }
}
