#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use invoice_agent::AgentError;
use invoice_agent::config::Config;
use invoice_agent::db::{QueryResult, SqlRunner, StatementOutcome};
use invoice_agent::llm::{LlmRequest, LlmResponse, LlmService};
use invoice_agent::memory::DemoAgentMemory;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays canned model responses in order, then answers with plain text.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<LlmResponse>>,
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, AgentError> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| LlmResponse::text("Done.")))
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Answers every query with a fixed vendor spend table.
pub struct VendorSpendRunner;

#[async_trait]
impl SqlRunner for VendorSpendRunner {
    async fn run_sql(&self, _sql: &str) -> Result<StatementOutcome, AgentError> {
        Ok(StatementOutcome::Rows(QueryResult::new(
            vec!["name".into(), "totalSpend".into()],
            vec![
                vec![json!("Acme"), json!(1200.5)],
                vec![json!("Globex"), json!(800)],
            ],
        )))
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://app@localhost:5432/invoices".to_string(),
        gemini_api_key: "test-key".to_string(),
        ..Config::default()
    }
}

pub async fn app_with(llm: Arc<ScriptedLlm>) -> Router {
    let state = invoice_agent::app::build_with(
        &test_config(),
        llm,
        Arc::new(VendorSpendRunner),
        Arc::new(DemoAgentMemory::new(100)),
    )
    .await
    .expect("failed to build app state");
    invoice_agent::router::app_router(state)
}
