use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body accepted by the chat endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default, alias = "metaData")]
    pub metadata: Option<Map<String, Value>>,
}

/// One unit of output streamed back to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Text {
        content: String,
    },
    ToolCall {
        tool: String,
        args: Value,
    },
    ToolResult {
        tool: String,
        success: bool,
        summary: String,
    },
    #[serde(rename = "dataframe")]
    DataFrame {
        result_id: String,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        row_count: usize,
    },
    Chart {
        result_id: String,
        title: String,
        chart_type: String,
        figure: Value,
    },
    Error {
        message: String,
    },
    Done {
        conversation_id: String,
        request_id: String,
    },
}

impl ChatEvent {
    /// SSE `event:` name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Text { .. } => "text",
            ChatEvent::ToolCall { .. } => "tool_call",
            ChatEvent::ToolResult { .. } => "tool_result",
            ChatEvent::DataFrame { .. } => "dataframe",
            ChatEvent::Chart { .. } => "chart",
            ChatEvent::Error { .. } => "error",
            ChatEvent::Done { .. } => "done",
        }
    }
}

/// Response of the polling endpoint: every event of the turn at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPollResponse {
    pub conversation_id: String,
    pub request_id: String,
    pub events: Vec<ChatEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_accepts_camel_case_metadata_alias() {
        let req: ChatRequest = serde_json::from_value(json!({
            "conversation_id": "demo-conversation-id-4592342",
            "message": "top vendors by spend",
            "metaData": {"source": "dashboard"},
            "request_id": "demo-request-id"
        }))
        .unwrap();
        assert_eq!(req.message, "top vendors by spend");
        assert_eq!(req.conversation_id.as_deref(), Some("demo-conversation-id-4592342"));
        assert_eq!(req.metadata.unwrap()["source"], "dashboard");
    }

    #[test]
    fn event_tag_matches_kind() {
        let events = [
            ChatEvent::Text { content: "hi".into() },
            ChatEvent::DataFrame {
                result_id: "query_1".into(),
                columns: vec!["a".into()],
                rows: vec![vec![json!(1)]],
                row_count: 1,
            },
            ChatEvent::Done {
                conversation_id: "c".into(),
                request_id: "r".into(),
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind());
        }
    }
}
