use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::similarity::question_similarity;
use super::{
    AgentMemory, MemoryEntry, SimilarUsage, TextMemory, ToolUsageMemory, UsageQuery,
};
use crate::error::AgentError;
use crate::identity::User;

/// In-process memory holding at most `max_items` entries; the oldest entry is
/// evicted first. Contents are lost on restart.
#[derive(Clone)]
pub struct DemoAgentMemory {
    entries: Arc<RwLock<VecDeque<MemoryEntry>>>,
    max_items: usize,
}

impl DemoAgentMemory {
    pub fn new(max_items: usize) -> Self {
        let max_items = max_items.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_items.min(1024)))),
            max_items,
        }
    }

    async fn push(&self, entry: MemoryEntry) {
        let mut entries = self.entries.write().await;
        entries.push_back(entry);
        while entries.len() > self.max_items {
            entries.pop_front();
        }
        debug!(len = entries.len(), "agent memory updated");
    }
}

#[async_trait]
impl AgentMemory for DemoAgentMemory {
    async fn save_tool_usage(
        &self,
        question: &str,
        tool_name: &str,
        args: Value,
        user: &User,
    ) -> Result<ToolUsageMemory, AgentError> {
        let memory = ToolUsageMemory {
            id: Uuid::new_v4().to_string(),
            question: question.to_string(),
            tool_name: tool_name.to_string(),
            args,
            saved_by: user.id.clone(),
            created_at: Utc::now(),
        };
        self.push(MemoryEntry::ToolUsage(memory.clone())).await;
        Ok(memory)
    }

    async fn search_similar_usage(
        &self,
        query: &UsageQuery,
    ) -> Result<Vec<SimilarUsage>, AgentError> {
        let entries = self.entries.read().await;
        let mut matches: Vec<SimilarUsage> = entries
            .iter()
            .filter_map(|entry| match entry {
                MemoryEntry::ToolUsage(m) => Some(m),
                MemoryEntry::Text(_) => None,
            })
            .filter(|m| {
                query
                    .tool_name_filter
                    .as_deref()
                    .is_none_or(|name| m.tool_name == name)
            })
            .map(|m| SimilarUsage {
                similarity: question_similarity(&query.question, &m.question),
                memory: m.clone(),
            })
            .filter(|s| s.similarity >= query.similarity_threshold)
            .collect();

        // Stable sort: equal scores keep insertion order.
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn save_text_memory(
        &self,
        content: &str,
        user: &User,
    ) -> Result<TextMemory, AgentError> {
        let memory = TextMemory {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            saved_by: user.id.clone(),
            created_at: Utc::now(),
        };
        self.push(MemoryEntry::Text(memory.clone())).await;
        Ok(memory)
    }

    async fn recent_text_memories(&self, limit: usize) -> Result<Vec<TextMemory>, AgentError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .filter_map(|entry| match entry {
                MemoryEntry::Text(t) => Some(t.clone()),
                MemoryEntry::ToolUsage(_) => None,
            })
            .take(limit)
            .collect())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CookieUserResolver;
    use serde_json::json;

    fn admin() -> User {
        CookieUserResolver::user_for_email("admin@example.com")
    }

    #[tokio::test]
    async fn evicts_oldest_entries_beyond_capacity() {
        let memory = DemoAgentMemory::new(3);
        for i in 0..5 {
            memory
                .save_tool_usage(&format!("question {i}"), "run_sql", json!({}), &admin())
                .await
                .unwrap();
        }
        assert_eq!(memory.len().await, 3);

        let mut query = UsageQuery::new("question 0");
        query.similarity_threshold = 1.0;
        assert!(memory.search_similar_usage(&query).await.unwrap().is_empty());

        query.question = "question 4".into();
        let hits = memory.search_similar_usage(&query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.saved_by, "admin@example.com");
    }

    #[tokio::test]
    async fn search_ranks_exact_match_first_and_applies_threshold() {
        let memory = DemoAgentMemory::new(100);
        let user = admin();
        memory
            .save_tool_usage(
                "total spend per vendors",
                "run_sql",
                json!({"sql": "SELECT 2"}),
                &user,
            )
            .await
            .unwrap();
        memory
            .save_tool_usage(
                "total spend per vendor",
                "run_sql",
                json!({"sql": "SELECT 1"}),
                &user,
            )
            .await
            .unwrap();
        memory
            .save_tool_usage("how many customers exist", "run_sql", json!({}), &user)
            .await
            .unwrap();

        let hits = memory
            .search_similar_usage(&UsageQuery::new("Total spend per vendor"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].similarity, 1.0);
        assert_eq!(hits[0].memory.args, json!({"sql": "SELECT 1"}));
        assert!(hits[1].similarity < 1.0);
    }

    #[tokio::test]
    async fn search_respects_tool_filter_and_limit() {
        let memory = DemoAgentMemory::new(100);
        let user = admin();
        for tool in ["run_sql", "visualize_data", "run_sql"] {
            memory
                .save_tool_usage("monthly invoice totals", tool, json!({}), &user)
                .await
                .unwrap();
        }
        let mut query = UsageQuery::new("monthly invoice totals");
        query.tool_name_filter = Some("visualize_data".into());
        assert_eq!(memory.search_similar_usage(&query).await.unwrap().len(), 1);

        query.tool_name_filter = None;
        query.limit = 2;
        assert_eq!(memory.search_similar_usage(&query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn text_memories_are_listed_newest_first() {
        let memory = DemoAgentMemory::new(10);
        let user = admin();
        memory.save_text_memory("fiscal year starts in April", &user).await.unwrap();
        memory
            .save_tool_usage("q", "run_sql", json!({}), &user)
            .await
            .unwrap();
        memory.save_text_memory("amounts are in EUR", &user).await.unwrap();

        let recent = memory.recent_text_memories(5).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["amounts are in EUR", "fiscal year starts in April"]);

        memory.clear().await;
        assert_eq!(memory.len().await, 0);
    }

    #[tokio::test]
    async fn zero_capacity_still_keeps_the_latest_entry() {
        let memory = DemoAgentMemory::new(0);
        memory.save_text_memory("first", &admin()).await.unwrap();
        memory.save_text_memory("second", &admin()).await.unwrap();
        assert_eq!(memory.len().await, 1);
        assert_eq!(memory.recent_text_memories(5).await.unwrap()[0].content, "second");
    }
}
