use std::sync::Arc;
use tracing::{info, warn};

use super::{Tool, ToolContext, ToolOutput};
use crate::error::AgentError;
use crate::identity::User;
use crate::llm::{ToolCall, ToolSchema};

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    access_groups: Vec<String>,
}

/// Tools in registration order, each restricted to a set of access groups.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool` for members of `access_groups`; an empty list opens it to
    /// every user. Registering a name twice replaces the earlier entry.
    pub fn register_local_tool<T>(&mut self, tool: T, access_groups: &[&str])
    where
        T: Tool + 'static,
    {
        let entry = RegisteredTool {
            tool: Arc::new(tool),
            access_groups: access_groups.iter().map(|g| g.to_string()).collect(),
        };
        let name = entry.tool.name().to_string();
        match self.tools.iter_mut().find(|t| t.tool.name() == name) {
            Some(existing) => *existing = entry,
            None => self.tools.push(entry),
        }
        info!(tool = %name, groups = ?access_groups, "tool registered");
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.tool.name()).collect()
    }

    /// Schemas of the tools `user` may call, in registration order.
    pub fn schemas_for(&self, user: &User) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .filter(|t| user.in_any_group(&t.access_groups))
            .map(|t| t.tool.schema())
            .collect()
    }

    /// Check access, then run the tool. The check happens here as well as in
    /// `schemas_for` since the model may name a tool it was never offered.
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        call: &ToolCall,
    ) -> Result<ToolOutput, AgentError> {
        let entry = self
            .find(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        if !ctx.user.in_any_group(&entry.access_groups) {
            warn!(tool = %call.name, user = %ctx.user.id, "tool call denied");
            return Err(AgentError::ToolAccessDenied {
                tool: call.name.clone(),
                user: ctx.user.id.clone(),
            });
        }

        info!(
            tool = %call.name,
            user = %ctx.user.id,
            request = %ctx.request_id,
            "executing tool"
        );
        entry.tool.execute(ctx, call.args.clone()).await
    }

    fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.tool.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::context_for;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echo the arguments"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _ctx: &ToolContext, args: Value) -> Result<ToolOutput, AgentError> {
            Ok(ToolOutput::new(args, "echoed"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register_local_tool(Echo("shared"), &["admin", "user"]);
        registry.register_local_tool(Echo("admin_only"), &["admin"]);
        registry.register_local_tool(Echo("open"), &[]);
        registry
    }

    #[tokio::test]
    async fn schemas_are_filtered_by_group() {
        let registry = registry();
        let admin = context_for("admin@example.com").await.user;
        let user = context_for("someone@example.com").await.user;

        let names = |u: &User| {
            registry
                .schemas_for(u)
                .into_iter()
                .map(|s| s.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&admin), vec!["shared", "admin_only", "open"]);
        assert_eq!(names(&user), vec!["shared", "open"]);
    }

    #[tokio::test]
    async fn execution_enforces_access_groups() {
        let registry = registry();
        let ctx = context_for("someone@example.com").await;

        let denied = registry
            .execute(&ctx, &ToolCall::new("admin_only", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(denied, AgentError::ToolAccessDenied { .. }));

        let ok = registry
            .execute(&ctx, &ToolCall::new("shared", json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(ok.result_for_llm, json!({"x": 1}));

        let missing = registry
            .execute(&ctx, &ToolCall::new("nope", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(missing, AgentError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn re_registering_replaces_groups() {
        let mut registry = registry();
        registry.register_local_tool(Echo("admin_only"), &["user"]);
        assert_eq!(registry.tool_names().len(), 3);

        let user = context_for("someone@example.com").await.user;
        let admin = context_for("admin@example.com").await.user;
        let offered = |u: &User| registry.schemas_for(u).iter().any(|s| s.name == "admin_only");
        assert!(offered(&user));
        assert!(!offered(&admin));
    }
}
