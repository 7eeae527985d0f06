//! Conversation and audit messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit payload of a tool-call message: one host invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallMeta {
    /// Host operation name.
    pub name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
}

/// A single entry of the history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ToolCallMeta>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, meta: Option<ToolCallMeta>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            meta,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, None)
    }

    /// A tool-call audit entry. The content is a compact one-line summary.
    pub fn tool_call(
        name: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Self {
        let name = name.into();
        let content = format!("{}({}) -> {}", name, input, output);
        Self::new(
            Role::Tool,
            content,
            Some(ToolCallMeta {
                name,
                input,
                output,
            }),
        )
    }

    /// Label used when rendering the message into a prompt.
    pub fn speaker(&self) -> String {
        match (&self.role, &self.meta) {
            (Role::Tool, Some(meta)) => format!("tool[{}]", meta.name),
            (role, _) => role.to_string(),
        }
    }

    /// `speaker: content`, the prompt transcript line for this message.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.speaker(), self.content)
    }

    pub fn is_tool_call(&self) -> bool {
        self.role == Role::Tool
    }
}
