//! Role-tagged chat messages and the reducer that merges them into a transcript.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const TITLE_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::System => "System",
            Role::User => "Human",
            Role::Assistant => "Ai",
            Role::Tool => "Tool",
        };
        f.write_str(label)
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

/// Output of a tool, linked back to the call that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub output: Value,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Tool message carrying a successful result for `call`.
    pub fn tool_result(call: &ToolCall, output: Value) -> Self {
        let content = match &output {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            tool_result: Some(ToolResult {
                name: call.name.clone(),
                output,
                tool_call_id: call.id.clone(),
                is_error: false,
            }),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Tool message reporting that `call` failed.
    pub fn tool_error(call: &ToolCall, error: impl Into<String>) -> Self {
        let content = error.into();
        Self {
            tool_result: Some(ToolResult {
                name: call.name.clone(),
                output: Value::String(content.clone()),
                tool_call_id: call.id.clone(),
                is_error: true,
            }),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Multi-line rendering used by the CLI to print a transcript.
    pub fn pretty(&self) -> String {
        let mut out = title_line(&format!(" {} Message ", self.role));
        out.push_str("\n\n");
        if let Some(result) = &self.tool_result {
            out.push_str(&format!("Name: {}\n\n", result.name));
        }
        out.push_str(&self.content);
        if !self.tool_calls.is_empty() {
            if !self.content.is_empty() {
                out.push('\n');
            }
            out.push_str("Tool Calls:");
            for call in &self.tool_calls {
                let id = call.id.as_deref().unwrap_or("-");
                out.push_str(&format!("\n  {} ({id})\n Call ID: {id}\n  Args:", call.name));
                match &call.arguments {
                    Value::Object(map) => {
                        for (key, value) in map {
                            out.push_str(&format!("\n    {key}: {value}"));
                        }
                    }
                    other => out.push_str(&format!("\n    {other}")),
                }
            }
        }
        out
    }
}

fn title_line(title: &str) -> String {
    let side = TITLE_WIDTH.saturating_sub(title.len()) / 2;
    let left = "=".repeat(side);
    let right = if title.len() % 2 == 1 {
        format!("{left}=")
    } else {
        left.clone()
    };
    format!("{left}{title}{right}")
}

/// Merge `incoming` into `existing`.
///
/// Messages without an id get a fresh one. An incoming message whose id is
/// already present replaces the old message in place; everything else is
/// appended in order.
pub fn add_messages(existing: &mut Vec<Message>, incoming: Vec<Message>) {
    for mut message in incoming {
        let id = message
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        match existing
            .iter_mut()
            .find(|current| current.id.as_deref() == Some(id.as_str()))
        {
            Some(slot) => *slot = message,
            None => existing.push(message),
        }
    }
}
