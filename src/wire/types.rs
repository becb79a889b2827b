//! Request and frame types

use crate::calculation::CalculationResult;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Prior turn sent back to the backend as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub persona_id: String,
}

impl ChatRequest {
    pub fn new(
        message: impl Into<String>,
        history: Vec<HistoryEntry>,
        persona_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            history,
            persona_id: persona_id.into(),
        }
    }
}

/// One decoded unit of the response stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Text to append to the assistant message, verbatim
    Text(String),
    /// Partial calculation result, merged into the turn's message
    Calculation(CalculationResult),
    /// Follow-up suggestions, replace any earlier ones
    Suggestions(Vec<String>),
    /// Error reported by the backend
    Error(String),
    /// End-of-stream marker
    Done,
}

impl StreamFrame {
    /// Payload as the backend writes it into a `data:` line
    pub fn to_payload(&self) -> String {
        match self {
            StreamFrame::Text(content) => json!({"type": "text", "content": content}).to_string(),
            StreamFrame::Calculation(result) => {
                json!({"type": "calculation", "result": result}).to_string()
            }
            StreamFrame::Suggestions(suggestions) => {
                json!({"type": "suggestions", "suggestions": suggestions}).to_string()
            }
            StreamFrame::Error(content) => json!({"type": "error", "content": content}).to_string(),
            StreamFrame::Done => "[DONE]".to_string(),
        }
    }

    /// Complete event-stream frame, terminated by a blank line
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.to_payload())
    }
}
