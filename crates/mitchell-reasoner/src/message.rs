//! Wire-level conversation types shared by every reasoner backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single turn in the conversation handed to a reasoner on each navigation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Base64-encodes a screenshot for embedding in a backend's wire payload.
pub fn encode_screenshot(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Describes one callable tool, in the shape backends forward to their
/// underlying provider's function-calling API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments object.
    pub parameters: Value,
}

/// What the reasoner decided to do in response to the current page state.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    ToolCall { name: String, arguments: Value },
    Text(String),
}
