// src/message.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_SYSTEM: &str = "system";

/// One turn of the conversation. `role` is passed through as-is; only the
/// shape is checked locally.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ROLE_USER, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ROLE_ASSISTANT, content)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl TryFrom<Value> for ChatRequest {
    type Error = AppError;

    fn try_from(body: Value) -> Result<Self, Self::Error> {
        let messages = match body {
            Value::Object(mut map) => map.remove("messages"),
            _ => None,
        };

        let Some(messages @ Value::Array(_)) = messages else {
            return Err(AppError::InvalidMessages("`messages` missing or not an array".to_string()));
        };

        let messages: Vec<ChatMessage> = serde_json::from_value(messages)
            .map_err(|e| AppError::InvalidMessages(format!("malformed message: {e}")))?;

        if messages.is_empty() {
            return Err(AppError::InvalidMessages("`messages` is empty".to_string()));
        }

        Ok(Self { messages })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatResponse {
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
}
