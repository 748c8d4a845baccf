use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::message::{ChatMessage, ROLE_ASSISTANT, ROLE_SYSTEM};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request to model provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model provider blocked the prompt: {0}")]
    Blocked(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// Produces one complete reply for an ordered conversation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;
}

// --- Gemini wire types ---

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentRequest {
    /// `assistant` becomes Gemini's `model`, `system` turns are lifted into
    /// `systemInstruction`, every other role is forwarded untouched.
    pub fn from_messages(messages: &[ChatMessage]) -> Self {
        let mut contents = Vec::with_capacity(messages.len());
        let mut system_parts = Vec::new();

        for msg in messages {
            let part = Part { text: Some(msg.content.clone()) };
            match msg.role.as_str() {
                ROLE_SYSTEM => system_parts.push(part),
                ROLE_ASSISTANT => contents.push(Content { role: Some("model".to_string()), parts: vec![part] }),
                other => contents.push(Content { role: Some(other.to_string()), parts: vec![part] }),
            }
        }

        let system_instruction = (!system_parts.is_empty()).then(|| Content { role: None, parts: system_parts });
        Self { contents, system_instruction }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, GenerationError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        Self::new(&config.base_url, &config.model, &config.api_key, config.upstream_timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let body = GenerateContentRequest::from_messages(messages);
        debug!(model = %self.model, turns = body.contents.len(), "calling generateContent");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status: status.as_u16(), body });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        extract_text(parsed)
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => GenerationError::Blocked(reason),
            None => GenerationError::MalformedResponse("no candidates".to_string()),
        });
    };

    let content = candidate
        .content
        .ok_or_else(|| GenerationError::MalformedResponse("candidate has no content".to_string()))?;

    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    debug!(chars = text.len(), "model reply received");
    Ok(text)
}
