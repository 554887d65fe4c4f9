//! Chat generation request and response types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Author role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ChatRole {
    /// System instructions constraining the model.
    #[serde(rename = "system")]
    #[strum(serialize = "system")]
    System,
    /// End-user message.
    #[serde(rename = "user")]
    #[strum(serialize = "user")]
    User,
    /// Prior assistant message.
    #[serde(rename = "assistant")]
    #[strum(serialize = "assistant")]
    Assistant,
}

/// A single prompt message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling and length options for generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Sampling temperature (0.0 to 1.0).
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,
    /// Stop strings that end generation.
    pub stop: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.1),
            max_tokens: Some(1024),
            stop: Vec::new(),
        }
    }
}

/// Request for a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// Ordered prompt messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling and length options.
    pub options: GenerateOptions,
}

impl GenerateRequest {
    /// Creates a new generation request with default options.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            messages,
            options: GenerateOptions::default(),
        }
    }

    /// Sets the sampling and length options.
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

/// Token accounting for one generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens produced in the completion.
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Returns the total tokens for the call.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Response from a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Unique identifier for this response.
    pub response_id: Uuid,
    /// Request ID this response corresponds to.
    pub request_id: Uuid,
    /// Generated text.
    pub text: String,
    /// Token accounting reported by the runtime.
    pub usage: TokenUsage,
}

impl GenerateResponse {
    /// Creates a response for the given request id.
    pub fn new(request_id: Uuid, text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            response_id: Uuid::now_v7(),
            request_id,
            text: text.into(),
            usage,
        }
    }
}
