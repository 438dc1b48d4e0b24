//! Pluggable chat backend for the coaching assistant
//!
//! # Architecture
//!
//! - `AIBackend` trait: the operations the chat service needs
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `OpenAIBackend` (any `/v1/chat/completions` server), `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: `openai` (default) or `mock`
//! - `OPENAI_API_KEY`: bearer key (required for the openai backend)
//! - `OPENAI_BASE_URL`: server URL (default: https://api.openai.com)
//! - `OPENAI_MODEL`: model name (default: gpt-4o-mini)

mod mock;
mod openai;

pub use mock::MockBackend;
pub use openai::OpenAIBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ChatRole;

/// One prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Everything sent to the model for one reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPrompt {
    /// System prompt carrying the user's financial context
    pub system: String,
    /// Earlier turns, oldest first
    pub history: Vec<ChatTurn>,
    /// The message being answered
    pub message: String,
}

/// Trait defining the interface for all chat backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Produce an assistant reply
    async fn chat(&self, prompt: &ChatPrompt) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Model name (for logging)
    fn model(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone, Debug)]
pub enum AIClient {
    /// OpenAI-compatible chat completions
    OpenAI(OpenAIBackend),
    /// Canned replies for tests and offline development
    Mock(MockBackend),
}

impl AIClient {
    /// Create a client from environment variables
    ///
    /// Returns None when the selected backend is not configured, in which
    /// case chat falls back to templated replies.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai".to_string());

        match backend.to_lowercase().as_str() {
            "openai" | "openai_compatible" => OpenAIBackend::from_env().map(AIClient::OpenAI),
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            "none" | "off" => None,
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai");
                OpenAIBackend::from_env().map(AIClient::OpenAI)
            }
        }
    }

    pub fn openai(base_url: &str, model: &str, api_key: &str) -> Self {
        AIClient::OpenAI(OpenAIBackend::new(base_url, model, api_key))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn chat(&self, prompt: &ChatPrompt) -> Result<String> {
        match self {
            AIClient::OpenAI(b) => b.chat(prompt).await,
            AIClient::Mock(b) => b.chat(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAI(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAI(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }
}
