//! OpenAI-compatible backend
//!
//! Works with any server that implements `/v1/chat/completions` with bearer
//! authentication: OpenAI itself, or a local vLLM / LocalAI / llama-server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::ChatRole;

use super::{AIBackend, ChatPrompt};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible backend
#[derive(Clone, Debug)]
pub struct OpenAIBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAIBackend {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Required: `OPENAI_API_KEY`
    /// Optional: `OPENAI_BASE_URL`, `OPENAI_MODEL`
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self::new(&base_url, &model, &api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, prompt: &ChatPrompt) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(prompt.history.len() + 2);
        if !prompt.system.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: prompt.system.clone(),
            });
        }
        for turn in &prompt.history {
            messages.push(WireMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                }
                .to_string(),
                content: turn.content.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user".to_string(),
            content: prompt.message.clone(),
        });

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.4),
            max_tokens: Some(400),
            stream: false,
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl AIBackend for OpenAIBackend {
    async fn chat(&self, prompt: &ChatPrompt) -> Result<String> {
        let request = self.build_request(prompt);
        debug!(model = %self.model, turns = request.messages.len(), "Sending chat completion");

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Chat completion failed");
            return Err(Error::Ai(format!("OpenAI API error {}: {}", status, body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Ai("Empty response from OpenAI API".into()))
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "AI health check failed");
                false
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatTurn;

    #[test]
    fn test_request_shape() {
        let backend = OpenAIBackend::new("http://localhost:8000/", "test-model", "sk-test");
        assert_eq!(backend.base_url(), "http://localhost:8000");

        let prompt = ChatPrompt {
            system: "You are a coach.".into(),
            history: vec![
                ChatTurn {
                    role: ChatRole::User,
                    content: "hi".into(),
                },
                ChatTurn {
                    role: ChatRole::Assistant,
                    content: "hello".into(),
                },
            ],
            message: "budget?".into(),
        };
        let json = serde_json::to_value(backend.build_request(&prompt)).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["messages"][3]["content"], "budget?");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_request_without_system_prompt() {
        let backend = OpenAIBackend::new("http://localhost:8000", "m", "k");
        let prompt = ChatPrompt {
            message: "hello".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(backend.build_request(&prompt)).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Spend less on takeout. "}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(" Spend less on takeout. ")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let backend = OpenAIBackend::new("http://127.0.0.1:1", "m", "k");
        assert!(!backend.health_check().await);
        assert!(backend
            .chat(&ChatPrompt {
                message: "hi".into(),
                ..Default::default()
            })
            .await
            .is_err());
    }
}
