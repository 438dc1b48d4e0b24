//! Mock backend for testing
//!
//! Echoes the user's message unless configured with a fixed reply, and can
//! be made to fail so fallback paths get exercised.

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{AIBackend, ChatPrompt};

/// Mock AI backend for testing
#[derive(Clone, Debug, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Fixed reply; echo when unset
    pub reply: Option<String>,
    /// Every chat call errors
    pub fail: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            reply: None,
            fail: false,
        }
    }

    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::new()
        }
    }

    /// A backend that is down
    pub fn failing() -> Self {
        Self {
            healthy: false,
            reply: None,
            fail: true,
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn chat(&self, prompt: &ChatPrompt) -> Result<String> {
        if self.fail {
            return Err(Error::Ai("mock backend unavailable".into()));
        }
        Ok(match &self.reply {
            Some(reply) => reply.clone(),
            None => format!("(mock) You said: {}", prompt.message),
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }
}
