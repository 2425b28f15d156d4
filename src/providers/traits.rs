use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

/// One message in a chat-completion exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: &'static str,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Seam for the external text-completion service. The chat flow only ever
/// sees this trait, so tests can swap in a canned provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, AppError>;
}
