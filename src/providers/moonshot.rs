use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::AppError;
use crate::providers::traits::{ChatTurn, CompletionProvider};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the Moonshot chat-completions API. Construction validates the
/// credential; request failures are classified per the error taxonomy.
#[derive(Debug)]
pub struct MoonshotProvider {
    api_key: String,
    model: String,
    url: String,
    client: Client,
}

impl MoonshotProvider {
    pub fn from_config(config: &ChatConfig) -> Result<Self, AppError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AppError::Configuration(
                "MOONSHOT_API_KEY is not set; add it to the .env file".to_string(),
            )
        })?;
        if !api_key.starts_with("sk-") {
            return Err(AppError::Configuration(
                "malformed API key: expected it to start with 'sk-'".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            model: config.model.clone(),
            url: config.completions_url(),
            client,
        })
    }

    fn classify_status(status: StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());

        match status {
            StatusCode::UNAUTHORIZED => AppError::Upstream(
                "API key is invalid or expired; check MOONSHOT_API_KEY".to_string(),
            ),
            StatusCode::FORBIDDEN => AppError::Upstream(
                "API key has no permission for this endpoint".to_string(),
            ),
            StatusCode::TOO_MANY_REQUESTS => {
                AppError::Upstream("rate limited by the completion service; retry later".to_string())
            }
            s if s.is_server_error() => {
                AppError::Upstream(format!("completion service failure ({s})"))
            }
            s => AppError::Upstream(format!("completion service error ({s}): {detail}")),
        }
    }

    fn classify_send_error(err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::UpstreamTimeout(REQUEST_TIMEOUT_SECS)
        } else if err.is_connect() {
            AppError::UpstreamUnreachable(err.to_string())
        } else {
            AppError::Upstream(format!("request error: {err}"))
        }
    }
}

#[async_trait]
impl CompletionProvider for MoonshotProvider {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, AppError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(Self::classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamProtocol(format!("response is not JSON: {e}")))?;

        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::UpstreamProtocol("no completion text in response body".to_string())
            })
    }
}
