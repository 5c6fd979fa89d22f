use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{config::OpenRouterConfig, error::PredictionError};

use super::RiskPredictor;

/// Chat-completion client for OpenRouter.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    config: OpenRouterConfig,
    api_key: Option<String>,
    http: Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OrMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrChoice {
    message: OrMessage,
}

#[derive(Debug, Deserialize)]
struct OrResponse {
    choices: Vec<OrChoice>,
}

impl OpenRouterClient {
    pub fn new(config: OpenRouterConfig, api_key: Option<String>) -> Self {
        Self { config, api_key, http: Client::new() }
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        }
    }
}

/// Map the HTTP status and body of a completion call onto the model text.
fn interpret_response(status: StatusCode, body: String) -> Result<String, PredictionError> {
    if !status.is_success() {
        return Err(PredictionError::Status { status: status.as_u16(), body });
    }

    let parsed: OrResponse = serde_json::from_str(&body)
        .map_err(|e| PredictionError::UnexpectedResponse(format!("{e}: {}", truncate_body(&body))))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| {
            PredictionError::UnexpectedResponse(format!(
                "no message content in response: {}",
                truncate_body(&body)
            ))
        })
}

#[async_trait]
impl RiskPredictor for OpenRouterClient {
    async fn predict(&self, prompt: &str) -> Result<String, PredictionError> {
        let api_key = self.api_key.as_deref().ok_or(PredictionError::MissingApiKey)?;

        let res = self
            .http
            .post(&self.config.url)
            .bearer_auth(api_key)
            .header("X-Title", &self.config.title)
            .header("HTTP-Referer", &self.config.referer)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            log::warn!(
                "OpenRouter request failed with status {}: {}",
                status,
                truncate_body(&body)
            );
        }

        interpret_response(status, body)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
