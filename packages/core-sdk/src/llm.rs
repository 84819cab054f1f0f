use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;

/**
 * \brief Why a completion attempt produced no reply.
 */
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("missing message")]
    MissingPrompt,
    #[error("no API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("timeout")]
    Timeout,
    #[error("{0}")]
    Transport(String),
    #[error("request failed: {status} -> {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else if e.is_decode() {
            CompletionError::MalformedResponse(e.to_string())
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}

/**
 * \brief Single-turn completion against an external model.
 */
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /**
     * \brief Send `prompt` as one user message and return the trimmed reply.
     * \param prompt `None` when the caller received no message at all
     */
    async fn complete(&self, prompt: Option<&str>) -> Result<String, CompletionError>;
}

/**
 * \brief Fold a completion outcome into the text shown to the user.
 * \details Failures become `Error: <cause>`.
 */
pub fn reply_text(outcome: &Result<String, CompletionError>) -> String {
    match outcome {
        Ok(reply) => reply.clone(),
        Err(e) => format!("Error: {}", e),
    }
}

/**
 * \brief OpenAI-compatible `/v1/chat/completions` client.
 */
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.completion_timeout)
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: Option<&str>) -> Result<String, CompletionError> {
        let prompt = prompt.ok_or(CompletionError::MissingPrompt)?;
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(CompletionError::MissingApiKey)?;

        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
        });

        let resp = self
            .http
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream { status, body });
        }
        let v: Value = resp.json().await?;
        extract_first_choice(&v)
    }
}

fn extract_first_choice(v: &Value) -> Result<String, CompletionError> {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| CompletionError::MalformedResponse(format!("no choices in {}", v)))
}
