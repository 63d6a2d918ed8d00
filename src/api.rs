//! LLM API interaction under a hard deadline.
//!
//! This module provides the generative-text boundary used by the enhancement
//! orchestrator. It talks to any OpenAI-compatible `/chat/completions`
//! endpoint (Groq by default).
//!
//! # Architecture
//!
//! - [`Generate`]: Core trait defining one cancellable completion
//! - [`ChatClient`]: `reqwest` implementation, built once from
//!   [`GenerationConfig`] and passed by reference to whoever needs it
//! - [`complete_with_deadline`]: Races a [`Generate`] call against a
//!   wall-clock deadline via a [`CancellationToken`]
//!
//! # Error Classification
//!
//! HTTP failures are classified here, once, into typed errors:
//!
//! | Response | Error |
//! |----------|-------|
//! | 401, 403, body mentions "API key" | [`Error::Auth`] |
//! | 429 mentioning quota | [`Error::QuotaExceeded`] |
//! | 429 otherwise, body mentions rate limit | [`Error::RateLimited`] |
//! | client timeout, expired deadline | [`Error::Timeout`] |
//! | unreachable API, anything else | [`Error::EnhancementFailed`] |

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Request with the model settings from `config`.
    pub fn from_config(config: &GenerationConfig, prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            prompt,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Trait for async, cancellable text generation.
///
/// Implementations must return promptly once `cancel` fires and stop any
/// in-flight work.
pub trait Generate {
    async fn complete(&self, request: &CompletionRequest, cancel: &CancellationToken) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ChatClient {
    /// Fails with [`Error::Config`] when no API key is configured.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("cannot build LLM client: {e}")))?;
        let endpoint = format!("{}/chat/completions", config.api_base.trim_end_matches('/'));
        info!(%endpoint, key = %mask_key(&api_key), "Initialized LLM client");
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("LLM API request timed out: {e}"))
                } else {
                    Error::EnhancementFailed(format!("LLM API request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status.as_u16(), &text, retry_after));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::EnhancementFailed(format!("Invalid response structure from API: {e}")))?;
        extract_completion(parsed)
    }
}

impl Generate for ChatClient {
    #[instrument(level = "info", skip_all, fields(model = %request.model))]
    async fn complete(&self, request: &CompletionRequest, cancel: &CancellationToken) -> Result<String> {
        let t0 = Instant::now();
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Timeout("LLM API request was cancelled".to_string())),
            res = self.send(request) => res,
        };
        let dt = t0.elapsed();

        match &res {
            Ok(text) => info!(elapsed_ms = dt.as_millis() as u64, chars = text.len(), "API call succeeded"),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed"),
        }
        res
    }
}

fn extract_completion(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| Error::EnhancementFailed("Invalid response structure from API".to_string()))?;
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::EnhancementFailed(
            "Received empty content from API".to_string(),
        ));
    }
    Ok(content.to_string())
}

/// Map a failed HTTP response from the LLM API to a typed error.
pub fn classify_api_error(status: u16, body: &str, retry_after: Option<Duration>) -> Error {
    let lower = body.to_ascii_lowercase();
    let message = format!("{status}: {}", body.trim());

    if status == 401 || status == 403 || lower.contains("api key") || lower.contains("authentication") {
        Error::Auth(message)
    } else if status == 429 && (lower.contains("quota") || lower.contains("insufficient")) {
        Error::QuotaExceeded { message, retry_after }
    } else if status == 429 || lower.contains("rate limit") || lower.contains("rate_limit") {
        Error::RateLimited { message, retry_after }
    } else if status == 408 || status == 504 {
        Error::Timeout(message)
    } else {
        Error::EnhancementFailed(message)
    }
}

/// Run one completion; if it has not finished after `deadline`, cancel it
/// and fail with [`Error::Timeout`].
#[instrument(level = "info", skip_all, fields(deadline_ms = deadline.as_millis() as u64))]
pub async fn complete_with_deadline<G: Generate>(
    generator: &G,
    request: &CompletionRequest,
    deadline: Duration,
) -> Result<String> {
    let t0 = Instant::now();
    let token = CancellationToken::new();
    let timer = {
        let token = token.clone();
        tokio::spawn(async move {
            sleep(deadline).await;
            token.cancel();
        })
    };

    let res = tokio::select! {
        res = generator.complete(request, &token) => res,
        _ = token.cancelled() => Err(Error::Timeout(String::new())),
    };
    timer.abort();

    let res = match res {
        Err(_) if token.is_cancelled() => {
            error!(elapsed_ms = t0.elapsed().as_millis() as u64, "LLM call exceeded deadline");
            Err(Error::Timeout(format!(
                "Request timed out - the LLM API did not answer within {} seconds",
                deadline.as_secs()
            )))
        }
        other => other,
    };
    // stop anything the generator left running
    token.cancel();
    res
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
