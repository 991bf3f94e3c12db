//! Language model access.
//!
//! The generation pipeline only sees the [`LanguageModel`] trait: submit a
//! prompt, get text back, or fail with an [`LlmError`]. [`AiClient`] is the
//! production implementation that talks to the internal AI service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Outcome of a failed model call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider throttling; recoverable by retrying later.
    #[error("model provider rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("model provider error: {0}")]
    Provider(String),
}

/// A single prompt submitted to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

/// Client for the AI service.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
    token: String,
    model: Option<String>,
}

/// Error response from AI service.
#[derive(Debug, Deserialize)]
struct AiErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after_seconds: Option<u64>,
    /// Provider-style hint such as `"37s"`.
    #[serde(default)]
    retry_delay: Option<String>,
}

impl AiClient {
    /// Create a new AI service client.
    pub fn new(
        base_url: &str,
        token: &str,
        model: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, model = ?model, "AI client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            model,
        })
    }

    /// Check AI service health.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("AI service health check failed")?
            .error_for_status()
            .context("AI service unhealthy")?;

        Ok(())
    }
}

#[async_trait]
impl LanguageModel for AiClient {
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.user.len()))]
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        #[derive(Serialize)]
        struct Request<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            model: Option<&'a str>,
            system: &'a str,
            prompt: &'a str,
            max_tokens: u32,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            text: String,
        }

        let url = format!("{}/v1/generate", self.base_url);
        debug!(url = %url, "AI service request");

        let response = self
            .client
            .post(&url)
            .header("X-Internal-Token", &self.token)
            .json(&Request {
                model: self.model.as_deref(),
                system: &prompt.system,
                prompt: &prompt.user,
                max_tokens: prompt.max_output_tokens,
                temperature: prompt.temperature,
            })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "AI service request failed");
                LlmError::Provider(format!("AI service unavailable: {e}"))
            })?;

        let status = response.status();

        if status.is_success() {
            return response
                .json::<Response>()
                .await
                .map(|r| r.text)
                .map_err(|e| {
                    error!(error = %e, "Failed to parse AI service response");
                    LlmError::Provider(format!("Invalid AI service response: {e}"))
                });
        }

        let retry_header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let error_body = response.json::<AiErrorResponse>().await.ok();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_header
                .as_deref()
                .and_then(parse_retry_delay)
                .or_else(|| {
                    let body = error_body.as_ref()?;
                    body.retry_after_seconds
                        .map(Duration::from_secs)
                        .or_else(|| body.retry_delay.as_deref().and_then(parse_retry_delay))
                });
            warn!(retry_after = ?retry_after, "AI service rate limited");
            return Err(LlmError::RateLimited { retry_after });
        }

        let message = error_body
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("AI service error: {status}"));
        error!(status = %status, message = %message, "AI service error");
        Err(LlmError::Provider(message))
    }
}

/// Parse a retry hint given either as whole seconds (`"30"`) or as a
/// duration string (`"37s"`, `"1.5s"`).
pub fn parse_retry_delay(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let number = raw.strip_suffix('s').unwrap_or(raw).trim();
    let secs: f64 = number.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs(secs.ceil() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_accepts_seconds_and_duration_strings() {
        assert_eq!(parse_retry_delay("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_delay("37s"), Some(Duration::from_secs(37)));
        assert_eq!(parse_retry_delay(" 1.5s "), Some(Duration::from_secs(2)));
    }

    #[test]
    fn retry_delay_rejects_garbage() {
        assert_eq!(parse_retry_delay("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_delay("-3"), None);
        assert_eq!(parse_retry_delay(""), None);
    }
}
