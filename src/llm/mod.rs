pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use self::models::SqlGeneration;
use self::prompt::Prompt;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM API responded with status code {status}: {body}")]
    StatusError { status: u16, body: String },

    #[error("LLM response error: {0}")]
    ResponseError(String),

    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Connection failures, timeouts, rate limits and 5xx replies may succeed
    /// on a second attempt; everything else will not.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::ConnectionError(_) | LlmError::Timeout(_) => true,
            LlmError::StatusError { status, .. } => *status == 429 || *status >= 500,
            LlmError::ResponseError(_) | LlmError::ConfigError(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else {
            LlmError::ConnectionError(err.to_string())
        }
    }
}

/// A hosted text-completion backend. Returns the raw message content.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

pub struct LlmManager {
    provider: Box<dyn CompletionProvider>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider: Box<dyn CompletionProvider> = match config.backend.as_str() {
            "remote" | "openai" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self::with_provider(
            provider,
            config.timeout(),
            RetryPolicy {
                max_retries: config.max_retries,
                base_backoff: config.retry_backoff(),
            },
        ))
    }

    pub fn with_provider(
        provider: Box<dyn CompletionProvider>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            timeout,
            retry,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.provider.name()
    }

    /// Sends `prompt` and parses the reply, retrying transient failures with
    /// exponential backoff.
    pub async fn generate_sql(&self, prompt: &Prompt) -> Result<SqlGeneration, LlmError> {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, self.provider.complete(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(content) => {
                    debug!("Completion reply from {}: {}", self.provider.name(), content);
                    return Ok(SqlGeneration::from_reply(&content));
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    attempt += 1;
                    warn!(
                        "Transient LLM failure ({}), retry {}/{} in {:?}",
                        e, attempt, self.retry.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
