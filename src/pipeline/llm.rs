//! Model invocation: send assembled messages with a schema constraint and
//! turn whatever comes back into a validated record or a model error.
//!
//! ## Retry Strategy
//!
//! Only transport-level failures are retried (connection errors, timeouts,
//! HTTP 429 and 5xx), with exponential backoff (`retry_backoff_ms * 2^n`).
//! With 500 ms base and 2 retries the wait sequence is 500 ms → 1 s.
//! A response that arrived but failed parsing or validation is final: at
//! near-zero temperature the same request yields the same bad payload.

use crate::config::{ProcessorConfig, SamplingParams};
use crate::error::{LeaseError, ModelError};
use crate::pipeline::postprocess::extract_json_payload;
use crate::provider::{ChatMessage, ChatModel, ChatRequest, ResponseFormat};
use crate::schema::SchemaContract;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Which pipeline a model call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
    Extraction,
    Comparison,
}

impl CallStage {
    pub fn as_str(self) -> &'static str {
        match self {
            CallStage::Extraction => "extraction",
            CallStage::Comparison => "comparison",
        }
    }
}

/// Sends requests to a [`ChatModel`] with fixed decoding parameters.
#[derive(Clone)]
pub struct ModelInvoker {
    model: Arc<dyn ChatModel>,
    model_name: String,
    sampling: SamplingParams,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl ModelInvoker {
    pub fn new(model: Arc<dyn ChatModel>, config: &ProcessorConfig) -> Self {
        Self {
            model,
            model_name: config.model.clone(),
            sampling: config.sampling,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Build the request for `messages` constrained to `T`'s schema.
    pub fn request_for<T: SchemaContract>(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model: self.model_name.clone(),
            messages,
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
            frequency_penalty: self.sampling.frequency_penalty,
            presence_penalty: self.sampling.presence_penalty,
            response_format: ResponseFormat::json_schema(T::NAME, T::json_schema()),
        }
    }

    /// Call the model and validate the answer as `T`.
    ///
    /// Every failure comes back as [`LeaseError::Model`] naming `stage` and
    /// `document`, and is logged at error level here.
    pub async fn invoke<T: SchemaContract>(
        &self,
        messages: Vec<ChatMessage>,
        stage: CallStage,
        document: &str,
    ) -> Result<T, LeaseError> {
        let request = self.request_for::<T>(messages);
        let start = Instant::now();
        info!(
            "Sending {} request for {} ({} messages, schema {})",
            stage.as_str(),
            document,
            request.messages.len(),
            T::NAME
        );

        let result = self.complete_with_retry(&request, stage, document).await.and_then(|raw| {
            debug!("{} response for {}: {} bytes", stage.as_str(), document, raw.len());
            parse_record::<T>(&raw)
        });

        match result {
            Ok(record) => {
                info!(
                    "Received valid {} for {} in {:?}",
                    T::NAME,
                    document,
                    start.elapsed()
                );
                Ok(record)
            }
            Err(source) => {
                error!("{} failed for {}: {}", stage.as_str(), document, source);
                Err(LeaseError::Model {
                    stage: stage.as_str().to_string(),
                    document: document.to_string(),
                    source,
                })
            }
        }
    }

    async fn complete_with_retry(
        &self,
        request: &ChatRequest,
        stage: CallStage,
        document: &str,
    ) -> Result<String, ModelError> {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{} for {}: retry {}/{} after {}ms",
                    stage.as_str(),
                    document,
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.model.complete(request).await {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(
                        "{} for {}: attempt {} failed: {}",
                        stage.as_str(),
                        document,
                        attempt + 1,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Longest single wait between retries.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base.saturating_mul(factor))
        .min(MAX_BACKOFF_MS)
}

/// Raw completion → validated record.
pub fn parse_record<T: SchemaContract>(raw: &str) -> Result<T, ModelError> {
    let payload = extract_json_payload(raw);
    let value: Value =
        serde_json::from_str(&payload).map_err(|e| ModelError::MalformedJson(e.to_string()))?;
    T::from_json(value)
}
