//! C3 — LLM Provider port.
//!
//! A narrow text-generation port with a fallback chain. The core never
//! names a concrete provider (Anthropic/OpenRouter/OpenAI/local); it
//! only depends on `LlmProvider`. When no credentialed adapter is
//! configured, `TemplateProvider` supplies a deterministic templated
//! string so the cognitive loop still runs (§6, §9).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider call exceeded its timeout")]
    Timeout,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// The narrow port every concrete adapter implements.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, ProviderError>;

    /// A human-readable name, used only for degraded-mode logging.
    fn name(&self) -> &str;
}

/// Always succeeds with a deterministic templated string derived from
/// the prompt. Used as the last link of the fallback chain and as the
/// sole provider when no credentials are configured.
#[derive(Debug, Default)]
pub struct TemplateProvider;

#[async_trait]
impl LlmProvider for TemplateProvider {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String, ProviderError> {
        let excerpt: String = prompt.chars().take(48).collect();
        Ok(format!("[template-fallback] considering: {excerpt}"))
    }

    fn name(&self) -> &str {
        "template-fallback"
    }
}

/// Tries each adapter in order, enforcing `timeout` per call, and falls
/// through to the next on `Timeout`/`Unavailable`. The chain itself
/// never fails as long as the last link is infallible (e.g. a
/// `TemplateProvider`).
pub struct FallbackChain {
    adapters: Vec<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl FallbackChain {
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        Self { adapters, timeout }
    }

    /// A chain with only the deterministic fallback — used when no
    /// provider credentials are configured.
    #[must_use]
    pub fn fallback_only(timeout: Duration) -> Self {
        Self::new(vec![Arc::new(TemplateProvider)], timeout)
    }

    /// Generates text, returning `(text, degraded)` where `degraded` is
    /// true iff the final answer came from anything but the first
    /// adapter (i.e. at least one upstream adapter timed out or was
    /// unavailable).
    pub async fn generate(&self, prompt: &str, options: &GenerateOptions) -> (String, bool) {
        for (i, adapter) in self.adapters.iter().enumerate() {
            let attempt = tokio::time::timeout(self.timeout, adapter.generate(prompt, options)).await;
            match attempt {
                Ok(Ok(text)) => return (text, i > 0),
                Ok(Err(_)) | Err(_) => continue,
            }
        }
        // Every adapter failed or timed out; the template fallback never
        // fails, but guard against an empty chain defensively.
        (
            format!("[template-fallback] considering: {}", prompt.chars().take(48).collect::<String>()),
            true,
        )
    }
}
