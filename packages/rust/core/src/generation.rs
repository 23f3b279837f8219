//! The generation capability the pipeline depends on.
//!
//! The pipeline never talks to a model provider directly. It is handed a
//! [`TextGenerator`] at construction and calls it exactly once per task.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rfpscope_shared::AnalysisError;

use crate::prompt::RenderedPrompt;

/// A chat completion returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Text of the first choice.
    pub content: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub tokens_in: u64,
    #[serde(default)]
    pub tokens_out: u64,
}

/// Whatever the generation capability hands back, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGenerationOutput {
    /// A bare string.
    Text(String),
    /// A structured completion with a text attribute.
    Completion(ChatCompletion),
    /// An arbitrary JSON payload (provider-specific shape).
    Json(serde_json::Value),
}

impl From<String> for RawGenerationOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawGenerationOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<ChatCompletion> for RawGenerationOutput {
    fn from(completion: ChatCompletion) -> Self {
        Self::Completion(completion)
    }
}

/// Text generation from a rendered prompt.
///
/// Implementations own provider selection, authentication and any retry
/// policy. Errors are reported as [`AnalysisError::Generation`] (or
/// [`AnalysisError::Timeout`]) and passed through the pipeline unchanged.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        prompt: &RenderedPrompt,
    ) -> impl Future<Output = Result<RawGenerationOutput, AnalysisError>> + Send;
}

/// Call `generator` once, optionally bounded by `timeout`. No retry.
pub async fn invoke<G: TextGenerator>(
    generator: &G,
    prompt: &RenderedPrompt,
    timeout: Option<Duration>,
) -> Result<RawGenerationOutput, AnalysisError> {
    debug!(
        prompt_len = prompt.len(),
        fingerprint = %prompt.fingerprint(),
        "invoking generation"
    );

    match timeout {
        Some(after) => tokio::time::timeout(after, generator.generate(prompt))
            .await
            .map_err(|_| AnalysisError::Timeout { after })?,
        None => generator.generate(prompt).await,
    }
}
