//! Test doubles for the generation capability.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rfpscope_shared::AnalysisError;

use crate::generation::{RawGenerationOutput, TextGenerator};
use crate::prompt::RenderedPrompt;

/// Canned reply for prompts containing a marker.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    outcome: Result<RawGenerationOutput, AnalysisError>,
    delay: Option<Duration>,
}

impl Reply {
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self::output(RawGenerationOutput::Text(text.into()))
    }

    pub(crate) fn output(output: RawGenerationOutput) -> Self {
        Self {
            outcome: Ok(output),
            delay: None,
        }
    }

    pub(crate) fn error(error: AnalysisError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
        }
    }

    /// Answer only after `delay` has elapsed.
    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Generator answering from a script keyed by prompt substrings.
/// Records every prompt it receives.
#[derive(Debug, Default)]
pub(crate) struct ScriptedGenerator {
    rules: Vec<(String, Reply)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` to prompts containing `marker`. First match wins.
    pub(crate) fn on(mut self, marker: &str, reply: Reply) -> Self {
        self.rules.push((marker.to_string(), reply));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
    ) -> Result<RawGenerationOutput, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = prompt.full_text();
        self.prompts.lock().unwrap().push(text.clone());

        let reply = self
            .rules
            .iter()
            .find(|(marker, _)| text.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| AnalysisError::generation("no scripted reply for prompt"))?;

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.outcome
    }
}

/// Read a model-response fixture from `fixtures/responses/`.
pub(crate) fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("../../../fixtures/responses/{name}"))
        .expect("read response fixture")
}
