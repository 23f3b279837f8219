//! Run one task end to end: render → invoke → normalize → extract.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use rfpscope_shared::{AnalysisError, ExtractStrategy, TaskFailure};

use crate::extract::extract_json;
use crate::generation::{TextGenerator, invoke};
use crate::normalize::response_text;
use crate::prompt::{Variables, render};
use crate::task::TaskSpec;

/// Per-task knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskOptions {
    /// Bound on the generation call.
    pub timeout: Option<Duration>,
    pub extract: ExtractStrategy,
}

/// Run `spec` against `variables`, calling `generator` at most once.
///
/// Any stage failure is returned as a [`TaskFailure`] carrying the task name.
#[instrument(skip_all, fields(task = %spec.name))]
pub async fn run_task<G: TextGenerator>(
    spec: &TaskSpec,
    variables: &Variables,
    generator: &G,
    options: &TaskOptions,
) -> Result<Value, TaskFailure> {
    run_stages(spec, variables, generator, options)
        .await
        .map_err(|cause| TaskFailure::new(spec.name.clone(), cause))
}

async fn run_stages<G: TextGenerator>(
    spec: &TaskSpec,
    variables: &Variables,
    generator: &G,
    options: &TaskOptions,
) -> Result<Value, AnalysisError> {
    let prompt = render(spec, variables)?;
    let raw = invoke(generator, &prompt, options.timeout).await?;
    let text = response_text(raw);
    debug!(response_len = text.len(), "received response");
    extract_json(&text, options.extract)
}
