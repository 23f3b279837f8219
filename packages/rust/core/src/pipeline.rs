//! Analysis orchestration: run every registered task for a (company, RFP)
//! pair and merge their JSON fragments into one result.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, instrument, warn};

use rfpscope_shared::{
    AnalysisConfig, AnalysisId, ExecutionMode, ExtractStrategy, FailurePolicy,
    TaskFailure,
};

use crate::generation::TextGenerator;
use crate::prompt::Variables;
use crate::runner::{TaskOptions, run_task};
use crate::task::{COMPANY_DATA, ERRORS_KEY, RFP_CONTENT, TaskRegistry};

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// Input to an analysis: the extracted text of both documents.
///
/// Empty strings are valid input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub company_text: String,
    pub rfp_text: String,
}

impl AnalysisRequest {
    pub fn new(company_text: impl Into<String>, rfp_text: impl Into<String>) -> Self {
        Self {
            company_text: company_text.into(),
            rfp_text: rfp_text.into(),
        }
    }

    /// Template variables derived from the request.
    pub fn variables(&self) -> Variables {
        Variables::from([
            (COMPANY_DATA.to_string(), self.company_text.clone()),
            (RFP_CONTENT.to_string(), self.rfp_text.clone()),
        ])
    }
}

/// Merged output of an analysis.
///
/// Serializes to the task-keyed map on success, `{"error": "..."}` on
/// failure, or the successful fragments plus an `errors` map in partial mode.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateResult {
    Complete(Map<String, Value>),
    Failed { error: String },
    Partial {
        results: Map<String, Value>,
        errors: BTreeMap<String, String>,
    },
}

impl AggregateResult {
    /// True for the single-error object.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The error message of a failed analysis.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// JSON representation returned to callers.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Complete(results) => Value::Object(results.clone()),
            Self::Failed { error } => serde_json::json!({ "error": error }),
            Self::Partial { results, errors } => {
                let mut out = results.clone();
                out.insert(ERRORS_KEY.into(), serde_json::json!(errors));
                Value::Object(out)
            }
        }
    }
}

impl Serialize for AggregateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Options / progress
// ---------------------------------------------------------------------------

/// Orchestrator behaviour. Defaults: sequential, fail-fast, greedy, no timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzerOptions {
    pub mode: ExecutionMode,
    pub failure_policy: FailurePolicy,
    pub extract: ExtractStrategy,
    pub timeout: Option<Duration>,
}

impl AnalyzerOptions {
    fn task_options(&self) -> TaskOptions {
        TaskOptions {
            timeout: self.timeout,
            extract: self.extract,
        }
    }
}

impl From<&AnalysisConfig> for AnalyzerOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            mode: config.mode,
            failure_policy: config.failure_policy,
            extract: config.json_extraction,
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Progress callback for analysis runs.
pub trait AnalysisProgress: Send + Sync {
    /// A task is about to call the generation capability.
    fn task_started(&self, task: &str, current: usize, total: usize);
    /// A task finished, successfully or not.
    fn task_finished(&self, task: &str, success: bool);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl AnalysisProgress for SilentProgress {
    fn task_started(&self, _task: &str, _current: usize, _total: usize) {}
    fn task_finished(&self, _task: &str, _success: bool) {}
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Outcome of one task, tagged with its registry index.
type Outcome = (usize, Result<Value, TaskFailure>);

/// Runs the task registry against a generation capability.
///
/// The generator is injected and its lifecycle belongs to the caller.
pub struct Analyzer<G> {
    generator: Arc<G>,
    registry: Arc<TaskRegistry>,
    options: AnalyzerOptions,
}

impl<G: TextGenerator + 'static> Analyzer<G> {
    /// Analyzer over the built-in registry with default options.
    pub fn new(generator: G) -> Self {
        Self::from_shared(Arc::new(generator))
    }

    /// Analyzer over a generator the caller keeps a handle to.
    pub fn from_shared(generator: Arc<G>) -> Self {
        Self {
            generator,
            registry: Arc::new(TaskRegistry::builtin()),
            options: AnalyzerOptions::default(),
        }
    }

    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_options(mut self, options: AnalyzerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Run every registered task once and merge the results.
    ///
    /// Never returns an `Err`: under [`FailurePolicy::FailFast`] any task
    /// failure discards all fragments and yields `{"error": "<task> analysis
    /// failed: <cause>"}`.
    #[instrument(skip_all, fields(
        analysis_id = %AnalysisId::new(),
        tasks = self.registry.len(),
        mode = ?self.options.mode,
    ))]
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        progress: &dyn AnalysisProgress,
    ) -> AggregateResult {
        let start = Instant::now();
        let variables = request.variables();

        let outcomes = match self.options.mode {
            ExecutionMode::Sequential => self.run_sequential(&variables, progress).await,
            ExecutionMode::Concurrent => self.run_concurrent(variables, progress).await,
        };

        let result = self.aggregate(outcomes);
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            failed = result.is_error(),
            "analysis complete"
        );
        result
    }

    /// Registry order; stops at the first failure under fail-fast.
    async fn run_sequential(
        &self,
        variables: &Variables,
        progress: &dyn AnalysisProgress,
    ) -> Vec<Outcome> {
        let total = self.registry.len();
        let options = self.options.task_options();
        let mut outcomes = Vec::with_capacity(total);

        for (index, spec) in self.registry.iter().enumerate() {
            progress.task_started(&spec.name, index + 1, total);
            let result = run_task(spec, variables, self.generator.as_ref(), &options).await;
            progress.task_finished(&spec.name, result.is_ok());

            let failed = result.is_err();
            outcomes.push((index, result));
            if failed && self.options.failure_policy == FailurePolicy::FailFast {
                break;
            }
        }

        outcomes
    }

    /// Fan out every task. Under fail-fast the first failure aborts the
    /// remaining tasks; failures that had already completed are kept so the
    /// lowest registry index can win.
    async fn run_concurrent(
        &self,
        variables: Variables,
        progress: &dyn AnalysisProgress,
    ) -> Vec<Outcome> {
        let total = self.registry.len();
        let options = self.options.task_options();
        let variables = Arc::new(variables);
        let mut set = JoinSet::new();

        for (index, spec) in self.registry.iter().enumerate() {
            progress.task_started(&spec.name, index + 1, total);
            let generator = Arc::clone(&self.generator);
            let registry = Arc::clone(&self.registry);
            let variables = Arc::clone(&variables);
            set.spawn(
                async move {
                    let spec = &registry.tasks()[index];
                    let result = run_task(spec, &variables, generator.as_ref(), &options).await;
                    (index, result)
                }
                .in_current_span(),
            );
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut aborted = false;

        while let Some(joined) = set.join_next().await {
            let (index, result) = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => match join_error.try_into_panic() {
                    Ok(panic) => std::panic::resume_unwind(panic),
                    // Cancelled by abort_all.
                    Err(_) => continue,
                },
            };

            if aborted {
                // Finished before the abort landed: only failures matter now.
                if result.is_err() {
                    outcomes.push((index, result));
                }
                continue;
            }

            progress.task_finished(&self.registry.tasks()[index].name, result.is_ok());
            let failed = result.is_err();
            outcomes.push((index, result));

            if failed && self.options.failure_policy == FailurePolicy::FailFast {
                set.abort_all();
                aborted = true;
            }
        }

        outcomes
    }

    fn aggregate(&self, mut outcomes: Vec<Outcome>) -> AggregateResult {
        outcomes.sort_by_key(|(index, _)| *index);

        for (_, result) in &outcomes {
            if let Err(failure) = result {
                error!(
                    task = %failure.task,
                    error = %failure.cause,
                    raw = failure.cause.raw_text().unwrap_or_default(),
                    "task failed"
                );
            }
        }

        match self.options.failure_policy {
            FailurePolicy::FailFast => {
                let mut results = Map::new();
                for (index, result) in outcomes {
                    let name = &self.registry.tasks()[index].name;
                    match result {
                        Ok(fragment) => merge_fragment(&mut results, fragment, name),
                        Err(failure) => {
                            return AggregateResult::Failed {
                                error: failure.to_string(),
                            };
                        }
                    }
                }
                AggregateResult::Complete(results)
            }
            FailurePolicy::Partial => {
                let mut results = Map::new();
                let mut errors = BTreeMap::new();
                for (index, result) in outcomes {
                    let name = &self.registry.tasks()[index].name;
                    match result {
                        Ok(fragment) => merge_fragment(&mut results, fragment, name),
                        Err(failure) => {
                            errors.insert(failure.task.clone(), failure.to_string());
                        }
                    }
                }
                if errors.is_empty() {
                    AggregateResult::Complete(results)
                } else {
                    if results.contains_key(ERRORS_KEY) {
                        warn!(
                            key = ERRORS_KEY,
                            "task output is shadowed by the partial error map"
                        );
                    }
                    AggregateResult::Partial { results, errors }
                }
            }
        }
    }
}

/// Run the built-in tasks for one document pair with default options.
pub async fn analyze_documents<G: TextGenerator + 'static>(
    generator: G,
    company_text: &str,
    rfp_text: &str,
) -> AggregateResult {
    Analyzer::new(generator)
        .analyze(&AnalysisRequest::new(company_text, rfp_text), &SilentProgress)
        .await
}

/// Key-union `fragment` into `target`. On a shared key the later fragment
/// wins. A non-object fragment is stored under the task name.
fn merge_fragment(target: &mut Map<String, Value>, fragment: Value, task: &str) {
    match fragment {
        Value::Object(map) => {
            for (key, value) in map {
                if target.contains_key(&key) {
                    warn!(task, %key, "task output overwrites an existing key");
                }
                target.insert(key, value);
            }
        }
        other => {
            warn!(task, "task output is not a JSON object, storing under task name");
            target.insert(task.to_string(), other);
        }
    }
}
