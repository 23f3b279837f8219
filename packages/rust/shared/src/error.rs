//! Error types for rfpscope.
//!
//! Library crates use [`RfpScopeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Pipeline failures have their own taxonomy: [`AnalysisError`] describes what
//! went wrong at a single stage, and [`TaskFailure`] tags it with the task that
//! was running.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all rfpscope operations.
#[derive(Debug, thiserror::Error)]
pub enum RfpScopeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the generation provider.
    #[error("network error: {0}")]
    Network(String),

    /// A task of the analysis pipeline failed.
    #[error(transparent)]
    Analysis(#[from] TaskFailure),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (duplicate task name, bad template, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RfpScopeError>;

impl RfpScopeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Failure of one stage of a task: render, generate, or extract.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// A template placeholder had no value in the variable mapping.
    #[error("missing template variable `{name}`")]
    MissingVariable { name: String },

    /// The generation capability reported an error (network, auth, quota, provider).
    #[error("generation failed: {message}")]
    Generation { message: String },

    /// The generation call did not finish within the configured timeout.
    #[error("generation timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },

    /// The model response contained no `{ ... }` region.
    #[error("no JSON found in response")]
    NoJsonFound,

    /// A `{ ... }` region was found but did not parse.
    #[error("JSON parsing failed: {reason}\nRaw text: {raw}")]
    MalformedJson { reason: String, raw: String },
}

impl AnalysisError {
    /// Create a generation error from any displayable message.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
        }
    }

    /// Raw model text carried by the error, if any.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::MalformedJson { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// An [`AnalysisError`] tagged with the task it came from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{task} analysis failed: {cause}")]
pub struct TaskFailure {
    /// Name of the originating task.
    pub task: String,
    /// What went wrong.
    #[source]
    pub cause: AnalysisError,
}

impl TaskFailure {
    pub fn new(task: impl Into<String>, cause: AnalysisError) -> Self {
        Self {
            task: task.into(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RfpScopeError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = RfpScopeError::validation("duplicate task name `risk`");
        assert!(err.to_string().contains("duplicate task name"));
    }

    #[test]
    fn task_failure_names_the_task() {
        let failure = TaskFailure::new(
            "compliance",
            AnalysisError::MissingVariable {
                name: "company_data".into(),
            },
        );
        assert_eq!(
            failure.to_string(),
            "compliance analysis failed: missing template variable `company_data`"
        );
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        let err = AnalysisError::MalformedJson {
            reason: "expected value at line 1 column 2".into(),
            raw: "{not valid json}".into(),
        };
        assert_eq!(err.raw_text(), Some("{not valid json}"));
        assert!(err.to_string().contains("Raw text: {not valid json}"));
    }

    #[test]
    fn timeout_display() {
        let err = AnalysisError::Timeout {
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "generation timed out after 30s");
    }

    #[test]
    fn analysis_error_converts_into_top_level() {
        let err: RfpScopeError = TaskFailure::new("risk", AnalysisError::NoJsonFound).into();
        assert_eq!(err.to_string(), "risk analysis failed: no JSON found in response");
    }
}
