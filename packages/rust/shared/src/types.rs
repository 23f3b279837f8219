//! Core domain types shared across rfpscope crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AnalysisId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one analysis request (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub Uuid);

impl AnalysisId {
    /// Generate a new time-sortable analysis identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AnalysisId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Pipeline knobs
// ---------------------------------------------------------------------------

/// How the orchestrator schedules the registered tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// One task after another, in registry order.
    #[default]
    Sequential,
    /// All tasks fanned out at once.
    Concurrent,
}

/// What the orchestrator returns when a task fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Discard everything and return a single `{"error": ...}` object.
    #[default]
    FailFast,
    /// Keep the successful fragments and report failures under `errors`.
    Partial,
}

/// How the JSON region is located inside a model response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractStrategy {
    /// Leftmost `{` to rightmost `}`.
    #[default]
    Greedy,
    /// Leftmost `{` to the `}` that closes it, skipping braces inside strings.
    Balanced,
}
