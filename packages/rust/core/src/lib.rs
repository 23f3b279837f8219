//! Document-analysis pipeline for rfpscope.
//!
//! Each analysis task is a [`task::TaskSpec`]: a prompt contract plus the JSON
//! shape the model must answer with. The pipeline renders the prompt, calls an
//! injected [`generation::TextGenerator`], normalizes the response to text,
//! extracts the JSON object, and merges every task's fragment into one
//! [`pipeline::AggregateResult`].

pub mod extract;
pub mod generation;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod runner;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use generation::{ChatCompletion, RawGenerationOutput, TextGenerator};
pub use pipeline::{
    AggregateResult, AnalysisProgress, AnalysisRequest, Analyzer, AnalyzerOptions, SilentProgress,
    analyze_documents,
};
pub use prompt::{RenderedPrompt, Variables};
pub use task::{PromptTemplate, TaskRegistry, TaskSpec};
