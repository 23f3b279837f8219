//! Shared types, error model, and configuration for rfpscope.
//!
//! This crate is the foundation depended on by all other rfpscope crates.
//! It provides:
//! - [`RfpScopeError`]: the unified error type, plus the pipeline taxonomy
//!   ([`AnalysisError`], [`TaskFailure`])
//! - Domain types ([`AnalysisId`], [`ExecutionMode`], [`FailurePolicy`], [`ExtractStrategy`])
//! - Configuration ([`AppConfig`], [`AnalysisConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalysisConfig, AppConfig, OpenRouterConfig, TaskConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{AnalysisError, Result, RfpScopeError, TaskFailure};
pub use types::{AnalysisId, ExecutionMode, ExtractStrategy, FailurePolicy};
