//! anchorlab: measure how context pollution degrades LLM tool calling.
//!
//! This library generates deterministic stock-price prompts with a tunable
//! amount of stale "polluted" context, runs them against OpenAI-compatible
//! endpoints with mock tools, and classifies every answer as STC, FNC, FWT,
//! or FH.

// Core modules
pub mod classifier;
pub mod cli;
pub mod error;
pub mod experiment;
pub mod export;
pub mod generator;
pub mod runner;
pub mod scenario;
pub mod storage;
pub mod tools;

// Re-export commonly used error types
pub use error::{
    ClassifierError, ConfigError, ExperimentError, ExportError, GeneratorError, RunnerError,
    StorageError,
};
