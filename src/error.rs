//! Error types for anchorlab operations.
//!
//! Defines error types for all major subsystems:
//! - Scenario and experiment configuration
//! - Prompt generation and templating
//! - Model endpoint interaction and the tool-call loop
//! - Response classification
//! - Experiment persistence
//! - Result export

use thiserror::Error;

/// Errors raised while validating scenario dimensions or runner settings.
///
/// Configuration errors are rejected before any model call is made and are
/// fatal to the cell (or command) that produced them, never to the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid pollution level {0}: must be one of 0, 20, 40, 60, 80, 100")]
    InvalidPollutionLevel(u8),

    #[error("Adversarial variant '{variant}' requires difficulty 'adversarial', got '{difficulty}'")]
    VariantWithoutAdversarial { variant: String, difficulty: String },

    #[error("Difficulty 'adversarial' requires an adversarial variant")]
    MissingAdversarialVariant,

    #[error("Unknown {field} '{value}'")]
    UnknownDimension { field: &'static str, value: String },

    #[error("Worst-case prompt needs ~{required} tokens but the context window is {configured}")]
    ContextWindowExceeded { required: usize, configured: usize },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Environment variable {name} is invalid: {reason}")]
    InvalidEnvValue { name: &'static str, reason: String },
}

/// Errors that can occur during prompt generation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Tera template rendering error: {0}")]
    Tera(#[from] tera::Error),

    #[error("Template variable '{0}' is missing")]
    MissingVariable(String),

    #[error("Trap value '{0}' is not a parsable amount")]
    InvalidTrapValue(String),
}

/// Errors that can occur while talking to the model endpoint.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Transport failure after {attempts} attempt(s): {message}")]
    Transport { attempts: u32, message: String },

    #[error("Failed to parse model response: {0}")]
    ParseError(String),

    #[error("Model endpoint returned an empty choice list")]
    EmptyResponse,

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while preparing the classifier.
///
/// Classification itself is total; only building the extraction machinery
/// (regex compilation) can fail.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// Errors that can occur during persistence operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration '{name}' failed: {reason}")]
    MigrationFailed { name: String, reason: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while orchestrating an experiment.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Prompt generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Classifier setup failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Persistence failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Experiment has no runnable cells")]
    EmptyPlan,
}

/// Errors that can occur during result export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No executions found for experiment {0}")]
    NothingToExport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
