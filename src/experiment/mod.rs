//! Experiment orchestration for pollution-degradation runs.
//!
//! This module expands an experiment plan into scenario cells, runs every
//! (model, cell, iteration) unit through the generator, the model runner,
//! and the classifier, and persists the results.
//!
//! # Experiment Flow
//!
//! 1. **Validation**: the plan's dimensions and runner settings are checked
//! 2. **Pre-flight**: the worst-case rendered prompt is sized against the
//!    endpoint's context window
//! 3. **Cell enumeration**: the Cartesian product of the dimension sets,
//!    with adversarial cells crossed against the configured variants
//! 4. **Seeding**: each (cell, iteration) gets a sub-seed derived from the
//!    master seed, so any execution replays exactly
//! 5. **Execution**: prompt generation → conversation loop → classification
//! 6. **Persistence**: each execution, its tool calls, and its evaluation
//!    are written atomically
//!
//! # Example
//!
//! ```rust,ignore
//! use anchorlab::experiment::{ExperimentOrchestrator, ExperimentPlan};
//!
//! let plan = ExperimentPlan::from_env("pollution-sweep")?
//!     .with_models(vec!["qwen2.5:7b".to_string()])
//!     .with_iterations(10);
//!
//! let orchestrator = ExperimentOrchestrator::new(plan).await?;
//! let summary = orchestrator.run_all().await?;
//!
//! println!(
//!     "experiment {:?}: {} executions across {} cells",
//!     summary.experiment_id, summary.total_executions, summary.cell_count
//! );
//! for ((model, difficulty, pollution), stats) in summary.stats.rows() {
//!     println!(
//!         "{model} {difficulty} p{pollution}: {:.0}% success",
//!         stats.success_rate() * 100.0
//!     );
//! }
//! ```
//!
//! # Dry Runs
//!
//! A plan built with `as_dry_run()` reports how many executions it would
//! perform without touching the model endpoint or the database. Useful for
//! estimating cost and wall-clock time before committing to a sweep.

pub mod config;
pub mod orchestrator;

// Re-export main types for convenience
pub use config::{ExperimentPlan, RunnerSettings, DEFAULT_DATABASE_URL, DEFAULT_MASTER_SEED};
pub use orchestrator::{
    derive_seed, enumerate_cells, CellStats, ExperimentCell, ExperimentOrchestrator,
    ExperimentStats, RunSummary,
};
