//! Command-line interface for anchorlab.
//!
//! Provides commands for running pollution experiments, inspecting results,
//! exporting CSV, and database maintenance.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
