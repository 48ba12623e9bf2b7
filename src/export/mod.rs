//! Export module for experiment results.
//!
//! Provides flat CSV export of one experiment's executions and evaluations.

pub mod csv;

pub use csv::{export_experiment, render_csv, HEADERS};
