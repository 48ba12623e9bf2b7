//! Tool catalog and canned responses.
//!
//! The registry is the leaf of the experiment: it knows which functions the
//! model may call, their JSON schemas, which one is the correct answer, and
//! what every call returns.

pub mod catalog;
pub mod mocks;

pub use catalog::{ToolRegistry, ToolSpec, TARGET_TOOL};
