//! Deterministic prompt generation.
//!
//! This module turns a scenario plus an iteration seed into the exact message
//! pair sent to the model:
//!
//! 1. **Pollution assembly** - Rendering the configured number of report
//!    blocks with rotated headers and seeded value perturbation
//! 2. **Prompt assembly** - Placing the pollution into the system or user
//!    message and hashing the rendered pair
//!
//! Everything downstream of the seed is reproducible, down to the prompt
//! hash, so any execution can be regenerated byte for byte.

pub mod pollution;
pub mod prompt;

pub use pollution::format_brl;
pub use prompt::{GeneratedPrompt, PromptGenerator, TEMPLATE_NAME};
