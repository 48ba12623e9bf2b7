//! Response classification.
//!
//! Pure, deterministic scoring of transcripts into the four outcome labels.
//! No network, no retries: the same transcript and ground truth always
//! produce the same [`Evaluation`]. Ambiguity is surfaced as low confidence
//! rather than guessed away.

pub mod classify;
pub mod money;

pub use classify::{Classification, Classifier, Evaluation, REVIEW_THRESHOLD};
pub use money::{normalize_amount, values_match, MoneyExtraction, MoneyExtractor};
