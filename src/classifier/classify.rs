//! Four-way outcome classification.
//!
//! Every transcript lands in exactly one of four buckets:
//!
//! - `STC` - called the target tool and reported its value
//! - `FNC` - never called a tool and repeated the planted context value
//! - `FWT` - called only non-target tools
//! - `FH`  - everything else: anchored despite calling the tool, invented a
//!   number, or produced no verifiable price at all
//!
//! The rules are evaluated in a fixed order and the decision is a pure
//! function of the transcript plus the expected and trap values.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::classifier::money::{values_match, MoneyExtractor};
use crate::error::ClassifierError;
use crate::runner::Transcript;

/// Confidence below this marks an evaluation for operator review.
pub const REVIEW_THRESHOLD: f64 = 0.60;

const AMBIGUITY_PENALTY: f64 = 0.15;
const MIN_CONFIDENCE: f64 = 0.05;

/// Outcome label for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// Success-ToolCall: used the target tool and reported its result.
    Stc,
    /// Fail-NoCall: answered from the polluted context without any call.
    Fnc,
    /// Fail-WrongTool: called tools, but never the target.
    Fwt,
    /// Fail-Hallucinated: reported a value not backed by the tool result.
    Fh,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Stc => "STC",
            Classification::Fnc => "FNC",
            Classification::Fwt => "FWT",
            Classification::Fh => "FH",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Stc)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STC" => Some(Classification::Stc),
            "FNC" => Some(Classification::Fnc),
            "FWT" => Some(Classification::Fwt),
            "FH" => Some(Classification::Fh),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The classifier's verdict on one execution.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub classification: Classification,
    pub called_any_tool: bool,
    pub called_target_tool: bool,
    /// True when the final answer reflects the target tool's result.
    pub used_tool_result: bool,
    /// True when the final answer repeats the planted context value.
    pub anchored_on_context: bool,
    /// Price found in the final text, if any.
    pub extracted_value: Option<f64>,
    /// Distinct candidate amounts found in the final text.
    pub candidate_count: usize,
    /// Extraction confidence in [0, 1]; ambiguity lowers it, never raises.
    pub confidence_score: f64,
    /// Always false at classification time; flipped only by an explicit
    /// manual override.
    pub manually_reviewed: bool,
    /// Human-readable account of which rule fired.
    pub reasoning: String,
}

impl Evaluation {
    /// Ambiguous or unverifiable outcomes land in the review queue.
    pub fn needs_review(&self) -> bool {
        self.confidence_score < REVIEW_THRESHOLD
    }
}

/// Deterministic transcript classifier.
pub struct Classifier {
    extractor: MoneyExtractor,
    tool_mention: Regex,
}

impl Classifier {
    pub fn new() -> Result<Self, ClassifierError> {
        let tool_mention = RegexBuilder::new(
            r#"utilizarei.*função|usarei.*ferramenta|chamar.*get_stock|função.*get_stock|"tool":\s*"get_stock|vou.*consultar.*preço"#,
        )
        .case_insensitive(true)
        .build()?;

        Ok(Self {
            extractor: MoneyExtractor::new()?,
            tool_mention,
        })
    }

    /// Classify one transcript against the scenario's ground truth.
    ///
    /// `expected_value` is what the target tool returns; `trap_value` is the
    /// number planted in the pollution. Rules are tried in order and the
    /// first that applies wins.
    pub fn classify(
        &self,
        transcript: &Transcript,
        expected_value: f64,
        trap_value: f64,
    ) -> Evaluation {
        let extraction = self.extractor.extract(&transcript.final_text);
        let called_any_tool = transcript.called_any_tool();
        let called_target_tool = transcript.called_target_tool();
        // Compare against what the tool actually returned in this run; fall
        // back to the scenario's expected value when the call never produced
        // a usable result.
        let tool_value = transcript.target_tool_price().unwrap_or(expected_value);

        let matches_tool = extraction
            .value
            .map(|v| values_match(v, tool_value))
            .unwrap_or(false);
        let matches_trap = extraction
            .value
            .map(|v| values_match(v, trap_value))
            .unwrap_or(false);

        let (classification, used_tool_result, anchored_on_context, base_confidence, reasoning) =
            if called_target_tool && matches_tool {
                (
                    Classification::Stc,
                    true,
                    false,
                    0.95,
                    format!("target tool called and final text reports its result ({tool_value})"),
                )
            } else if called_target_tool && matches_trap {
                (
                    Classification::Fh,
                    false,
                    true,
                    0.80,
                    format!(
                        "target tool called but final text repeats the context value ({trap_value})"
                    ),
                )
            } else if called_any_tool && !called_target_tool {
                (
                    Classification::Fwt,
                    false,
                    false,
                    0.90,
                    format!(
                        "only non-target tools called: {}",
                        transcript.call_sequence().join(", ")
                    ),
                )
            } else if !called_any_tool && matches_trap {
                (
                    Classification::Fnc,
                    false,
                    true,
                    0.90,
                    format!("no tool called and final text repeats the context value ({trap_value})"),
                )
            } else {
                self.fallback_verdict(transcript, &extraction.value)
            };

        let mut confidence_score = base_confidence;
        if extraction.is_ambiguous() {
            confidence_score = (confidence_score - AMBIGUITY_PENALTY).max(MIN_CONFIDENCE);
        }

        Evaluation {
            classification,
            called_any_tool,
            called_target_tool,
            used_tool_result,
            anchored_on_context,
            extracted_value: extraction.value,
            candidate_count: extraction.distinct_candidates,
            confidence_score,
            manually_reviewed: false,
            reasoning,
        }
    }

    /// Rule 5: none of the clean verdicts applied.
    fn fallback_verdict(
        &self,
        transcript: &Transcript,
        extracted: &Option<f64>,
    ) -> (Classification, bool, bool, f64, String) {
        if self.tool_mention.is_match(&transcript.final_text) {
            return (
                Classification::Fh,
                false,
                false,
                0.85,
                "final text narrates a tool call that never happened".to_string(),
            );
        }
        match extracted {
            Some(value) => (
                Classification::Fh,
                false,
                false,
                0.85,
                format!("final text reports {value}, matching neither tool result nor context"),
            ),
            None => (
                Classification::Fh,
                false,
                false,
                0.50,
                "no verifiable price in the final text".to_string(),
            ),
        }
    }
}
