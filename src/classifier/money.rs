//! Currency extraction from model answers.
//!
//! Answers arrive in Brazilian notation ("R$ 38,50"), banking notation
//! ("38.50 BRL"), prose ("o preço é 38,50 reais"), or markdown. The
//! extractor tries a fixed list of notation patterns in priority order and
//! takes the first match, so a value next to a currency marker always beats
//! a bare number further along in the text.

use regex::{Regex, RegexBuilder};

use crate::error::ClassifierError;

/// Amount capture: plain ("38,50", "38.50") or thousands-dotted ("1.234,56").
const AMOUNT: &str = r"((?:\d{1,3}(?:\.\d{3})+|\d+)[.,]\d{2})";

/// Result of scanning one final answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoneyExtraction {
    /// Value of the highest-priority match, if any pattern matched.
    pub value: Option<f64>,
    /// Distinct numeric values seen across all patterns. More than one
    /// means the answer was ambiguous about which number is the price.
    pub distinct_candidates: usize,
}

impl MoneyExtraction {
    pub fn is_ambiguous(&self) -> bool {
        self.distinct_candidates > 1
    }
}

/// Compiled notation patterns, in priority order.
pub struct MoneyExtractor {
    patterns: Vec<Regex>,
}

impl MoneyExtractor {
    pub fn new() -> Result<Self, ClassifierError> {
        let sources = [
            format!(r"R\$\s*{AMOUNT}"),
            format!(r"{AMOUNT}\s*(?:reais|BRL)"),
            format!(r"(?:preço|cotação|valor|price)[^0-9]*{AMOUNT}"),
            format!(r"{AMOUNT}\s*\((?:BRL|R\$)\)"),
            format!(r"\*\*R\$\s*{AMOUNT}\*\*"),
        ];

        let mut patterns = Vec::with_capacity(sources.len());
        for source in &sources {
            let pattern = RegexBuilder::new(source).case_insensitive(true).build()?;
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    /// Scan `text` for currency amounts.
    ///
    /// The primary value comes from the first pattern that matches anywhere
    /// in the text (leftmost match of that pattern). The candidate count
    /// considers every match of every pattern, deduplicated by value.
    pub fn extract(&self, text: &str) -> MoneyExtraction {
        let mut value = None;
        for pattern in &self.patterns {
            if let Some(captures) = pattern.captures(text) {
                if let Some(parsed) = captures.get(1).and_then(|m| normalize_amount(m.as_str())) {
                    value = Some(parsed);
                    break;
                }
            }
        }

        let mut candidates: Vec<f64> = Vec::new();
        for pattern in &self.patterns {
            for captures in pattern.captures_iter(text) {
                if let Some(parsed) = captures.get(1).and_then(|m| normalize_amount(m.as_str())) {
                    if !candidates.iter().any(|seen| values_match(*seen, parsed)) {
                        candidates.push(parsed);
                    }
                }
            }
        }

        MoneyExtraction {
            value,
            distinct_candidates: candidates.len(),
        }
    }
}

/// Parse a captured amount into a canonical value.
///
/// Accepts comma-decimal ("38,50"), dot-decimal ("38.50"), and
/// thousands-dot with comma-decimal ("1.234,56").
pub fn normalize_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != 'R' && *c != '$')
        .collect();
    let cleaned = cleaned.replace(',', ".");

    let parts: Vec<&str> = cleaned.split('.').collect();
    let canonical = if parts.len() > 2 {
        let (last, leading) = parts.split_last()?;
        format!("{}.{}", leading.concat(), last)
    } else {
        cleaned
    };

    canonical.parse::<f64>().ok()
}

/// Two amounts are the same price within 0.01 currency units.
pub fn values_match(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.01
}
