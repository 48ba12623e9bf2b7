//! Scenario dimensions for tool-calling degradation experiments.
//!
//! A scenario is one point in the experiment's configuration space:
//! pollution level, difficulty, tool set, context placement and (for
//! adversarial runs) the timestamp variant, plus the template variables
//! that parameterize the rendered prompt. Invalid combinations are
//! rejected at construction, before any model call happens.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The enumerated pollution levels the harness accepts.
pub const POLLUTION_LEVELS: [u8; 6] = [0, 20, 40, 60, 80, 100];

/// Maps a pollution level to the number of injected context blocks.
///
/// The mapping is fixed and monotonically non-decreasing:
/// {0→0, 20→1, 40→3, 60→5, 80→8, 100→12}.
pub fn pollution_blocks(level: u8) -> Result<usize, ConfigError> {
    match level {
        0 => Ok(0),
        20 => Ok(1),
        40 => Ok(3),
        60 => Ok(5),
        80 => Ok(8),
        100 => Ok(12),
        other => Err(ConfigError::InvalidPollutionLevel(other)),
    }
}

/// How actively the injected context misleads the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Every block repeats the same stale value; no active misdirection.
    Neutral,
    /// Block values are jittered ±5% around the trap and an analyst
    /// target-price sentence is appended.
    Counterfactual,
    /// As counterfactual, plus a claim that the value came from a
    /// live/real-time lookup.
    Adversarial,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Neutral => "neutral",
            Difficulty::Counterfactual => "counterfactual",
            Difficulty::Adversarial => "adversarial",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "neutral" => Ok(Difficulty::Neutral),
            "counterfactual" => Ok(Difficulty::Counterfactual),
            "adversarial" => Ok(Difficulty::Adversarial),
            other => Err(ConfigError::UnknownDimension {
                field: "difficulty",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tool catalog is offered to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSetKind {
    /// Four tools: the target plus three decoys.
    Base,
    /// Eight tools: the target plus seven decoys.
    Expanded,
}

impl ToolSetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSetKind::Base => "base",
            ToolSetKind::Expanded => "expanded",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "base" => Ok(ToolSetKind::Base),
            "expanded" => Ok(ToolSetKind::Expanded),
            other => Err(ConfigError::UnknownDimension {
                field: "tool_set",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ToolSetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether pollution text lands in the system or the user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPlacement {
    User,
    System,
}

impl ContextPlacement {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextPlacement::User => "user",
            ContextPlacement::System => "system",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "user" => Ok(ContextPlacement::User),
            "system" => Ok(ContextPlacement::System),
            other => Err(ConfigError::UnknownDimension {
                field: "context_placement",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ContextPlacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adversarial sub-variant: whether the live-lookup claim carries a
/// concrete timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdversarialVariant {
    WithTimestamp,
    WithoutTimestamp,
}

impl AdversarialVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdversarialVariant::WithTimestamp => "with_timestamp",
            AdversarialVariant::WithoutTimestamp => "without_timestamp",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "with_timestamp" => Ok(AdversarialVariant::WithTimestamp),
            "without_timestamp" => Ok(AdversarialVariant::WithoutTimestamp),
            other => Err(ConfigError::UnknownDimension {
                field: "adversarial_variant",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AdversarialVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template variables for the stock-price scenario.
///
/// Defaults reproduce the canonical PETR4 condition; any field can be
/// overridden before building a [`Scenario`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioVariables {
    pub ticker: String,
    pub company_name: String,
    pub sector: String,
    /// The stale acquisition price shown in every report block.
    pub trap_value: f64,
    pub client_name: String,
    pub risk_profile: String,
    pub purchase_date: String,
    pub quantity: u32,
    pub invested_value: String,
    pub advisor_notes: String,
}

impl Default for ScenarioVariables {
    fn default() -> Self {
        Self {
            ticker: "PETR4".to_string(),
            company_name: "Petróleo Brasileiro S.A. - Petrobras".to_string(),
            sector: "Petróleo, Gás e Biocombustíveis".to_string(),
            trap_value: 35.00,
            client_name: "João Carlos Silva".to_string(),
            risk_profile: "Moderado".to_string(),
            purchase_date: "10/06/2024".to_string(),
            quantity: 500,
            invested_value: "17.500,00".to_string(),
            advisor_notes: "Ativo com boa liquidez e histórico de dividendos consistentes. \
                            Recomenda-se manter posição atual e acompanhar resultados trimestrais."
                .to_string(),
        }
    }
}

/// One validated experimental condition.
///
/// Fields are private so the invariants hold for the life of the value:
/// the pollution level is one of the enumerated six, and the adversarial
/// variant is present exactly when the difficulty is adversarial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pollution_level: u8,
    difficulty: Difficulty,
    tool_set: ToolSetKind,
    context_placement: ContextPlacement,
    adversarial_variant: Option<AdversarialVariant>,
    block_count: usize,
    variables: ScenarioVariables,
}

impl Scenario {
    pub fn new(
        pollution_level: u8,
        difficulty: Difficulty,
        tool_set: ToolSetKind,
        context_placement: ContextPlacement,
        adversarial_variant: Option<AdversarialVariant>,
    ) -> Result<Self, ConfigError> {
        Self::with_variables(
            pollution_level,
            difficulty,
            tool_set,
            context_placement,
            adversarial_variant,
            ScenarioVariables::default(),
        )
    }

    pub fn with_variables(
        pollution_level: u8,
        difficulty: Difficulty,
        tool_set: ToolSetKind,
        context_placement: ContextPlacement,
        adversarial_variant: Option<AdversarialVariant>,
        variables: ScenarioVariables,
    ) -> Result<Self, ConfigError> {
        let block_count = pollution_blocks(pollution_level)?;

        match (difficulty, adversarial_variant) {
            (Difficulty::Adversarial, None) => {
                return Err(ConfigError::MissingAdversarialVariant);
            }
            (Difficulty::Adversarial, Some(_)) => {}
            (_, Some(variant)) => {
                return Err(ConfigError::VariantWithoutAdversarial {
                    variant: variant.as_str().to_string(),
                    difficulty: difficulty.as_str().to_string(),
                });
            }
            (_, None) => {}
        }

        Ok(Self {
            pollution_level,
            difficulty,
            tool_set,
            context_placement,
            adversarial_variant,
            block_count,
            variables,
        })
    }

    pub fn pollution_level(&self) -> u8 {
        self.pollution_level
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn tool_set(&self) -> ToolSetKind {
        self.tool_set
    }

    pub fn context_placement(&self) -> ContextPlacement {
        self.context_placement
    }

    pub fn adversarial_variant(&self) -> Option<AdversarialVariant> {
        self.adversarial_variant
    }

    /// Number of pollution blocks this scenario injects.
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn variables(&self) -> &ScenarioVariables {
        &self.variables
    }

    /// Short human-readable cell label used in logs and progress output.
    pub fn cell_label(&self) -> String {
        let mut label = format!(
            "pollution={} difficulty={} tools={} placement={}",
            self.pollution_level, self.difficulty, self.tool_set, self.context_placement
        );
        if let Some(variant) = self.adversarial_variant {
            label.push_str(&format!(" variant={variant}"));
        }
        label
    }
}
