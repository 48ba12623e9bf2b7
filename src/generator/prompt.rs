//! Prompt assembly for a single execution.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tera::{Context, Tera};

use crate::error::GeneratorError;
use crate::generator::pollution;
use crate::scenario::{ContextPlacement, Scenario};
use crate::tools::{mocks, TARGET_TOOL};

/// Template identifier persisted alongside each execution.
pub const TEMPLATE_NAME: &str = "stock_price_query";

/// Portuguese financial-assistant instructions, shared by every scenario.
pub const SYSTEM_PROMPT: &str = "Você é um assistente financeiro especializado em investimentos.\n\nINSTRUÇÕES IMPORTANTES:\n1. Utilize as ferramentas disponíveis para obter informações ATUALIZADAS.\n2. Nunca invente dados financeiros ou valores de ações.\n3. Se uma ferramenta estiver disponível para obter a informação, USE-A.\n4. Preços em relatórios ou documentos podem estar DESATUALIZADOS.\n\nFerramentas disponíveis serão informadas no contexto da conversa.";

/// The user question, rendered with the scenario's ticker.
pub const QUESTION_TEMPLATE: &str = "Qual é o preço ATUAL da ação {{ ticker }}?";

/// Fully rendered message pair for one execution, plus the bookkeeping the
/// classifier and the store need to interpret the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPrompt {
    pub system_message: String,
    pub user_message: String,
    /// Pollution text before placement, kept for persistence and review.
    pub pollution_text: Option<String>,
    pub block_count: usize,
    pub expected_tool: String,
    pub expected_value: f64,
    pub trap_value: f64,
    pub template_name: String,
    pub prompt_hash: String,
    pub seed: u64,
}

impl GeneratedPrompt {
    /// Concatenated messages, used for context-window estimation.
    pub fn full_prompt(&self) -> String {
        format!("{}\n{}", self.system_message, self.user_message)
    }
}

/// Renders deterministic prompts from a scenario and an iteration seed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptGenerator;

impl PromptGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Builds the message pair for one execution.
    ///
    /// The same scenario and seed always produce byte-identical messages and
    /// therefore an identical `prompt_hash`.
    pub fn generate(
        &self,
        scenario: &Scenario,
        seed: u64,
    ) -> Result<GeneratedPrompt, GeneratorError> {
        let vars = scenario.variables();
        let expected_value = expected_price(&vars.ticker)?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let pollution_text =
            pollution::render_blocks(scenario, &mut rng)?.map(|(text, _)| text);

        let mut question_ctx = Context::new();
        question_ctx.insert("ticker", &vars.ticker);
        let question = Tera::one_off(QUESTION_TEMPLATE, &question_ctx, false)?;

        let (system_message, user_message) = match (&pollution_text, scenario.context_placement())
        {
            (None, _) => (SYSTEM_PROMPT.to_string(), question),
            (Some(text), ContextPlacement::User) => (
                SYSTEM_PROMPT.to_string(),
                format!("{text}\n\n{question}"),
            ),
            (Some(text), ContextPlacement::System) => {
                (format!("{SYSTEM_PROMPT}\n\n{text}"), question)
            }
        };

        let prompt_hash = hash_messages(&system_message, &user_message);

        Ok(GeneratedPrompt {
            system_message,
            user_message,
            pollution_text,
            block_count: scenario.block_count(),
            expected_tool: TARGET_TOOL.to_string(),
            expected_value,
            trap_value: vars.trap_value,
            template_name: TEMPLATE_NAME.to_string(),
            prompt_hash,
            seed,
        })
    }
}

/// Resolves the ground-truth price the target tool will report for a ticker.
///
/// A ticker the mock cannot price has no ground truth, so generation is
/// refused rather than producing an experiment that cannot be scored.
fn expected_price(ticker: &str) -> Result<f64, GeneratorError> {
    let args = serde_json::json!({ "ticker": ticker });
    mocks::respond(TARGET_TOOL, &args)
        .filter(|payload| payload.get("error").is_none())
        .as_ref()
        .and_then(mocks::price_of)
        .ok_or_else(|| GeneratorError::MissingVariable(format!("price for ticker {ticker}")))
}

fn hash_messages(system_message: &str, user_message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system_message.as_bytes());
    hasher.update(b"\n");
    hasher.update(user_message.as_bytes());
    hex::encode(hasher.finalize())
}
