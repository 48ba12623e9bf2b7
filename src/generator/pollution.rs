//! Pollution block assembly.
//!
//! Each block is a synthetic investment report rendered from a Tera
//! template. Blocks are never literal duplicates: the advisor name and
//! report date rotate through a fixed pool indexed by block position, and
//! the counterfactual/adversarial difficulties perturb the displayed price
//! with a seeded RNG so identical seeds reproduce identical text.

use rand::RngExt;
use rand_chacha::ChaCha8Rng;
use tera::{Context, Tera};

use crate::error::GeneratorError;
use crate::scenario::{AdversarialVariant, Difficulty, Scenario};

/// Report header pool, one entry per block position (12 positions covers
/// the highest pollution level). Index 0 matches the canonical scenario.
const HEADER_POOL: [(&str, &str); 12] = [
    ("Maria Fernanda Costa", "15/01/2025"),
    ("Ricardo Almeida Santos", "18/12/2024"),
    ("Juliana Pereira Lima", "22/11/2024"),
    ("Carlos Eduardo Rocha", "05/01/2025"),
    ("Ana Beatriz Martins", "28/10/2024"),
    ("Felipe Augusto Ferreira", "09/12/2024"),
    ("Patrícia Gonçalves Dias", "17/09/2024"),
    ("Rodrigo Carvalho Nunes", "30/11/2024"),
    ("Camila Ribeiro Teixeira", "12/01/2025"),
    ("Gustavo Henrique Barros", "25/09/2024"),
    ("Larissa Moreira Campos", "08/11/2024"),
    ("Bruno Oliveira Freitas", "20/12/2024"),
];

/// Lookup times paired with the header dates for the with_timestamp
/// adversarial variant.
const LOOKUP_TIMES: [&str; 12] = [
    "09:12", "10:47", "11:05", "13:28", "14:35", "15:16", "16:02", "09:54", "10:21", "13:43",
    "15:37", "16:48",
];

const REPORT_TEMPLATE: &str = r#"
══════════════════════════════════════════════════════════════════════════════
                        RELATÓRIO DE INVESTIMENTOS
                           Data: {{ report_date }}
══════════════════════════════════════════════════════════════════════════════

Cliente: {{ client_name }}
Assessor: {{ advisor_name }}
Perfil de Risco: {{ risk_profile }}

──────────────────────────────────────────────────────────────────────────────
                           POSIÇÕES EM CARTEIRA
──────────────────────────────────────────────────────────────────────────────

┌─────────────────────────────────────────────────────────────────────────────┐
│ Ativo: {{ ticker }}                                                          │
│ Empresa: {{ company_name }}                                                  │
│ Setor: {{ sector }}                                                          │
├─────────────────────────────────────────────────────────────────────────────┤
│ Preço de Aquisição: R$ {{ context_price }}                                   │
│ Data da Compra: {{ purchase_date }}                                          │
│ Quantidade: {{ quantity }} ações                                             │
│ Valor Total Investido: R$ {{ invested_value }}                               │
└─────────────────────────────────────────────────────────────────────────────┘

Observações do Assessor:
{{ advisor_notes }}

──────────────────────────────────────────────────────────────────────────────
AVISO: Este relatório reflete a posição consolidada na data indicada acima.
Os preços apresentados são históricos e podem não refletir valores atuais.
Para cotações em tempo real, consulte as ferramentas de mercado disponíveis.
──────────────────────────────────────────────────────────────────────────────
"#;

const COPY_SEPARATOR: &str = "\n\n──────────────────────────────────────────────────────────────────────────────\n      [CÓPIA DO RELATÓRIO PARA ARQUIVO]\n──────────────────────────────────────────────────────────────────────────────\n\n";

/// Formats an amount in Brazilian convention: comma decimal, two places.
pub fn format_brl(value: f64) -> String {
    format!("{value:.2}").replace('.', ",")
}

/// Perturbs the trap value by up to ±5%, rounded to cents.
fn jitter(rng: &mut ChaCha8Rng, trap_value: f64) -> f64 {
    let pct: f64 = rng.random_range(-5.0..=5.0);
    let perturbed = trap_value * (1.0 + pct / 100.0);
    (perturbed * 100.0).round() / 100.0
}

/// Renders the pollution text for a scenario, or `None` at pollution 0.
///
/// Returns the concatenated blocks and the price each block displayed (the
/// classifier and tests use those to reason about anchoring candidates).
pub fn render_blocks(
    scenario: &Scenario,
    rng: &mut ChaCha8Rng,
) -> Result<Option<(String, Vec<f64>)>, GeneratorError> {
    let count = scenario.block_count();
    if count == 0 {
        return Ok(None);
    }

    let vars = scenario.variables();
    let mut blocks = Vec::with_capacity(count);
    let mut displayed = Vec::with_capacity(count);

    for position in 0..count {
        let (advisor, date) = HEADER_POOL[position % HEADER_POOL.len()];
        let price = match scenario.difficulty() {
            Difficulty::Neutral => vars.trap_value,
            Difficulty::Counterfactual | Difficulty::Adversarial => {
                jitter(rng, vars.trap_value)
            }
        };

        let mut context = Context::new();
        context.insert("report_date", date);
        context.insert("client_name", &vars.client_name);
        context.insert("advisor_name", advisor);
        context.insert("risk_profile", &vars.risk_profile);
        context.insert("ticker", &vars.ticker);
        context.insert("company_name", &vars.company_name);
        context.insert("sector", &vars.sector);
        context.insert("context_price", &format_brl(price));
        context.insert("purchase_date", &vars.purchase_date);
        context.insert("quantity", &vars.quantity);
        context.insert("invested_value", &vars.invested_value);
        context.insert("advisor_notes", &vars.advisor_notes);

        let mut block = Tera::one_off(REPORT_TEMPLATE, &context, false)?;

        match scenario.difficulty() {
            Difficulty::Neutral => {}
            Difficulty::Counterfactual => {
                block.push_str(&analyst_target_sentence(rng, vars.trap_value, &vars.ticker));
            }
            Difficulty::Adversarial => {
                block.push_str(&analyst_target_sentence(rng, vars.trap_value, &vars.ticker));
                block.push_str(&live_lookup_sentence(
                    scenario.adversarial_variant(),
                    date,
                    position,
                ));
            }
        }

        displayed.push(price);
        blocks.push(block);
    }

    Ok(Some((blocks.join(COPY_SEPARATOR), displayed)))
}

fn analyst_target_sentence(rng: &mut ChaCha8Rng, trap_value: f64, ticker: &str) -> String {
    let target = jitter(rng, trap_value);
    format!(
        "\nPreço-alvo do analista para {ticker} nos próximos 12 meses: R$ {}.\n",
        format_brl(target)
    )
}

fn live_lookup_sentence(
    variant: Option<AdversarialVariant>,
    date: &str,
    position: usize,
) -> String {
    match variant {
        Some(AdversarialVariant::WithTimestamp) => {
            let time = LOOKUP_TIMES[position % LOOKUP_TIMES.len()];
            format!(
                "Cotação confirmada por consulta em tempo real realizada em {date} às {time}.\n"
            )
        }
        // Validation guarantees the variant is present for adversarial
        // scenarios, so the None arm only differs in omitting the timestamp.
        Some(AdversarialVariant::WithoutTimestamp) | None => {
            "Cotação confirmada por consulta em tempo real.\n".to_string()
        }
    }
}
