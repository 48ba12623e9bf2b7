//! Static tool catalog offered to the model.
//!
//! Eight functions in a fixed order; the base set is the first four, the
//! expanded set is all eight. `get_stock_price` is the target tool in the
//! stock-price scenario, every other entry is a decoy. Definitions follow
//! the OpenAI function-calling schema shape.

use serde_json::{json, Value};

use crate::scenario::ToolSetKind;

use super::mocks;

/// The tool that correctly answers the stock-price question.
pub const TARGET_TOOL: &str = "get_stock_price";

/// One catalog entry: definition plus a representative canned result.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
    pub is_target: bool,
    pub mock_result: Value,
}

impl ToolSpec {
    fn new(name: &'static str, description: &'static str, parameters: Value) -> Self {
        Self {
            name,
            description,
            parameters,
            is_target: name == TARGET_TOOL,
            mock_result: mocks::sample_response(name),
        }
    }

    /// Renders the entry in the `tools` array shape the endpoint expects.
    pub fn to_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// The active tool catalog for one scenario.
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Builds the registry for the requested set (base = 4, expanded = 8).
    pub fn for_set(kind: ToolSetKind) -> Self {
        let mut specs = base_tools();
        if kind == ToolSetKind::Expanded {
            specs.extend(expanded_tools());
        }
        Self { specs }
    }

    /// All eight definitions, regardless of set. Used when seeding the
    /// `tools` table.
    pub fn full_catalog() -> Vec<ToolSpec> {
        let mut specs = base_tools();
        specs.extend(expanded_tools());
        specs
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.get(name).map(|spec| spec.is_target).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The `tools` array sent with every chat request.
    pub fn schemas(&self) -> Vec<Value> {
        self.specs.iter().map(ToolSpec::to_schema).collect()
    }

    /// Executes a call against the canned responses.
    ///
    /// Unknown names produce `None`; the runner records those as calls with
    /// `execution_success=false`.
    pub fn execute(&self, name: &str, arguments: &Value) -> Option<Value> {
        if !self.contains(name) {
            return None;
        }
        mocks::respond(name, arguments)
    }
}

fn base_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "get_stock_price",
            "Obtém o preço atual de uma ação pelo seu ticker/símbolo. Use esta ferramenta para consultar cotações em tempo real.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "O símbolo/ticker da ação (ex: PETR4, VALE3, AAPL)",
                    }
                },
                "required": ["ticker"],
            }),
        ),
        ToolSpec::new(
            "get_company_profile",
            "Obtém informações detalhadas sobre uma empresa (setor, descrição, data de fundação, número de funcionários).",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "O símbolo/ticker da ação",
                    }
                },
                "required": ["ticker"],
            }),
        ),
        ToolSpec::new(
            "get_portfolio_positions",
            "Lista todas as posições de um cliente em sua carteira de investimentos.",
            json!({
                "type": "object",
                "properties": {
                    "client_id": {
                        "type": "string",
                        "description": "O identificador único do cliente",
                    }
                },
                "required": ["client_id"],
            }),
        ),
        ToolSpec::new(
            "get_fx_rate",
            "Obtém a taxa de câmbio atual entre duas moedas.",
            json!({
                "type": "object",
                "properties": {
                    "from_currency": {
                        "type": "string",
                        "description": "Moeda de origem (ex: USD, EUR, BRL)",
                    },
                    "to_currency": {
                        "type": "string",
                        "description": "Moeda de destino (ex: USD, EUR, BRL)",
                    },
                },
                "required": ["from_currency", "to_currency"],
            }),
        ),
    ]
}

fn expanded_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "get_stock_dividend_history",
            "Obtém o histórico de dividendos pagos por uma ação.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "O símbolo/ticker da ação",
                    }
                },
                "required": ["ticker"],
            }),
        ),
        ToolSpec::new(
            "get_analyst_rating",
            "Obtém a recomendação e nota dos analistas para uma ação.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "O símbolo/ticker da ação",
                    }
                },
                "required": ["ticker"],
            }),
        ),
        ToolSpec::new(
            "get_market_news",
            "Busca as últimas notícias do mercado sobre uma ação.",
            json!({
                "type": "object",
                "properties": {
                    "ticker": {
                        "type": "string",
                        "description": "O símbolo/ticker da ação",
                    }
                },
                "required": ["ticker"],
            }),
        ),
        ToolSpec::new(
            "get_current_datetime",
            "Retorna a data e hora atuais do sistema.",
            json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_set_has_four_tools_with_target() {
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        assert_eq!(registry.len(), 4);
        assert!(registry.is_target(TARGET_TOOL));
        assert!(!registry.is_target("get_fx_rate"));
    }

    #[test]
    fn test_expanded_set_has_eight_tools() {
        let registry = ToolRegistry::for_set(ToolSetKind::Expanded);
        assert_eq!(registry.len(), 8);
        assert!(registry.contains("get_current_datetime"));
        // Target is present in both sets.
        assert!(registry.contains(TARGET_TOOL));
    }

    #[test]
    fn test_exactly_one_target_in_catalog() {
        let targets = ToolRegistry::full_catalog()
            .iter()
            .filter(|spec| spec.is_target)
            .count();
        assert_eq!(targets, 1);
    }

    #[test]
    fn test_schema_shape() {
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 4);
        for schema in &schemas {
            assert_eq!(schema["type"], "function");
            assert!(schema["function"]["name"].is_string());
            assert!(schema["function"]["parameters"]["type"].is_string());
        }
    }

    #[test]
    fn test_execute_dispatches_to_mocks() {
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        let result = registry
            .execute(TARGET_TOOL, &json!({"ticker": "PETR4"}))
            .unwrap();
        assert_eq!(result["price"], json!(38.50));
    }

    #[test]
    fn test_execute_unknown_tool_is_none() {
        let registry = ToolRegistry::for_set(ToolSetKind::Base);
        assert!(registry.execute("get_weather", &json!({})).is_none());
        // Tools outside the active set are unknown too.
        assert!(registry
            .execute("get_analyst_rating", &json!({"ticker": "PETR4"}))
            .is_none());
    }

    #[test]
    fn test_mock_result_sample_present() {
        for spec in ToolRegistry::full_catalog() {
            assert!(!spec.mock_result.is_null(), "{} has no sample", spec.name);
        }
    }
}
