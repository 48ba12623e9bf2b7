//! Canned tool responses for the controlled experiment.
//!
//! Every tool the model can call is answered from this table, so runs are
//! reproducible and no market data service is involved. Ticker-keyed tools
//! fall back to an error payload for unknown tickers; that still counts as
//! a successful execution (the tool ran and returned something).

use serde_json::{json, Value};

/// Returns the canned response for a tool call, or `None` when the tool
/// name is not part of the catalog (the caller records those as failed
/// executions).
pub fn respond(tool_name: &str, arguments: &Value) -> Option<Value> {
    match tool_name {
        "get_stock_price" => Some(stock_price(&ticker_arg(arguments))),
        "get_company_profile" => Some(company_profile(&ticker_arg(arguments))),
        "get_portfolio_positions" => Some(json!({"error": "Cliente não encontrado"})),
        "get_fx_rate" => Some(fx_rate(arguments)),
        "get_stock_dividend_history" => Some(dividend_history(&ticker_arg(arguments))),
        "get_analyst_rating" => Some(analyst_rating(&ticker_arg(arguments))),
        "get_market_news" => Some(market_news(&ticker_arg(arguments))),
        "get_current_datetime" => Some(json!({
            "datetime": "2025-02-04T14:35:00-03:00",
            "timezone": "America/Sao_Paulo",
        })),
        _ => None,
    }
}

/// Representative payload per tool, used when seeding the `tools` table.
pub fn sample_response(tool_name: &str) -> Value {
    let petr4 = json!({"ticker": "PETR4"});
    let usd_brl = json!({"from_currency": "USD", "to_currency": "BRL"});
    match tool_name {
        "get_fx_rate" => respond(tool_name, &usd_brl),
        _ => respond(tool_name, &petr4),
    }
    .unwrap_or_else(|| json!({"error": format!("Tool '{tool_name}' não encontrada")}))
}

fn ticker_arg(arguments: &Value) -> String {
    arguments
        .get("ticker")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_uppercase()
}

fn stock_price(ticker: &str) -> Value {
    match ticker {
        "PETR4" => json!({"ticker": "PETR4", "price": 38.50, "currency": "BRL", "change": "+1.2%"}),
        "VALE3" => json!({"ticker": "VALE3", "price": 67.80, "currency": "BRL", "change": "-0.5%"}),
        "AAPL" => json!({"ticker": "AAPL", "price": 185.50, "currency": "USD", "change": "+0.8%"}),
        _ => json!({"ticker": "UNKNOWN", "price": 0.0, "currency": "BRL", "error": "Ticker não encontrado"}),
    }
}

fn company_profile(ticker: &str) -> Value {
    match ticker {
        "PETR4" => json!({
            "ticker": "PETR4",
            "name": "Petróleo Brasileiro S.A. - Petrobras",
            "sector": "Petróleo, Gás e Biocombustíveis",
            "founded": "1953",
        }),
        _ => json!({"error": "Empresa não encontrada"}),
    }
}

fn fx_rate(arguments: &Value) -> Value {
    let from = arguments
        .get("from_currency")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_uppercase();
    let to = arguments
        .get("to_currency")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_uppercase();
    match format!("{from}/{to}").as_str() {
        "USD/BRL" => json!({"pair": "USD/BRL", "rate": 4.95, "timestamp": "2025-01-29T10:00:00Z"}),
        "EUR/BRL" => json!({"pair": "EUR/BRL", "rate": 5.35, "timestamp": "2025-01-29T10:00:00Z"}),
        _ => json!({"error": "Par de moedas não suportado"}),
    }
}

fn dividend_history(ticker: &str) -> Value {
    match ticker {
        "PETR4" => json!({
            "ticker": "PETR4",
            "dividends": [
                {"date": "2024-12-15", "type": "JCP", "value_per_share": 1.25},
                {"date": "2024-08-20", "type": "Dividendo", "value_per_share": 0.85},
                {"date": "2024-05-10", "type": "JCP", "value_per_share": 1.10},
            ],
        }),
        _ => json!({"error": "Ticker não encontrado"}),
    }
}

fn analyst_rating(ticker: &str) -> Value {
    match ticker {
        "PETR4" => json!({
            "ticker": "PETR4",
            "consensus": "Compra",
            "target_price": 42.00,
            "total_analysts": 12,
            "buy": 8,
            "hold": 3,
            "sell": 1,
        }),
        _ => json!({"error": "Ticker não encontrado"}),
    }
}

fn market_news(ticker: &str) -> Value {
    match ticker {
        "PETR4" => json!({
            "ticker": "PETR4",
            "news": [
                {"title": "Petrobras anuncia novo plano de investimentos", "date": "2025-02-03", "source": "InfoMoney"},
                {"title": "Produção de petróleo atinge recorde no 4T24", "date": "2025-01-28", "source": "Valor Econômico"},
            ],
        }),
        _ => json!({"error": "Ticker não encontrado"}),
    }
}

/// Extracts the numeric price a stock-price payload carries, if any.
///
/// The classifier compares the final answer against this value for the
/// target tool.
pub fn price_of(payload: &Value) -> Option<f64> {
    payload.get("price").and_then(Value::as_f64)
}
