//! Service Kit - Agent Tools
//!
//! Tools that implement `swap_agent_core::Tool` for the Soroswap assistant.

mod calculator;
mod market;
mod swap;
mod weather;

pub use calculator::CalculatorTool;
pub use market::{GetContractAddressesTool, GetPoolsTool, GetProtocolsTool, GetTokenPriceTool, GetTokensTool};
pub use swap::{ExecuteSwapTool, GetQuoteTool, GetSwapHistoryTool, GetSwapStatusTool, SendTransactionTool};
pub use weather::WeatherTool;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value, json};
use swap_agent_core::{AgentError, Result as CoreResult, ToolInput, ToolOutput};

/// `{"success": true, "<key>": <payload>}`
pub(crate) fn success(key: &str, payload: &impl Serialize) -> CoreResult<ToolOutput> {
    let mut body = json!({ "success": true });
    body[key] = serde_json::to_value(payload)?;
    Ok(ToolOutput::Structured(body))
}

/// Raw text handed to a legacy tool.
///
/// A JSON object is unwrapped through the first of `keys` holding a string;
/// anything else is taken verbatim.
pub(crate) fn legacy_text(input: &ToolInput, keys: &[&str]) -> String {
    let raw = match input {
        ToolInput::Text(text) => text.clone(),
        ToolInput::Structured(args) => {
            return keys
                .iter()
                .find_map(|k| args.get(*k).and_then(Value::as_str))
                .unwrap_or_default()
                .trim()
                .to_string();
        }
    };

    let text = match serde_json::from_str::<Map<String, Value>>(&raw) {
        Ok(obj) => keys
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map_or_else(|| raw.clone(), str::to_string),
        Err(_) => raw,
    };
    text.trim().to_string()
}

/// Decimal argument given as a JSON string or number
pub(crate) fn decimal_arg(input: &ToolInput, key: &str) -> CoreResult<Option<Decimal>> {
    let Some(value) = input.args().and_then(|a| a.get(key)) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| AgentError::ToolValidation(format!("{key} must be a number, got {value}")))
}
