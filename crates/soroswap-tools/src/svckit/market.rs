//! Market data tools: tokens, protocols, pools, contracts and prices.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use swap_agent_core::{
    AgentError, Result as CoreResult, Tool, ToolInput, ToolOutput, ToolSchema, tool::ParameterSchema,
};

use super::{legacy_text, success};
use crate::exchange::SoroswapClient;

fn read_only(name: &str, description: &str, parameters: Vec<ParameterSchema>) -> ToolSchema {
    ToolSchema {
        name: name.into(),
        description: description.into(),
        parameters,
        category: Some("market_data".into()),
        has_side_effects: false,
        accepts_structured_args: true,
        needs_caller_context: false,
    }
}

/// Lists tokens available for swapping
pub struct GetTokensTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetTokensTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetTokensTool {
    fn schema(&self) -> ToolSchema {
        read_only("get_tokens", "Get list of available tokens for swapping on Soroswap", vec![])
    }

    async fn invoke(&self, _input: ToolInput) -> CoreResult<ToolOutput> {
        let tokens = self.client.get_tokens().await?;
        success("tokens", &tokens)
    }
}

pub struct GetProtocolsTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetProtocolsTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetProtocolsTool {
    fn schema(&self) -> ToolSchema {
        read_only(
            "get_protocols",
            "Get list of available protocols (Soroswap, Aqua, Phoenix, etc.)",
            vec![],
        )
    }

    async fn invoke(&self, _input: ToolInput) -> CoreResult<ToolOutput> {
        let protocols = self.client.get_protocols().await?;
        success("protocols", &protocols)
    }
}

pub struct GetPoolsTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetPoolsTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }

    /// Accepts an array or a comma-separated string; defaults to soroswap
    fn protocols(input: &ToolInput) -> Vec<String> {
        let requested: Vec<String> = match input.args().and_then(|a| a.get("protocols")) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            Some(Value::String(list)) => list.split(',').map(|p| p.trim().to_lowercase()).collect(),
            _ => Vec::new(),
        };
        let requested: Vec<String> = requested.into_iter().filter(|p| !p.is_empty()).collect();
        if requested.is_empty() {
            vec!["soroswap".into()]
        } else {
            requested
        }
    }
}

#[async_trait]
impl Tool for GetPoolsTool {
    fn schema(&self) -> ToolSchema {
        read_only(
            "get_pools",
            "Get liquidity pools for specific protocols",
            vec![
                ParameterSchema::optional("protocols", "array", "Protocols to include, e.g. [\"soroswap\", \"aqua\"]")
                    .with_default(serde_json::json!(["soroswap"])),
            ],
        )
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let pools = self.client.get_pools(&Self::protocols(&input)).await?;
        success("pools", &pools)
    }
}

pub struct GetContractAddressesTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetContractAddressesTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetContractAddressesTool {
    fn schema(&self) -> ToolSchema {
        read_only(
            "get_contract_addresses",
            "Get Soroswap contract addresses (factory, router, aggregator)",
            vec![],
        )
    }

    async fn invoke(&self, _input: ToolInput) -> CoreResult<ToolOutput> {
        let contracts = self.client.get_contract_addresses().await?;
        success("contracts", &contracts)
    }
}

/// Current USD price of a token. Legacy string input: the token address.
pub struct GetTokenPriceTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetTokenPriceTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetTokenPriceTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            accepts_structured_args: false,
            ..read_only(
                "get_token_price",
                "Get the current price of a token. Input should be the token contract address.",
                vec![ParameterSchema::required("input", "string", "Token contract address")],
            )
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let address = legacy_text(&input, &["input", "tokenAddress", "address"]);
        if address.is_empty() {
            return Err(AgentError::ToolValidation("Token address is required".into()));
        }
        let price = self.client.get_token_price(&address).await?;
        success("price", &price)
    }
}
