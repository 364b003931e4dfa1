//! # soroswap-tools
//!
//! Tools that let the swap agent work with Soroswap, the DEX aggregator on
//! Stellar, plus two general-purpose helpers.
//!
//! ```text
//! Market data              Trading                  Utility
//! ───────────────────────  ───────────────────────  ──────────
//! get_tokens               get_quote                calculator
//! get_protocols            execute_swap (*)         weather
//! get_pools                send_transaction
//! get_contract_addresses   get_swap_status
//! get_token_price          get_swap_history (*)
//!
//! (*) acts on the caller's wallet from the caller context
//! ```
//!
//! Token amounts are decimal strings in whole-token units; the client layer
//! converts to the 7-decimal integer units Soroswap works in.

pub mod error;
pub mod exchange;
pub mod model;
pub mod svckit;

use std::sync::Arc;

use swap_agent_core::ToolRegistry;

pub use error::{Result, SwapError};
pub use exchange::{HttpSoroswapClient, MockSoroswapClient, SoroswapClient, SoroswapConfig};
pub use model::{Network, SwapQuote, Token};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        CalculatorTool, ExecuteSwapTool, GetContractAddressesTool, GetPoolsTool, GetProtocolsTool, GetQuoteTool,
        GetSwapHistoryTool, GetSwapStatusTool, GetTokenPriceTool, GetTokensTool, SendTransactionTool, WeatherTool,
    };
}

/// Registry with every Soroswap tool plus the calculator and weather helpers
pub fn default_registry(client: Arc<dyn SoroswapClient>) -> ToolRegistry {
    use tools::*;

    ToolRegistry::new()
        .with(CalculatorTool)
        .with(WeatherTool)
        .with(GetTokensTool::new(client.clone()))
        .with(GetProtocolsTool::new(client.clone()))
        .with(GetPoolsTool::new(client.clone()))
        .with(GetContractAddressesTool::new(client.clone()))
        .with(GetTokenPriceTool::new(client.clone()))
        .with(GetQuoteTool::new(client.clone()))
        .with(ExecuteSwapTool::new(client.clone()))
        .with(SendTransactionTool::new(client.clone()))
        .with(GetSwapStatusTool::new(client.clone()))
        .with(GetSwapHistoryTool::new(client))
}
