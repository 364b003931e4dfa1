//! Soroswap Integration
//!
//! Client abstraction over the Soroswap aggregator API, with a mock for
//! offline use and tests.

mod http;
mod mock;

pub use http::HttpSoroswapClient;
pub use mock::MockSoroswapClient;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{Result, SwapError};
use crate::model::{
    ContractAddresses, Network, Pool, SwapQuote, SwapRequest, SwapResponse, SwapStatus, Token, TxStatus,
};

const DEFAULT_API_URL: &str = "https://api.soroswap.finance";

/// Soroswap client trait (Strategy pattern)
#[async_trait]
pub trait SoroswapClient: Send + Sync {
    /// Tokens from the Soroswap asset list
    async fn get_tokens(&self) -> Result<Vec<Token>>;

    async fn get_protocols(&self) -> Result<Vec<String>>;

    async fn get_pools(&self, protocols: &[String]) -> Result<Vec<Pool>>;

    async fn get_contract_addresses(&self) -> Result<ContractAddresses>;

    /// Exact-in quote with an unsigned transaction attached
    async fn get_quote(
        &self,
        input_token: &str,
        output_token: &str,
        input_amount: Decimal,
        slippage_percent: Decimal,
    ) -> Result<SwapQuote>;

    /// Quote and prepare a swap for the recipient's wallet to sign
    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapResponse> {
        let quote = self
            .get_quote(
                &request.input_token,
                &request.output_token,
                request.input_amount,
                request.slippage_tolerance,
            )
            .await?;
        let xdr = quote.xdr.ok_or(SwapError::MissingXdr)?;

        tracing::info!(
            input = %request.input_token,
            output = %request.output_token,
            amount = %request.input_amount,
            recipient = %request.recipient,
            "Swap prepared for signing"
        );

        Ok(SwapResponse {
            hash: format!("0x{}", uuid::Uuid::new_v4().simple()),
            status: TxStatus::Pending,
            input_token: request.input_token.clone(),
            output_token: request.output_token.clone(),
            input_amount: request.input_amount,
            output_amount: quote.output_amount,
            xdr: Some(xdr),
            timestamp: Utc::now(),
        })
    }

    /// Submit a signed transaction, optionally through Launchtube
    async fn send_transaction(&self, signed_xdr: &str, launchtube: bool) -> Result<Value>;

    async fn get_swap_status(&self, hash: &str) -> Result<SwapStatus>;

    async fn get_swap_history(&self, user_address: &str) -> Result<Vec<SwapStatus>>;

    /// USD price of a token, zero when unpriced
    async fn get_token_price(&self, token_address: &str) -> Result<Decimal>;

    fn network(&self) -> Network;

    fn name(&self) -> &str;
}

/// Soroswap connection settings
#[derive(Clone, Debug)]
pub struct SoroswapConfig {
    /// Without a key the mock client is used
    pub api_key: Option<String>,
    pub api_url: String,
    pub network: Network,
    pub timeout_secs: u64,
}

impl Default for SoroswapConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.into(),
            network: Network::Testnet,
            timeout_secs: 30,
        }
    }
}

impl SoroswapConfig {
    /// Read `SOROSWAP_API_KEY`, `SOROSWAP_API_URL` and `SOROSWAP_NETWORK`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let network = match lookup("SOROSWAP_NETWORK") {
            Some(raw) => raw.parse()?,
            None => defaults.network,
        };

        Ok(Self {
            api_key: lookup("SOROSWAP_API_KEY").filter(|k| !k.trim().is_empty()),
            api_url: lookup("SOROSWAP_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            network,
            timeout_secs: defaults.timeout_secs,
        })
    }

    /// Build the live client when an API key is configured, the mock otherwise
    pub fn connect(self) -> Result<Arc<dyn SoroswapClient>> {
        if self.api_key.is_some() {
            tracing::info!(network = %self.network, url = %self.api_url, "Using Soroswap API");
            Ok(Arc::new(HttpSoroswapClient::new(self)?))
        } else {
            tracing::warn!("SOROSWAP_API_KEY not set, using mock Soroswap client");
            Ok(Arc::new(MockSoroswapClient::new(self.network)))
        }
    }
}
