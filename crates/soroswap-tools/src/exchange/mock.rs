//! Mock Soroswap Client
//!
//! For testing and demo purposes. Static token list and prices, with quotes
//! computed deterministically from them.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use super::SoroswapClient;
use crate::error::{Result, SwapError};
use crate::model::{
    ContractAddresses, Network, Pool, QUOTE_VALIDITY_SECS, RouteLeg, SwapQuote, SwapStatus, Token, TxStatus,
    fallback_tokens, find_token, from_stroops, slippage_bps, to_stroops,
};

/// Swap fee applied by the mock pools, in percent
const MOCK_FEE_PERCENT: Decimal = dec!(0.3);

/// Mock Soroswap client with static prices
pub struct MockSoroswapClient {
    network: Network,
    tokens: Vec<Token>,
}

impl Default for MockSoroswapClient {
    fn default() -> Self {
        Self::new(Network::Testnet)
    }
}

impl MockSoroswapClient {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            tokens: fallback_tokens(),
        }
    }

    /// USD price for a listed token
    fn usd_price(symbol: &str) -> Option<Decimal> {
        match symbol {
            "USDC" => Some(dec!(1.00)),
            "XLM" => Some(dec!(0.12)),
            "AQUA" => Some(dec!(0.0008)),
            _ => None,
        }
    }

    fn resolve(&self, query: &str) -> Result<&Token> {
        find_token(&self.tokens, query).ok_or_else(|| SwapError::UnsupportedToken(query.to_string()))
    }
}

#[async_trait]
impl SoroswapClient for MockSoroswapClient {
    async fn get_tokens(&self) -> Result<Vec<Token>> {
        Ok(self.tokens.clone())
    }

    async fn get_protocols(&self) -> Result<Vec<String>> {
        Ok(vec!["soroswap".into(), "aqua".into(), "phoenix".into()])
    }

    async fn get_pools(&self, protocols: &[String]) -> Result<Vec<Pool>> {
        let mut pools = Vec::new();
        for protocol in protocols {
            for (i, a) in self.tokens.iter().enumerate() {
                for b in &self.tokens[i + 1..] {
                    pools.push(Pool {
                        protocol: protocol.clone(),
                        address: format!("MOCK_POOL_{}_{}_{}", protocol.to_uppercase(), a.symbol, b.symbol),
                        token_a: a.address.clone(),
                        token_b: b.address.clone(),
                        reserve_a: dec!(1_000_000),
                        reserve_b: dec!(1_000_000),
                    });
                }
            }
        }
        Ok(pools)
    }

    async fn get_contract_addresses(&self) -> Result<ContractAddresses> {
        let net = self.network.as_str().to_uppercase();
        Ok(ContractAddresses {
            factory: format!("MOCK_{net}_FACTORY"),
            router: format!("MOCK_{net}_ROUTER"),
            aggregator: format!("MOCK_{net}_AGGREGATOR"),
        })
    }

    async fn get_quote(
        &self,
        input_token: &str,
        output_token: &str,
        input_amount: Decimal,
        slippage_percent: Decimal,
    ) -> Result<SwapQuote> {
        let input = self.resolve(input_token)?.clone();
        let output = self.resolve(output_token)?.clone();
        if input.address == output.address {
            return Err(SwapError::InvalidRequest("input and output token are the same".into()));
        }

        let amount_in = to_stroops(input_amount)?;
        let bps = slippage_bps(slippage_percent)?;

        let (price_in, price_out) = match (Self::usd_price(&input.symbol), Self::usd_price(&output.symbol)) {
            (Some(i), Some(o)) => (i, o),
            _ => return Err(SwapError::UnsupportedToken(format!("{}/{}", input.symbol, output.symbol))),
        };

        let overflow = || SwapError::InvalidAmount(input_amount.to_string());
        let net = input_amount
            .checked_mul(price_in)
            .and_then(|v| v.checked_div(price_out))
            .and_then(|v| v.checked_mul(Decimal::ONE_HUNDRED - MOCK_FEE_PERCENT))
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(overflow)?;
        let output_amount = from_stroops(to_stroops(net)?).ok_or_else(overflow)?;
        let price_impact = input_amount
            .checked_mul(price_in)
            .and_then(|v| v.checked_div(dec!(100_000)))
            .ok_or_else(overflow)?
            .round_dp(4);

        tracing::debug!(%input_amount, %output_amount, amount_in, bps, "Mock quote");

        Ok(SwapQuote {
            route: vec![RouteLeg {
                protocol: "soroswap".into(),
                path: vec![input.address.clone(), output.address.clone()],
                percentage: Decimal::ONE_HUNDRED,
            }],
            xdr: Some(format!("MOCK_XDR_{}", uuid::Uuid::new_v4().simple())),
            input_token: input,
            output_token: output,
            input_amount,
            output_amount,
            price_impact,
            fee: MOCK_FEE_PERCENT,
            slippage_bps: bps,
            valid_until: Utc::now() + Duration::seconds(QUOTE_VALIDITY_SECS),
        })
    }

    async fn send_transaction(&self, signed_xdr: &str, launchtube: bool) -> Result<Value> {
        if signed_xdr.trim().is_empty() {
            return Err(SwapError::InvalidRequest("signed XDR is empty".into()));
        }
        Ok(json!({
            "hash": format!("0x{}", uuid::Uuid::new_v4().simple()),
            "status": "pending",
            "launchtube": launchtube,
            "network": self.network,
        }))
    }

    async fn get_swap_status(&self, hash: &str) -> Result<SwapStatus> {
        Ok(SwapStatus {
            hash: hash.to_string(),
            status: TxStatus::Completed,
            input_token: Some(self.tokens[0].address.clone()),
            output_token: Some(self.tokens[1].address.clone()),
            input_amount: Some(dec!(100)),
            output_amount: Some(dec!(95.5)),
            timestamp: Utc::now(),
            error: None,
        })
    }

    async fn get_swap_history(&self, _user_address: &str) -> Result<Vec<SwapStatus>> {
        Ok(Vec::new())
    }

    async fn get_token_price(&self, token_address: &str) -> Result<Decimal> {
        Ok(find_token(&self.tokens, token_address)
            .and_then(|t| Self::usd_price(&t.symbol))
            .unwrap_or(Decimal::ZERO))
    }

    fn network(&self) -> Network {
        self.network
    }

    fn name(&self) -> &str {
        "MockSoroswap"
    }
}
