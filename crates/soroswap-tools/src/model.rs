//! Domain Models
//!
//! Data types exchanged with Soroswap. Token amounts are `rust_decimal`
//! values in whole-token units; the API works in 7-decimal integer units
//! ("stroops") and the conversion lives here.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwapError};

/// Decimals used by Stellar tokens
pub const TOKEN_DECIMALS: u32 = 7;

/// Default slippage tolerance in percent
pub const DEFAULT_SLIPPAGE_PERCENT: Decimal = dec!(0.5);

/// Maximum hops a quoted route may take
pub const MAX_HOPS: u32 = 3;

/// Quote validity window in seconds
pub const QUOTE_VALIDITY_SECS: i64 = 300;

/// Stellar network
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Testnet,
    Mainnet,
}

impl Network {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet",
        }
    }

    /// Public Horizon endpoint for this network
    pub const fn horizon_url(self) -> &'static str {
        match self {
            Self::Testnet => "https://horizon-testnet.stellar.org",
            Self::Mainnet => "https://horizon.stellar.org",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = SwapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "testnet" | "test" => Ok(Self::Testnet),
            "mainnet" | "public" | "production" => Ok(Self::Mainnet),
            other => Err(SwapError::Config(format!("unknown network '{other}'"))),
        }
    }
}

/// A token listed on Soroswap
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Contract address (C...)
    pub address: String,

    /// Ticker symbol (e.g., "XLM", "USDC")
    pub symbol: String,

    pub name: String,

    pub decimals: u32,

    #[serde(rename = "logoURI", default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

impl Token {
    pub fn new(address: &str, symbol: &str, name: &str) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            name: name.into(),
            decimals: TOKEN_DECIMALS,
            logo_uri: None,
        }
    }

    /// Placeholder for an address missing from the token list
    pub fn unknown(address: &str) -> Self {
        Self::new(address, "UNKNOWN", "Unknown Token")
    }

    /// Matches either the contract address or the symbol (case-insensitive)
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.address == query || self.symbol.eq_ignore_ascii_case(query)
    }
}

/// Look up a token by address or symbol
pub fn find_token<'a>(tokens: &'a [Token], query: &str) -> Option<&'a Token> {
    tokens
        .iter()
        .find(|t| t.address == query.trim())
        .or_else(|| tokens.iter().find(|t| t.matches(query)))
}

/// Tokens offered when the asset list comes back empty
pub fn fallback_tokens() -> Vec<Token> {
    let explorer = "https://stellar.expert/explorer/public/asset";
    let mut tokens = vec![
        Token::new("CAS3J7GYLGXMF6TDJBBYYSE3HQ6BBSMLNUQ34T6TZMYMW2EVH34XOWMA", "USDC", "USD Coin"),
        Token::new("CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC", "XLM", "Stellar Lumens"),
        Token::new("CCXQWO33QBEUDVTWDDOYLD2SYEJSWUM6DIJUX6NDAOSXNCGK3PSIWQJG", "AQUA", "Aqua"),
    ];
    for token in &mut tokens {
        let key = if token.symbol == "XLM" { "XLM" } else { &token.address };
        token.logo_uri = Some(format!("{explorer}/{key}"));
    }
    tokens
}

/// One leg of a quoted route
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub protocol: String,
    pub path: Vec<String>,
    /// Share of the trade routed through this leg
    pub percentage: Decimal,
}

/// A priced swap, valid until `valid_until`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub input_token: Token,
    pub output_token: Token,
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    /// Price impact in percent
    pub price_impact: Decimal,
    /// Protocol fee in percent
    pub fee: Decimal,
    pub slippage_bps: u32,
    pub route: Vec<RouteLeg>,
    pub valid_until: DateTime<Utc>,
    /// Unsigned transaction for the wallet to sign
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xdr: Option<String>,
}

impl SwapQuote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_until
    }
}

/// Swap instruction for a specific wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub input_token: String,
    pub output_token: String,
    pub input_amount: Decimal,
    /// Percent, e.g. 0.5
    pub slippage_tolerance: Decimal,
    /// Wallet that receives the output
    pub recipient: String,
}

/// Transaction lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

/// Result of submitting a swap
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    pub hash: String,
    pub status: TxStatus,
    pub input_token: String,
    pub output_token: String,
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    /// Unsigned transaction awaiting the wallet signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xdr: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Status of a previously submitted transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapStatus {
    pub hash: String,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_amount: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Core Soroswap contracts on a network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub factory: String,
    pub router: String,
    pub aggregator: String,
}

/// A liquidity pool
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub protocol: String,
    pub address: String,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
}

/// Parse a user-supplied amount, which must be positive
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let amount = Decimal::from_str(raw.trim()).map_err(|_| SwapError::InvalidAmount(raw.to_string()))?;
    if amount <= Decimal::ZERO {
        return Err(SwapError::InvalidAmount(raw.to_string()));
    }
    Ok(amount)
}

/// Whole tokens to 7-decimal integer units, truncating extra precision
pub fn to_stroops(amount: Decimal) -> Result<i128> {
    let stroops = amount
        .checked_mul(Decimal::from(10_i64.pow(TOKEN_DECIMALS)))
        .and_then(|scaled| scaled.trunc().to_i128())
        .ok_or_else(|| SwapError::InvalidAmount(amount.to_string()))?;
    if stroops <= 0 {
        return Err(SwapError::InvalidAmount(amount.to_string()));
    }
    Ok(stroops)
}

/// 7-decimal integer units back to whole tokens, `None` past 96 bits
pub fn from_stroops(stroops: i128) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(stroops, TOKEN_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}

/// Slippage percent to basis points (0.5% -> 50)
pub fn slippage_bps(percent: Decimal) -> Result<u32> {
    if percent < Decimal::ZERO || percent > dec!(100) {
        return Err(SwapError::InvalidRequest(format!(
            "slippage tolerance must be between 0 and 100, got {percent}"
        )));
    }
    (percent * dec!(100))
        .trunc()
        .to_u32()
        .ok_or_else(|| SwapError::InvalidRequest(format!("invalid slippage {percent}")))
}
