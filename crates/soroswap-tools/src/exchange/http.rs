//! Soroswap REST client
//!
//! Talks to the Soroswap aggregator API for market data, quotes and
//! submission. Transaction status comes from Horizon, which the aggregator
//! does not track.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use super::{SoroswapClient, SoroswapConfig};
use crate::error::{Result, SwapError};
use crate::model::{
    ContractAddresses, MAX_HOPS, Network, Pool, QUOTE_VALIDITY_SECS, RouteLeg, SwapQuote, SwapRequest,
    SwapResponse, SwapStatus, Token, TxStatus, fallback_tokens, find_token, from_stroops, slippage_bps,
    to_stroops,
};

const ASSET_LIST: &str = "soroswap";
const QUOTE_PROTOCOLS: [&str; 3] = ["soroswap", "aqua", "phoenix"];
const HISTORY_LIMIT: u32 = 20;

#[derive(Deserialize)]
struct WireAssetList {
    #[serde(default)]
    assets: Vec<WireAsset>,
}

#[derive(Deserialize)]
struct WireAsset {
    code: Option<String>,
    contract: Option<String>,
    name: Option<String>,
    decimals: Option<u32>,
    icon: Option<String>,
}

impl From<WireAsset> for Token {
    fn from(asset: WireAsset) -> Self {
        let symbol = asset.code.unwrap_or_else(|| "UNKNOWN".into());
        Self {
            address: asset.contract.unwrap_or_default(),
            name: asset.name.unwrap_or_else(|| symbol.clone()),
            symbol,
            decimals: asset.decimals.unwrap_or(crate::model::TOKEN_DECIMALS),
            logo_uri: asset.icon,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePool {
    protocol: String,
    address: String,
    token_a: String,
    token_b: String,
    #[serde(default)]
    reserve_a: Value,
    #[serde(default)]
    reserve_b: Value,
}

#[derive(Deserialize)]
struct WireAddress {
    address: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQuote {
    amount_out: Value,
    #[serde(default)]
    price_impact_pct: Value,
    #[serde(default)]
    route_plan: Vec<WireRoute>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRoute {
    swap_info: WireSwapInfo,
    #[serde(default)]
    percent: Value,
}

#[derive(Deserialize)]
struct WireSwapInfo {
    protocol: String,
    #[serde(default)]
    path: Vec<String>,
}

#[derive(Deserialize)]
struct WireBuild {
    xdr: String,
}

#[derive(Deserialize)]
struct WirePrice {
    price: Option<Decimal>,
}

#[derive(Deserialize)]
struct HorizonTransaction {
    hash: String,
    successful: bool,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct HorizonPage {
    #[serde(rename = "_embedded")]
    embedded: HorizonRecords,
}

#[derive(Deserialize)]
struct HorizonRecords {
    records: Vec<HorizonTransaction>,
}

impl From<HorizonTransaction> for SwapStatus {
    fn from(tx: HorizonTransaction) -> Self {
        Self {
            hash: tx.hash,
            status: if tx.successful { TxStatus::Completed } else { TxStatus::Failed },
            input_token: None,
            output_token: None,
            input_amount: None,
            output_amount: None,
            timestamp: tx.created_at,
            error: (!tx.successful).then(|| "transaction failed on ledger".into()),
        }
    }
}

/// Decimal from a JSON string or number
fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Whole-token amount from a stroop count in JSON
fn stroop_value(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::String(s) => s.parse::<i128>().ok()?,
        Value::Number(n) => i128::from(n.as_i64()?),
        _ => return None,
    };
    from_stroops(raw)
}

/// Soroswap aggregator API client
pub struct HttpSoroswapClient {
    http: reqwest::Client,
    config: SoroswapConfig,
    api_key: String,
}

impl HttpSoroswapClient {
    pub fn new(config: SoroswapConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SwapError::Config("SOROSWAP_API_KEY is required".into()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { http, config, api_key })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .query(&[("network", self.config.network.as_str())])
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn token_info(&self, address: &str) -> Token {
        match self.get_tokens().await {
            Ok(tokens) => find_token(&tokens, address)
                .cloned()
                .unwrap_or_else(|| Token::unknown(address)),
            Err(e) => {
                tracing::warn!(error = %e, "Token list unavailable for quote metadata");
                Token::unknown(address)
            }
        }
    }

    /// Quote, building the unsigned transaction when a source wallet is known
    async fn quote_for(
        &self,
        input_token: &str,
        output_token: &str,
        input_amount: Decimal,
        slippage_percent: Decimal,
        from: Option<&str>,
    ) -> Result<SwapQuote> {
        let bps = slippage_bps(slippage_percent)?;
        let request = json!({
            "assetIn": input_token,
            "assetOut": output_token,
            "amount": to_stroops(input_amount)?.to_string(),
            "tradeType": "EXACT_IN",
            "protocols": QUOTE_PROTOCOLS,
            "assetList": [ASSET_LIST],
            "slippageBps": bps,
            "maxHops": MAX_HOPS,
        });

        let raw: Value = self.post("/quote", &request).await?;
        let quote: WireQuote = serde_json::from_value(raw.clone())?;
        let output_amount = stroop_value(&quote.amount_out)
            .ok_or_else(|| SwapError::Api { status: 200, message: "quote has no amountOut".into() })?;

        let xdr = match from {
            Some(wallet) => {
                let built: WireBuild = self.post("/quote/build", &json!({"quote": raw, "from": wallet})).await?;
                Some(built.xdr)
            }
            None => None,
        };

        Ok(SwapQuote {
            input_token: self.token_info(input_token).await,
            output_token: self.token_info(output_token).await,
            input_amount,
            output_amount,
            price_impact: decimal_value(&quote.price_impact_pct).unwrap_or_default(),
            fee: Decimal::new(5, 1),
            slippage_bps: bps,
            route: quote
                .route_plan
                .into_iter()
                .map(|r| RouteLeg {
                    protocol: r.swap_info.protocol,
                    path: r.swap_info.path,
                    percentage: decimal_value(&r.percent).unwrap_or_default(),
                })
                .collect(),
            valid_until: Utc::now() + chrono::Duration::seconds(QUOTE_VALIDITY_SECS),
            xdr,
        })
    }

    async fn horizon_get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.network.horizon_url(), path);
        Ok(self.http.get(url).send().await?)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(SwapError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}

#[async_trait]
impl SoroswapClient for HttpSoroswapClient {
    async fn get_tokens(&self) -> Result<Vec<Token>> {
        let lists: Vec<WireAssetList> = self.get("/asset-list", &[("name", ASSET_LIST)]).await?;
        let tokens: Vec<Token> = lists
            .into_iter()
            .next()
            .map(|list| list.assets.into_iter().map(Token::from).collect())
            .unwrap_or_default();

        if tokens.is_empty() {
            tracing::debug!("Asset list empty, using fallback tokens");
            return Ok(fallback_tokens());
        }
        Ok(tokens)
    }

    async fn get_protocols(&self) -> Result<Vec<String>> {
        self.get("/protocols", &[("network", self.config.network.as_str())]).await
    }

    async fn get_pools(&self, protocols: &[String]) -> Result<Vec<Pool>> {
        let mut query = vec![("network", self.config.network.as_str()), ("assetList", ASSET_LIST)];
        query.extend(protocols.iter().map(|p| ("protocol", p.as_str())));

        let pools: Vec<WirePool> = self.get("/pools", &query).await?;
        Ok(pools
            .into_iter()
            .map(|p| Pool {
                reserve_a: stroop_value(&p.reserve_a).unwrap_or_default(),
                reserve_b: stroop_value(&p.reserve_b).unwrap_or_default(),
                protocol: p.protocol,
                address: p.address,
                token_a: p.token_a,
                token_b: p.token_b,
            })
            .collect())
    }

    async fn get_contract_addresses(&self) -> Result<ContractAddresses> {
        let network = self.config.network.as_str();
        let factory_path = format!("/api/{network}/factory");
        let router_path = format!("/api/{network}/router");
        let aggregator_path = format!("/api/{network}/aggregator");
        let (factory, router, aggregator) = tokio::try_join!(
            self.get::<WireAddress>(&factory_path, &[]),
            self.get::<WireAddress>(&router_path, &[]),
            self.get::<WireAddress>(&aggregator_path, &[]),
        )?;

        Ok(ContractAddresses {
            factory: factory.address,
            router: router.address,
            aggregator: aggregator.address,
        })
    }

    async fn get_quote(
        &self,
        input_token: &str,
        output_token: &str,
        input_amount: Decimal,
        slippage_percent: Decimal,
    ) -> Result<SwapQuote> {
        self.quote_for(input_token, output_token, input_amount, slippage_percent, None)
            .await
    }

    async fn execute_swap(&self, request: &SwapRequest) -> Result<SwapResponse> {
        let quote = self
            .quote_for(
                &request.input_token,
                &request.output_token,
                request.input_amount,
                request.slippage_tolerance,
                Some(&request.recipient),
            )
            .await?;
        let xdr = quote.xdr.ok_or(SwapError::MissingXdr)?;

        tracing::info!(recipient = %request.recipient, "Swap transaction built for signing");

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

    async fn send_transaction(&self, signed_xdr: &str, launchtube: bool) -> Result<Value> {
        if signed_xdr.trim().is_empty() {
            return Err(SwapError::InvalidRequest("signed XDR is empty".into()));
        }
        self.post("/send", &json!({"xdr": signed_xdr, "launchtube": launchtube}))
            .await
    }

    async fn get_swap_status(&self, hash: &str) -> Result<SwapStatus> {
        let hash = hash.trim().trim_start_matches("0x");
        let response = self.horizon_get(&format!("/transactions/{hash}")).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(SwapStatus {
                hash: hash.to_string(),
                status: TxStatus::Pending,
                input_token: None,
                output_token: None,
                input_amount: None,
                output_amount: None,
                timestamp: Utc::now(),
                error: None,
            });
        }
        let tx: HorizonTransaction = read_json(response).await?;
        Ok(tx.into())
    }

    async fn get_swap_history(&self, user_address: &str) -> Result<Vec<SwapStatus>> {
        let path = format!(
            "/accounts/{}/transactions?order=desc&limit={HISTORY_LIMIT}",
            user_address.trim()
        );
        let response = self.horizon_get(&path).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // unfunded accounts have no history
            return Ok(Vec::new());
        }
        let page: HorizonPage = read_json(response).await?;
        Ok(page.embedded.records.into_iter().map(SwapStatus::from).collect())
    }

    async fn get_token_price(&self, token_address: &str) -> Result<Decimal> {
        let prices: Vec<WirePrice> = self
            .get(
                "/price",
                &[("network", self.config.network.as_str()), ("asset", token_address.trim())],
            )
            .await?;
        Ok(prices.into_iter().next().and_then(|p| p.price).unwrap_or(Decimal::ZERO))
    }

    fn network(&self) -> Network {
        self.config.network
    }

    fn name(&self) -> &str {
        "Soroswap"
    }
}
