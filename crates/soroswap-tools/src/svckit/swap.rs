//! Swap Tools
//!
//! Quote, prepare, submit and track swaps. `execute_swap` and
//! `get_swap_history` act on the caller's own wallet, taken from the caller
//! context the dispatcher forwards.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use swap_agent_core::{
    AgentError, Result as CoreResult, Tool, ToolInput, ToolOutput, ToolSchema, tool::ParameterSchema,
};

use super::{decimal_arg, legacy_text, success};
use crate::exchange::SoroswapClient;
use crate::model::{DEFAULT_SLIPPAGE_PERCENT, SwapRequest, parse_amount};

fn swap_parameters() -> Vec<ParameterSchema> {
    vec![
        ParameterSchema::required("inputToken", "string", "Token to sell (contract address or symbol)"),
        ParameterSchema::required("outputToken", "string", "Token to buy (contract address or symbol)"),
        ParameterSchema::required("inputAmount", "string", "Amount of inputToken, in whole tokens"),
        ParameterSchema::optional("slippageTolerance", "number", "Maximum slippage in percent")
            .with_default(json!(0.5)),
    ]
}

/// Parsed `inputToken`/`outputToken`/`inputAmount`/`slippageTolerance`
struct SwapArgs<'a> {
    input_token: &'a str,
    output_token: &'a str,
    input_amount: Decimal,
    slippage: Decimal,
}

impl<'a> SwapArgs<'a> {
    fn parse(input: &'a ToolInput) -> CoreResult<Self> {
        let amount = match decimal_arg(input, "inputAmount")? {
            Some(amount) => parse_amount(&amount.to_string())?,
            None => return Err(AgentError::ToolValidation("Missing required parameter: inputAmount".into())),
        };

        Ok(Self {
            input_token: input.require_str("inputToken")?,
            output_token: input.require_str("outputToken")?,
            input_amount: amount,
            slippage: decimal_arg(input, "slippageTolerance")?.unwrap_or(DEFAULT_SLIPPAGE_PERCENT),
        })
    }
}

/// Wallet public key from the forwarded caller context
fn caller_wallet(input: &ToolInput) -> Option<String> {
    input
        .caller_context()
        .and_then(|ctx| ctx.public_key)
        .filter(|k| !k.trim().is_empty())
}

pub struct GetQuoteTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetQuoteTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetQuoteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_quote".into(),
            description: "Get a quote for swapping tokens: expected output amount, price impact and route.".into(),
            parameters: swap_parameters(),
            category: Some("trading".into()),
            has_side_effects: false,
            accepts_structured_args: true,
            needs_caller_context: false,
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let args = SwapArgs::parse(&input)?;
        let quote = self
            .client
            .get_quote(args.input_token, args.output_token, args.input_amount, args.slippage)
            .await?;
        success("quote", &quote)
    }
}

/// Prepares a swap for the caller's wallet. The wallet signs; nothing moves
/// until `send_transaction`.
pub struct ExecuteSwapTool {
    client: Arc<dyn SoroswapClient>,
}

impl ExecuteSwapTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ExecuteSwapTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "execute_swap".into(),
            description: "Execute a token swap from the connected wallet. Returns a transaction for the wallet to sign.".into(),
            parameters: swap_parameters(),
            category: Some("trading".into()),
            has_side_effects: true,
            accepts_structured_args: true,
            needs_caller_context: true,
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let args = SwapArgs::parse(&input)?;
        let recipient = caller_wallet(&input)
            .ok_or_else(|| AgentError::ToolValidation("No wallet connected: a public key is required to swap".into()))?;

        let request = SwapRequest {
            input_token: args.input_token.to_string(),
            output_token: args.output_token.to_string(),
            input_amount: args.input_amount,
            slippage_tolerance: args.slippage,
            recipient,
        };
        let swap = self.client.execute_swap(&request).await?;
        success("swap", &swap)
    }
}

pub struct SendTransactionTool {
    client: Arc<dyn SoroswapClient>,
}

impl SendTransactionTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SendTransactionTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "send_transaction".into(),
            description: "Send a signed transaction to the network.".into(),
            parameters: vec![
                ParameterSchema::required("signedXdr", "string", "Signed transaction envelope (base64 XDR)"),
                ParameterSchema::optional("launchtube", "boolean", "Submit through Launchtube")
                    .with_default(json!(false)),
            ],
            category: Some("trading".into()),
            has_side_effects: true,
            accepts_structured_args: true,
            needs_caller_context: false,
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let signed_xdr = input.require_str("signedXdr")?;
        let launchtube = input
            .args()
            .and_then(|a| a.get("launchtube"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let result = self.client.send_transaction(signed_xdr, launchtube).await?;
        success("result", &result)
    }
}

/// Legacy string input: the transaction hash
pub struct GetSwapStatusTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetSwapStatusTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetSwapStatusTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_swap_status".into(),
            description: "Get the status of a swap transaction. Input should be the transaction hash.".into(),
            parameters: vec![ParameterSchema::required("input", "string", "Transaction hash")],
            category: Some("trading".into()),
            has_side_effects: false,
            accepts_structured_args: false,
            needs_caller_context: false,
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let hash = legacy_text(&input, &["input", "hash"]);
        if hash.is_empty() {
            return Err(AgentError::ToolValidation("Transaction hash is required".into()));
        }
        let status = self.client.get_swap_status(&hash).await?;
        success("status", &status)
    }
}

/// Defaults to the caller's own wallet
pub struct GetSwapHistoryTool {
    client: Arc<dyn SoroswapClient>,
}

impl GetSwapHistoryTool {
    pub fn new(client: Arc<dyn SoroswapClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetSwapHistoryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_swap_history".into(),
            description: "Get swap history for a wallet. Defaults to the connected wallet.".into(),
            parameters: vec![ParameterSchema::optional("userAddress", "string", "Wallet address")],
            category: Some("trading".into()),
            has_side_effects: false,
            accepts_structured_args: true,
            needs_caller_context: true,
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let address = input
            .str_arg("userAddress")
            .map(str::to_string)
            .or_else(|| caller_wallet(&input))
            .ok_or_else(|| AgentError::ToolValidation("User address is required".into()))?;

        let history = self.client.get_swap_history(&address).await?;
        success("history", &history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockSoroswapClient;
    use swap_agent_core::CallerContext;
    use swap_agent_core::tool::CALLER_CONTEXT_KEY;

    fn client() -> Arc<dyn SoroswapClient> {
        Arc::new(MockSoroswapClient::default())
    }

    fn structured(args: Value) -> ToolInput {
        ToolInput::Structured(serde_json::from_value(args).unwrap())
    }

    fn with_wallet(mut args: Value, key: &str) -> ToolInput {
        args[CALLER_CONTEXT_KEY] = serde_json::to_value(CallerContext::new().with_public_key(key)).unwrap();
        structured(args)
    }

    #[tokio::test]
    async fn test_quote_defaults_slippage() {
        let output = GetQuoteTool::new(client())
            .invoke(structured(json!({"inputToken": "XLM", "outputToken": "USDC", "inputAmount": 10})))
            .await
            .unwrap()
            .into_value();

        assert_eq!(output["success"], true);
        assert_eq!(output["quote"]["slippageBps"], 50);
        assert_eq!(output["quote"]["outputAmount"], "1.1964");
    }

    #[tokio::test]
    async fn test_quote_rejects_bad_amount() {
        let tool = GetQuoteTool::new(client());
        let err = tool
            .invoke(structured(json!({"inputToken": "XLM", "outputToken": "USDC", "inputAmount": "-5"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));

        let err = tool
            .invoke(structured(json!({"inputToken": "XLM", "outputToken": "USDC"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("inputAmount"));
    }

    #[tokio::test]
    async fn test_execute_swap_requires_wallet() {
        let tool = ExecuteSwapTool::new(client());
        let args = json!({"inputToken": "USDC", "outputToken": "XLM", "inputAmount": "12"});

        assert!(tool.invoke(structured(args.clone())).await.is_err());

        let output = tool.invoke(with_wallet(args, "GWALLET")).await.unwrap().into_value();
        assert_eq!(output["swap"]["status"], "pending");
        assert_eq!(output["swap"]["outputAmount"], "99.7");
    }

    #[tokio::test]
    async fn test_swap_history_uses_caller_wallet() {
        let tool = GetSwapHistoryTool::new(client());
        let output = tool.invoke(with_wallet(json!({}), "GWALLET")).await.unwrap().into_value();
        assert_eq!(output["history"], json!([]));

        assert!(tool.invoke(structured(json!({}))).await.is_err());
    }

    #[tokio::test]
    async fn test_swap_status_and_send() {
        let status = GetSwapStatusTool::new(client())
            .invoke(ToolInput::Text("0xdeadbeef".into()))
            .await
            .unwrap()
            .into_value();
        assert_eq!(status["status"]["status"], "completed");
        assert_eq!(status["status"]["hash"], "0xdeadbeef");

        let sent = SendTransactionTool::new(client())
            .invoke(structured(json!({"signedXdr": "AAAA", "launchtube": true})))
            .await
            .unwrap()
            .into_value();
        assert_eq!(sent["result"]["launchtube"], true);
    }
}
