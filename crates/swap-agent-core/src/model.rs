//! Model Client
//!
//! Boundary over "ask the model for the next action". A client sees the full
//! conversation snapshot and the tool catalog on every call and answers with
//! exactly one [`Decision`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::tool::{ToolArgs, ToolCall, ToolDescriptor};

/// The model's output for one round
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    /// Terminal for the round, no tools requested
    FinalAnswer(String),
    /// Tool calls to dispatch next
    ToolRequest(Vec<RequestedCall>),
}

impl Decision {
    /// Resolve raw model output into one authoritative decision.
    ///
    /// Tool requests take precedence: text that arrives alongside them is
    /// discarded for the round.
    pub fn resolve(text: Option<String>, calls: Vec<RequestedCall>) -> Self {
        if calls.is_empty() {
            return Self::FinalAnswer(text.unwrap_or_default());
        }
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            tracing::debug!(
                discarded_chars = text.len(),
                calls = calls.len(),
                "Discarding text that accompanied tool calls"
            );
        }
        Self::ToolRequest(calls)
    }
}

/// A tool invocation as requested by the model
#[derive(Clone, Debug, PartialEq)]
pub struct RequestedCall {
    /// Model-assigned id, if any
    pub id: Option<String>,
    pub name: String,
    pub arguments: CallArguments,
}

impl RequestedCall {
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments: CallArguments::Parsed(args),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Convert into a dispatchable call under the given id
    pub fn into_tool_call(self, id: String) -> ToolCall {
        match self.arguments {
            CallArguments::Parsed(args) => ToolCall::new(id, self.name, args),
            CallArguments::Malformed { raw, reason } => {
                let mut call = ToolCall::new(id, self.name, ToolArgs::new());
                call.args_error = Some(format!("{reason} (raw arguments: {raw})"));
                call
            }
        }
    }
}

/// Arguments as they came back from the model
#[derive(Clone, Debug, PartialEq)]
pub enum CallArguments {
    Parsed(ToolArgs),
    /// Could not be interpreted as an argument map
    Malformed { raw: String, reason: String },
}

impl CallArguments {
    /// Parse a JSON-encoded argument object. Blank input means no arguments.
    pub fn from_json_str(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Parsed(ToolArgs::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(value),
            Err(e) => Self::Malformed {
                raw: raw.to_string(),
                reason: format!("invalid JSON arguments: {e}"),
            },
        }
    }

    /// Interpret an already-decoded value
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Parsed(map.into_iter().collect()),
            Value::Null => Self::Parsed(ToolArgs::new()),
            other => Self::Malformed {
                raw: other.to_string(),
                reason: "arguments must be a JSON object".into(),
            },
        }
    }
}

/// Strategy trait for deciding the next action
///
/// Implementations are stateless between calls and must not run tools.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn decide(&self, snapshot: &[Message], catalog: &[ToolDescriptor]) -> Result<Decision>;

    /// Name used in logs
    fn name(&self) -> &str {
        "model"
    }
}

/// Time budget and retry count for one model decision
#[derive(Clone, Copy, Debug)]
pub struct ModelCallPolicy {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for ModelCallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retries: 1,
        }
    }
}

/// Ask the model for a decision, retrying transient failures.
///
/// A call that exceeds the timeout counts as a transient failure.
pub async fn decide_with_retry(
    client: &dyn ModelClient,
    snapshot: &[Message],
    catalog: &[ToolDescriptor],
    policy: ModelCallPolicy,
) -> Result<Decision> {
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, client.decide(snapshot, catalog)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::ProviderUnavailable(format!(
                "{} did not answer within {}s",
                client.name(),
                policy.timeout.as_secs()
            ))),
        };

        match outcome {
            Err(e) if e.is_retryable() && attempt < policy.retries => {
                attempt += 1;
                tracing::warn!(model = client.name(), attempt, error = %e, "Retrying model call");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyClient {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> AgentError,
    }

    #[async_trait]
    impl ModelClient for FlakyClient {
        async fn decide(&self, _: &[Message], _: &[ToolDescriptor]) -> Result<Decision> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(Decision::FinalAnswer("ok".into()))
            }
        }
    }

    struct SlowClient;

    #[async_trait]
    impl ModelClient for SlowClient {
        async fn decide(&self, _: &[Message], _: &[ToolDescriptor]) -> Result<Decision> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Decision::FinalAnswer("late".into()))
        }
    }

    fn flaky(failures: usize, error: fn() -> AgentError) -> FlakyClient {
        FlakyClient {
            calls: AtomicUsize::new(0),
            failures,
            error,
        }
    }

    #[test]
    fn test_tool_request_takes_precedence() {
        let call = RequestedCall::new("calculator", ToolArgs::new());
        let decision = Decision::resolve(Some("Let me check.".into()), vec![call.clone()]);
        assert_eq!(decision, Decision::ToolRequest(vec![call]));

        let decision = Decision::resolve(Some("Hi!".into()), Vec::new());
        assert_eq!(decision, Decision::FinalAnswer("Hi!".into()));
    }

    #[test]
    fn test_argument_parsing() {
        assert!(matches!(
            CallArguments::from_json_str(r#"{"expression": "15*23"}"#),
            CallArguments::Parsed(args) if args["expression"] == json!("15*23")
        ));
        assert_eq!(CallArguments::from_json_str(""), CallArguments::Parsed(ToolArgs::new()));
        assert!(matches!(
            CallArguments::from_json_str("{not json"),
            CallArguments::Malformed { .. }
        ));
        assert!(matches!(
            CallArguments::from_value(json!([1, 2])),
            CallArguments::Malformed { .. }
        ));
    }

    #[test]
    fn test_malformed_call_conversion() {
        let call = RequestedCall {
            id: None,
            name: "get_quote".into(),
            arguments: CallArguments::from_json_str("{oops"),
        }
        .into_tool_call("c1".into());

        assert_eq!(call.id, "c1");
        assert!(call.args.is_empty());
        assert!(call.args_error.unwrap().contains("{oops"));
    }

    #[tokio::test]
    async fn test_retries_once_on_transient_error() {
        let client = flaky(1, || AgentError::RateLimited("429".into()));
        let decision = decide_with_retry(&client, &[], &[], ModelCallPolicy::default()).await;
        assert_eq!(decision.unwrap(), Decision::FinalAnswer("ok".into()));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_surfaces() {
        let client = flaky(2, || AgentError::ProviderUnavailable("down".into()));
        let decision = decide_with_retry(&client, &[], &[], ModelCallPolicy::default()).await;
        assert!(matches!(decision, Err(AgentError::ProviderUnavailable(_))));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let client = flaky(1, || AgentError::Auth("bad key".into()));
        let decision = decide_with_retry(&client, &[], &[], ModelCallPolicy::default()).await;
        assert!(matches!(decision, Err(AgentError::Auth(_))));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient() {
        let policy = ModelCallPolicy {
            timeout: Duration::from_secs(5),
            retries: 1,
        };
        let decision = decide_with_retry(&SlowClient, &[], &[], policy).await;
        assert!(matches!(decision, Err(AgentError::ProviderUnavailable(_))));
    }
}
