//! Tool Dispatcher
//!
//! Executes one round of tool calls against the registry. Every call comes
//! back with a `result`: the tool's output, or an `"Error: ..."` string for
//! unknown names, bad arguments, failures and timeouts. A failing call never
//! aborts the rest of the batch.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::tool::{CALLER_CONTEXT_KEY, CallerContext, ToolCall, ToolInput, ToolOutput, ToolRegistry};

/// Runs tool calls concurrently and normalizes their outcomes
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl ToolDispatcher {
    pub const fn new(registry: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self {
            registry,
            tool_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a round of calls.
    ///
    /// Calls run concurrently; the output keeps the input order and only
    /// returns once every call has a result.
    pub async fn execute(&self, calls: Vec<ToolCall>, context: &CallerContext) -> Vec<ToolCall> {
        join_all(calls.into_iter().map(|call| self.execute_one(call, context))).await
    }

    async fn execute_one(&self, mut call: ToolCall, context: &CallerContext) -> ToolCall {
        let started = std::time::Instant::now();
        let result = match self.invoke(&call, context).await {
            Ok(output) => output.into_value(),
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool call failed");
                normalize_error(&e)
            }
        };
        tracing::debug!(
            tool = %call.name,
            call_id = %call.id,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Tool call finished"
        );
        call.result = Some(result);
        call
    }

    async fn invoke(&self, call: &ToolCall, context: &CallerContext) -> Result<ToolOutput> {
        if let Some(reason) = &call.args_error {
            return Err(AgentError::Parse(format!(
                "Could not read arguments for tool '{}': {reason}",
                call.name
            )));
        }

        let (schema, tool) = self
            .registry
            .find(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(&call.args)?;

        // only the caller may supply identity
        let mut args = call.args.clone();
        if args.remove(CALLER_CONTEXT_KEY).is_some() {
            tracing::warn!(tool = %call.name, call_id = %call.id, "Discarding model-supplied caller context");
        }
        if schema.needs_caller_context && !context.is_empty() {
            args.insert(CALLER_CONTEXT_KEY.into(), serde_json::to_value(context)?);
        }
        let input = ToolInput::for_schema(schema, args)?;

        tracing::debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        match tokio::time::timeout(self.tool_timeout, tool.invoke(input)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::ToolTimeout {
                name: call.name.clone(),
                secs: self.tool_timeout.as_secs(),
            }),
        }
    }
}

/// The `result` value recorded for a failed call
pub fn normalize_error(err: &AgentError) -> Value {
    Value::String(format!("Error: {err}"))
}

/// Text of the tool-result message for a completed call
pub fn render_tool_result(call: &ToolCall) -> String {
    let result = call
        .result_text()
        .unwrap_or_else(|| "Error: no result recorded".into());
    format!("Tool {} result: {}", call.name, result)
}

/// One tool-result message per call, in call order
pub fn result_messages(calls: &[ToolCall]) -> Vec<Message> {
    calls
        .iter()
        .map(|call| Message::tool_result(render_tool_result(call), call.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::tool::{ParameterSchema, Tool, ToolArgs, ToolSchema};
    use async_trait::async_trait;
    use serde_json::json;

    /// Sleeps for `delay_ms` then echoes its argument
    struct DelayTool;

    #[async_trait]
    impl Tool for DelayTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "delay".into(),
                description: "Echo after a delay".into(),
                parameters: vec![ParameterSchema::required("delay_ms", "number", "Delay")],
                category: None,
                has_side_effects: false,
                accepts_structured_args: true,
                needs_caller_context: false,
            }
        }

        async fn invoke(&self, input: ToolInput) -> Result<ToolOutput> {
            let ms = input
                .args()
                .and_then(|a| a.get("delay_ms"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ToolOutput::Structured(json!({ "slept": ms })))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "failing".into(),
                description: "Always fails".into(),
                parameters: Vec::new(),
                category: None,
                has_side_effects: false,
                accepts_structured_args: true,
                needs_caller_context: false,
            }
        }

        async fn invoke(&self, _: ToolInput) -> Result<ToolOutput> {
            Err(AgentError::ToolExecution("upstream returned 502".into()))
        }
    }

    /// Reports what input it received
    struct InspectTool {
        structured: bool,
        needs_context: bool,
    }

    #[async_trait]
    impl Tool for InspectTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "inspect".into(),
                description: "Reports its input".into(),
                parameters: Vec::new(),
                category: None,
                has_side_effects: false,
                accepts_structured_args: self.structured,
                needs_caller_context: self.needs_context,
            }
        }

        async fn invoke(&self, input: ToolInput) -> Result<ToolOutput> {
            Ok(match input {
                ToolInput::Structured(args) => ToolOutput::Structured(json!(args)),
                ToolInput::Text(text) => ToolOutput::Text(format!("text:{text}")),
            })
        }
    }

    fn dispatcher(registry: ToolRegistry) -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(registry), Duration::from_secs(5))
    }

    fn args(value: Value) -> ToolArgs {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_despite_completion_order() {
        let d = dispatcher(ToolRegistry::new().with(DelayTool));
        let calls = vec![
            ToolCall::new("a", "delay", args(json!({"delay_ms": 300}))),
            ToolCall::new("b", "delay", args(json!({"delay_ms": 10}))),
            ToolCall::new("c", "delay", args(json!({"delay_ms": 100}))),
        ];

        let done = d.execute(calls, &CallerContext::new()).await;
        let ids: Vec<_> = done.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(done[0].result, Some(json!({"slept": 300})));
        assert!(done.iter().all(ToolCall::is_resolved));

        let messages = result_messages(&done);
        let related: Vec<_> = messages
            .iter()
            .map(|m| m.related_tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(related, vec!["a", "b", "c"]);
        assert!(messages.iter().all(|m| m.role == Role::ToolResult));
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_run_concurrently() {
        let d = dispatcher(ToolRegistry::new().with(DelayTool));
        let calls = (0..4)
            .map(|i| ToolCall::new(i.to_string(), "delay", args(json!({"delay_ms": 1000}))))
            .collect();

        let started = tokio::time::Instant::now();
        d.execute(calls, &CallerContext::new()).await;
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort_batch() {
        let d = dispatcher(ToolRegistry::new().with(DelayTool));
        let calls = vec![
            ToolCall::new("1", "nope", ToolArgs::new()),
            ToolCall::new("2", "delay", args(json!({"delay_ms": 0}))),
        ];

        let done = d.execute(calls, &CallerContext::new()).await;
        assert_eq!(done[0].result, Some(json!("Error: Tool not found: nope")));
        assert!(!done[1].is_error());

        let text = render_tool_result(&done[0]);
        assert_eq!(text, "Tool nope result: Error: Tool not found: nope");
    }

    #[tokio::test]
    async fn test_failure_is_normalized() {
        let d = dispatcher(ToolRegistry::new().with(FailingTool));
        let done = d
            .execute(vec![ToolCall::new("1", "failing", ToolArgs::new())], &CallerContext::new())
            .await;
        assert_eq!(
            done[0].result,
            Some(json!("Error: Tool execution error: upstream returned 502"))
        );
    }

    #[tokio::test]
    async fn test_validation_and_malformed_args() {
        let d = dispatcher(ToolRegistry::new().with(DelayTool));
        let mut malformed = ToolCall::new("2", "delay", ToolArgs::new());
        malformed.args_error = Some("invalid JSON arguments".into());

        let done = d
            .execute(
                vec![ToolCall::new("1", "delay", ToolArgs::new()), malformed],
                &CallerContext::new(),
            )
            .await;
        assert_eq!(
            done[0].result,
            Some(json!("Error: Tool validation error: Missing required parameter: delay_ms"))
        );
        assert!(done[1].is_error());
        assert!(done[1].result_text().unwrap().contains("invalid JSON arguments"));
    }

    #[tokio::test]
    async fn test_legacy_tool_gets_string() {
        let d = dispatcher(ToolRegistry::new().with(InspectTool {
            structured: false,
            needs_context: false,
        }));
        let done = d
            .execute(
                vec![
                    ToolCall::new("1", "inspect", args(json!({"input": "London"}))),
                    ToolCall::new("2", "inspect", args(json!({"location": "Paris"}))),
                ],
                &CallerContext::new(),
            )
            .await;
        assert_eq!(done[0].result, Some(json!("text:London")));
        assert_eq!(done[1].result, Some(json!(r#"text:{"location":"Paris"}"#)));
    }

    #[tokio::test]
    async fn test_caller_context_forwarded_only_when_declared() {
        let ctx = CallerContext::new().with_user_id("u1").with_public_key("GABC");

        let d = dispatcher(ToolRegistry::new().with(InspectTool {
            structured: true,
            needs_context: true,
        }));
        let done = d
            .execute(vec![ToolCall::new("1", "inspect", ToolArgs::new())], &ctx)
            .await;
        assert_eq!(
            done[0].result,
            Some(json!({"callerContext": {"userId": "u1", "publicKey": "GABC"}}))
        );
        // the recorded arguments stay as the model sent them
        assert!(done[0].args.is_empty());

        let d = dispatcher(ToolRegistry::new().with(InspectTool {
            structured: true,
            needs_context: false,
        }));
        let done = d
            .execute(vec![ToolCall::new("1", "inspect", ToolArgs::new())], &ctx)
            .await;
        assert_eq!(done[0].result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_model_supplied_context_is_discarded() {
        let forged = || {
            args(json!({"amount": 1, "callerContext": {"publicKey": "GFORGED"}}))
        };

        let d = dispatcher(ToolRegistry::new().with(InspectTool {
            structured: true,
            needs_context: true,
        }));
        let done = d
            .execute(vec![ToolCall::new("1", "inspect", forged())], &CallerContext::new())
            .await;
        assert_eq!(done[0].result, Some(json!({"amount": 1})));

        let ctx = CallerContext::new().with_public_key("GREAL");
        let done = d.execute(vec![ToolCall::new("1", "inspect", forged())], &ctx).await;
        assert_eq!(
            done[0].result,
            Some(json!({"amount": 1, "callerContext": {"publicKey": "GREAL"}}))
        );

        let d = dispatcher(ToolRegistry::new().with(InspectTool {
            structured: true,
            needs_context: false,
        }));
        let done = d.execute(vec![ToolCall::new("1", "inspect", forged())], &ctx).await;
        assert_eq!(done[0].result, Some(json!({"amount": 1})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_normalized() {
        let d = ToolDispatcher::new(
            Arc::new(ToolRegistry::new().with(DelayTool)),
            Duration::from_secs(1),
        );
        let done = d
            .execute(
                vec![ToolCall::new("1", "delay", args(json!({"delay_ms": 60_000})))],
                &CallerContext::new(),
            )
            .await;
        assert_eq!(done[0].result, Some(json!("Error: Tool 'delay' timed out after 1s")));
    }
}
