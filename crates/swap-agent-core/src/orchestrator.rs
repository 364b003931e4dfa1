//! Orchestration Loop
//!
//! Drives rounds of decide → dispatch → append until the model answers or
//! the round budget runs out:
//!
//! ```text
//! AwaitingDecision ──ToolRequest(non-empty)──▶ ToolsRequested
//!        ▲                                          │
//!        └──────────── results appended ────────────┘
//! AwaitingDecision ──FinalAnswer / ToolRequest([]) / round limit / model failure──▶ Answered
//! ```
//!
//! Every path ends in `Answered`; the caller always gets a
//! [`ConversationOutcome`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::dispatch::{ToolDispatcher, result_messages};
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::model::{Decision, ModelClient, RequestedCall, decide_with_retry};
use crate::state::ConversationState;
use crate::tool::{CallerContext, Tool, ToolCall, ToolRegistry};

/// Answer used when the model ends the conversation without any text
pub const NO_RESPONSE_GENERATED: &str = "No response generated";

/// Why the loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model produced a final answer (or asked for no tools)
    Answered,
    /// The round budget ran out while the model kept requesting tools
    RoundLimit,
    /// The model could not be reached, even after a retry
    ModelFailure,
}

/// Result of one conversation request
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationOutcome {
    /// Never empty
    pub final_answer: String,

    /// Every tool call of every round, each with its result
    pub tool_call_trace: Vec<ToolCall>,

    /// Full transcript, ending with the final assistant message
    pub messages: Vec<Message>,

    /// Model rounds used
    pub rounds: usize,

    pub termination: Termination,
}

enum LoopState {
    AwaitingDecision,
    ToolsRequested,
    Answered(Termination),
}

/// The tool-calling agent
///
/// Holds only shared, read-only collaborators; each call to
/// [`Agent::run_conversation`] owns its own [`ConversationState`], so one
/// agent serves any number of concurrent requests.
pub struct Agent {
    model: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            model,
            dispatcher: ToolDispatcher::new(tools, config.tool_timeout()),
            config,
        })
    }

    /// Run one chat request to completion
    pub async fn run_conversation(
        &self,
        user_message: impl Into<String>,
        history: Vec<Message>,
        context: &CallerContext,
    ) -> ConversationOutcome {
        let mut state = ConversationState::seed(history, user_message);
        let catalog = self.dispatcher.registry().catalog();
        let policy = self.config.model_policy();

        let mut trace: Vec<ToolCall> = Vec::new();
        let mut rounds = 0;
        let mut failure: Option<AgentError> = None;
        let mut phase = LoopState::AwaitingDecision;

        let termination = loop {
            phase = match phase {
                LoopState::AwaitingDecision => {
                    if rounds >= self.config.max_rounds {
                        tracing::warn!(
                            max_rounds = self.config.max_rounds,
                            tool_calls = trace.len(),
                            "Round limit reached, forcing an answer"
                        );
                        LoopState::Answered(Termination::RoundLimit)
                    } else {
                        rounds += 1;
                        tracing::debug!(round = rounds, messages = state.len(), "Awaiting decision");
                        match decide_with_retry(self.model.as_ref(), state.snapshot(), &catalog, policy).await {
                            Ok(Decision::ToolRequest(calls)) if !calls.is_empty() => {
                                let calls = assign_call_ids(calls);
                                tracing::debug!(round = rounds, calls = calls.len(), "Tools requested");
                                state.replace_pending_tool_calls(calls);
                                LoopState::ToolsRequested
                            }
                            Ok(Decision::ToolRequest(_)) => LoopState::Answered(Termination::Answered),
                            Ok(Decision::FinalAnswer(text)) => {
                                state.set_final_answer(text);
                                LoopState::Answered(Termination::Answered)
                            }
                            Err(e) => {
                                tracing::error!(round = rounds, error = %e, "Model call failed");
                                failure = Some(e);
                                LoopState::Answered(Termination::ModelFailure)
                            }
                        }
                    }
                }
                LoopState::ToolsRequested => {
                    let calls = state.take_pending_tool_calls();
                    let completed = self.dispatcher.execute(calls, context).await;
                    state.append(result_messages(&completed));
                    trace.extend(completed);
                    LoopState::AwaitingDecision
                }
                LoopState::Answered(termination) => break termination,
            };
        };

        let final_answer = match (termination, failure) {
            (Termination::ModelFailure, Some(e)) => e.user_message(),
            (Termination::RoundLimit, _) => state
                .final_answer()
                .map_or_else(|| self.config.unable_to_complete.clone(), str::to_string),
            _ => state
                .final_answer()
                .unwrap_or(NO_RESPONSE_GENERATED)
                .to_string(),
        };
        state.set_final_answer(final_answer.clone());
        state.append([Message::assistant(final_answer.clone())]);

        tracing::info!(
            rounds,
            tool_calls = trace.len(),
            termination = ?termination,
            "Conversation finished"
        );

        ConversationOutcome {
            final_answer,
            tool_call_trace: trace,
            messages: state.into_messages(),
            rounds,
            termination,
        }
    }

    /// Run with a single question and no history
    pub async fn ask(&self, question: &str) -> ConversationOutcome {
        self.run_conversation(question, Vec::new(), &CallerContext::default())
            .await
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Get configuration
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

/// Keep model-supplied ids that are unique within the round, synthesize the rest
fn assign_call_ids(calls: Vec<RequestedCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            let id = call
                .id
                .take()
                .filter(|id| !id.trim().is_empty() && !seen.contains(id))
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            seen.insert(id.clone());
            call.into_tool_call(id)
        })
        .collect()
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    model: Option<Arc<dyn ModelClient>>,
    tools: ToolRegistry,
    config: OrchestratorConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            tools: ToolRegistry::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn max_rounds(mut self, max: usize) -> Self {
        self.config.max_rounds = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let model = self
            .model
            .ok_or_else(|| AgentError::Config("Model client is required".into()))?;

        Agent::new(model, Arc::new(self.tools), self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::model::CallArguments;
    use crate::tool::{ParameterSchema, ToolArgs, ToolDescriptor, ToolInput, ToolOutput, ToolSchema};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned decisions and records how many messages it was shown
    struct ScriptedModel {
        script: Mutex<VecDeque<Result<Decision>>>,
        seen: Mutex<Vec<Vec<Message>>>,
        repeat: Option<Decision>,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<Decision>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
                repeat: None,
            }
        }

        fn forever(decision: Decision) -> Self {
            Self {
                repeat: Some(decision),
                ..Self::new(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn decide(&self, snapshot: &[Message], _: &[ToolDescriptor]) -> Result<Decision> {
            self.seen.lock().unwrap().push(snapshot.to_vec());
            if let Some(decision) = &self.repeat {
                return Ok(decision.clone());
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Decision::FinalAnswer("script exhausted".into())))
        }
    }

    /// Multiplies `a` by `b`
    struct MultiplyTool;

    #[async_trait]
    impl Tool for MultiplyTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "multiply".into(),
                description: "Multiply two integers".into(),
                parameters: vec![
                    ParameterSchema::required("a", "number", "Left operand"),
                    ParameterSchema::required("b", "number", "Right operand"),
                ],
                category: Some("math".into()),
                has_side_effects: false,
                accepts_structured_args: true,
                needs_caller_context: false,
            }
        }

        async fn invoke(&self, input: ToolInput) -> Result<ToolOutput> {
            let args = input.args().cloned().unwrap_or_default();
            let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
            let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
            if a == 13 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(ToolOutput::text(format!("Result: {}", a * b)))
        }
    }

    fn multiply(a: i64, b: i64) -> RequestedCall {
        RequestedCall::new("multiply", serde_json::from_value(json!({"a": a, "b": b})).unwrap())
    }

    fn agent(model: Arc<ScriptedModel>, max_rounds: usize) -> Agent {
        AgentBuilder::new()
            .model(model)
            .tool(MultiplyTool)
            .max_rounds(max_rounds)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Decision::ToolRequest(vec![multiply(15, 23)])),
            Ok(Decision::FinalAnswer("15 * 23 = 345".into())),
        ]));
        let outcome = agent(model.clone(), 5).ask("What is 15 * 23?").await;

        assert_eq!(outcome.final_answer, "15 * 23 = 345");
        assert_eq!(outcome.termination, Termination::Answered);
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.tool_call_trace.len(), 1);
        assert_eq!(outcome.tool_call_trace[0].result, Some(json!("Result: 345")));

        // the second decision saw the tool result
        let seen = model.seen.lock().unwrap();
        let last = seen[1].last().unwrap();
        assert_eq!(last.role, Role::ToolResult);
        assert_eq!(last.content, "Tool multiply result: Result: 345");
        assert_eq!(last.related_tool_call_id.as_deref(), Some(outcome.tool_call_trace[0].id.as_str()));

        let roles: Vec<_> = outcome.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::ToolResult, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_empty_tool_request_answers_without_dispatch() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(Decision::ToolRequest(Vec::new()))]));
        let outcome = agent(model.clone(), 5).ask("hello").await;

        assert_eq!(outcome.termination, Termination::Answered);
        assert!(outcome.tool_call_trace.is_empty());
        assert_eq!(outcome.final_answer, NO_RESPONSE_GENERATED);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_data() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Decision::ToolRequest(vec![RequestedCall::new("teleport", ToolArgs::new())])),
            Ok(Decision::FinalAnswer("I can't do that.".into())),
        ]));
        let outcome = agent(model, 5).ask("teleport me").await;

        assert_eq!(outcome.final_answer, "I can't do that.");
        assert!(outcome.tool_call_trace[0].is_error());
        let tool_msg = outcome
            .messages
            .iter()
            .find(|m| m.role == Role::ToolResult)
            .unwrap();
        assert!(tool_msg.content.contains("Error: Tool not found: teleport"));
    }

    #[tokio::test]
    async fn test_round_limit_bounds_trace() {
        let model = Arc::new(ScriptedModel::forever(Decision::ToolRequest(vec![
            multiply(1, 2),
            multiply(3, 4),
        ])));
        let outcome = agent(model.clone(), 3).ask("loop forever").await;

        assert_eq!(outcome.termination, Termination::RoundLimit);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.tool_call_trace.len(), 3 * 2);
        assert_eq!(outcome.final_answer, crate::config::UNABLE_TO_COMPLETE);
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_model_failure_after_retry_is_answered() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(AgentError::ProviderUnavailable("connection refused".into())),
            Err(AgentError::ProviderUnavailable("connection refused".into())),
        ]));
        let outcome = agent(model.clone(), 5).ask("hi").await;

        assert_eq!(outcome.termination, Termination::ModelFailure);
        assert!(outcome.final_answer.starts_with("Sorry"));
        assert_eq!(model.calls(), 2);
        assert_eq!(outcome.messages.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(AgentError::RateLimited("slow down".into())),
            Ok(Decision::FinalAnswer("Hello!".into())),
        ]));
        let outcome = agent(model, 5).ask("hi").await;
        assert_eq!(outcome.termination, Termination::Answered);
        assert_eq!(outcome.final_answer, "Hello!");
    }

    #[tokio::test]
    async fn test_results_follow_request_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Decision::ToolRequest(vec![
                multiply(13, 1).with_id("slow"),
                multiply(2, 2).with_id("fast"),
            ])),
            Ok(Decision::FinalAnswer("done".into())),
        ]));
        let outcome = agent(model, 5).ask("two things").await;

        let related: Vec<_> = outcome
            .messages
            .iter()
            .filter_map(|m| m.related_tool_call_id.as_deref())
            .collect();
        assert_eq!(related, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_call_ids_synthesized_and_unique() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Decision::ToolRequest(vec![
                multiply(1, 1).with_id("dup"),
                multiply(2, 2).with_id("dup"),
                multiply(3, 3),
            ])),
            Ok(Decision::FinalAnswer("ok".into())),
        ]));
        let outcome = agent(model, 5).ask("ids").await;

        let ids: HashSet<_> = outcome.tool_call_trace.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(outcome.tool_call_trace[0].id, "dup");
    }

    #[tokio::test]
    async fn test_malformed_arguments_recorded_and_loop_continues() {
        let bad = RequestedCall {
            id: Some("bad".into()),
            name: "multiply".into(),
            arguments: CallArguments::from_json_str("{\"a\": 1,"),
        };
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Decision::ToolRequest(vec![bad])),
            Ok(Decision::FinalAnswer("Could you rephrase?".into())),
        ]));
        let outcome = agent(model, 5).ask("multiply").await;

        assert_eq!(outcome.termination, Termination::Answered);
        assert!(outcome.tool_call_trace[0].is_error());
    }

    #[tokio::test]
    async fn test_pure_tool_is_idempotent_across_rounds() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(Decision::ToolRequest(vec![multiply(6, 7)])),
            Ok(Decision::ToolRequest(vec![multiply(6, 7)])),
            Ok(Decision::FinalAnswer("42".into())),
        ]));
        let outcome = agent(model, 5).ask("twice").await;

        assert_eq!(outcome.tool_call_trace.len(), 2);
        assert_eq!(outcome.tool_call_trace[0].result, outcome.tool_call_trace[1].result);
    }

    #[tokio::test]
    async fn test_history_is_forwarded() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(Decision::FinalAnswer("Sure".into()))]));
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let outcome = agent(model.clone(), 5)
            .run_conversation("and now?", history, &CallerContext::default())
            .await;

        assert_eq!(model.seen.lock().unwrap()[0].len(), 3);
        assert_eq!(outcome.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let model = Arc::new(ScriptedModel::forever(Decision::FinalAnswer("pong".into())));
        let agent = Arc::new(agent(model, 5));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let agent = Arc::clone(&agent);
                tokio::spawn(async move { agent.ask(&format!("ping {i}")).await })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.messages.len(), 2);
            assert_eq!(outcome.final_answer, "pong");
        }
    }

    #[test]
    fn test_builder_requires_model() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        assert!(AgentBuilder::new().model(model).max_rounds(0).build().is_err());
    }
}
