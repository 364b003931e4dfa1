//! OpenAI-compatible chat completions backend
//!
//! Uses native function calling: the tool catalog is sent as `tools` and the
//! reply's `tool_calls` become a [`Decision::ToolRequest`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use swap_agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    model::{CallArguments, Decision, ModelClient, RequestedCall},
    prompt::DEFAULT_SYSTEM_PROMPT,
    tool::ToolDescriptor,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI backend configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            temperature: 0.0,
            max_tokens: 2048,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("OPENAI_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: Option<String>,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Model client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiModelClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiModelClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(OpenAiConfig::from_env()?))
    }

    fn build_request<'a>(&'a self, snapshot: &[Message], catalog: &[ToolDescriptor]) -> ChatRequest<'a> {
        let system = WireMessage {
            role: "system",
            content: self.config.system_prompt.clone(),
        };
        let messages = std::iter::once(system)
            .chain(snapshot.iter().map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    // tool results are replayed as rendered text
                    Role::User | Role::ToolResult => "user",
                },
                content: m.content.clone(),
            }))
            .collect();

        ChatRequest {
            model: &self.config.model,
            messages,
            tools: catalog.iter().map(tool_definition).collect(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

fn tool_definition(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.argument_schema_hint,
        }
    })
}

fn parse_response(response: ChatResponse) -> Result<Decision> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Provider("response contained no choices".into()))?;

    let calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| RequestedCall {
            id: call.id,
            name: call.function.name,
            arguments: CallArguments::from_json_str(&call.function.arguments),
        })
        .collect();

    Ok(Decision::resolve(choice.message.content, calls))
}

fn map_status(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("{status}: {body}");
    match status {
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

fn map_transport(err: &reqwest::Error) -> AgentError {
    if err.is_timeout() || err.is_connect() {
        AgentError::ProviderUnavailable(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

#[async_trait]
impl ModelClient for OpenAiModelClient {
    async fn decide(&self, snapshot: &[Message], catalog: &[ToolDescriptor]) -> Result<Decision> {
        let request = self.build_request(snapshot, catalog);
        tracing::debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Requesting chat completion"
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        let body: ChatResponse = response.json().await.map_err(|e| map_transport(&e))?;
        parse_response(body)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
