//! Ollama backend
//!
//! Local models have no native function calling here, so the provider only
//! produces text. Wrap it in a [`swap_agent_core::PromptedModelClient`] to get
//! tool requests out of fenced `tool` blocks.

use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
    models::ModelOptions,
};
use swap_agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, GenerationOptions, LlmProvider, TokenUsage},
};

const DEFAULT_HOST: &str = "http://localhost";
const DEFAULT_PORT: u16 = 11434;

/// Where the Ollama daemon listens and which model to ask
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            model: GenerationOptions::default().model,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST`, `OLLAMA_PORT` and `OLLAMA_MODEL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let port = match lookup("OLLAMA_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AgentError::Config(format!("OLLAMA_PORT must be a port number, got '{raw}'")))?,
            None => defaults.port,
        };
        let non_blank = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());

        Ok(Self {
            host: non_blank("OLLAMA_HOST").unwrap_or(defaults.host),
            port,
            model: non_blank("OLLAMA_MODEL").unwrap_or(defaults.model),
        })
    }

    /// Generation options targeting the configured model
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            ..GenerationOptions::default()
        }
    }
}

/// Text-completion provider backed by a local Ollama daemon
pub struct OllamaProvider {
    client: Ollama,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            client: Ollama::new(config.host.clone(), config.port),
        }
    }

    /// System prompt first, then the transcript
    fn chat_messages(messages: &[Message], system_prompt: Option<&str>) -> Vec<ChatMessage> {
        let system = system_prompt.map(|p| ChatMessage::new(MessageRole::System, p.to_string()));
        system
            .into_iter()
            .chain(messages.iter().map(|m| {
                let role = match m.role {
                    Role::Assistant => MessageRole::Assistant,
                    // rendered tool results read as user context
                    Role::User | Role::ToolResult => MessageRole::User,
                };
                ChatMessage::new(role, m.content.clone())
            }))
            .collect()
    }

    fn completion(response: ChatMessageResponse, model: &str) -> Completion {
        let clamp = |n: u64| u32::try_from(n).unwrap_or(u32::MAX);
        Completion {
            content: response.message.content,
            model: model.to_string(),
            usage: response.final_data.as_ref().map(|d| TokenUsage {
                prompt_tokens: clamp(d.prompt_eval_count),
                completion_tokens: clamp(d.eval_count),
            }),
        }
    }

    fn model_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default()
            .temperature(opts.temperature)
            .top_p(opts.top_p)
            .num_predict(i32::try_from(opts.max_tokens).unwrap_or(i32::MAX));
        if opts.stop_sequences.is_empty() {
            options
        } else {
            options.stop(opts.stop_sequences.clone())
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "Ollama health check failed");
                Ok(false)
            }
        }
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        let request = ChatMessageRequest::new(
            options.model.clone(),
            Self::chat_messages(messages, options.system_prompt.as_deref()),
        )
        .options(Self::model_options(options));

        // daemon down or restarting: retryable
        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        Ok(Self::completion(response, &options.model))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;
        Ok(models.into_iter().map(|m| m.name).collect())
    }
}
