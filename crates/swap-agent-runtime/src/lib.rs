//! # swap-agent-runtime
//!
//! Model backends for the Soroswap chat agent.
//!
//! ## Backends
//!
//! - **Ollama** (default): local inference, tools requested through the
//!   fenced-block protocol via [`swap_agent_core::PromptedModelClient`]
//! - **OpenAI-compatible**: native function calling against any
//!   `/chat/completions` endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swap_agent_runtime::{OllamaConfig, OllamaProvider, PromptedModelClient};
//!
//! let config = OllamaConfig::from_env()?;
//! let provider = Arc::new(OllamaProvider::new(&config));
//! let model = PromptedModelClient::new(provider, config.generation_options());
//! let agent = AgentBuilder::new()
//!     .model(Arc::new(model))
//!     .tools(registry)
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiModelClient};

// Re-export core types for convenience
pub use swap_agent_core::{
    Agent, AgentError, GenerationOptions, LlmProvider, Message, ModelClient, PromptedModelClient,
    Result, Role, Tool, ToolRegistry,
};
