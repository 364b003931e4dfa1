//! # swap-agent-core
//!
//! Tool-calling orchestration loop behind the Soroswap chat assistant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Agent                               │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ Orchestration│──▶│ ModelClient  │   │  ConversationState   │  │
//! │  │     Loop     │   │  (Strategy)  │   │ (append-only, per    │  │
//! │  │              │──▶│ ToolDispatch │──▶│  request)            │  │
//! │  └──────────────┘   └──────┬───────┘   └──────────────────────┘  │
//! │                            ▼                                     │
//! │                     ToolRegistry (closed, read-only)             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ModelClient` trait hides whether the backend does native function
//! calling or speaks the fenced-block protocol through an `LlmProvider`.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod state;
pub mod tool;

pub use config::OrchestratorConfig;
pub use dispatch::ToolDispatcher;
pub use error::{AgentError, Result};
pub use message::{Message, Role};
pub use model::{CallArguments, Decision, ModelClient, RequestedCall};
pub use orchestrator::{Agent, AgentBuilder, ConversationOutcome, Termination};
pub use prompt::PromptedModelClient;
pub use provider::{GenerationOptions, LlmProvider};
pub use state::ConversationState;
pub use tool::{
    CallerContext, ParameterSchema, Tool, ToolArgs, ToolCall, ToolDescriptor, ToolInput,
    ToolOutput, ToolRegistry, ToolSchema,
};
