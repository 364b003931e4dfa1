//! Application State

use std::sync::Arc;

use swap_agent_core::{Agent, LlmProvider};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator with the model backend and tool registry
    pub agent: Arc<Agent>,

    /// Model backend label for health output ("ollama", "openai")
    pub backend: Arc<str>,

    /// Text-completion provider, when the backend has one to health-check
    pub provider: Option<Arc<dyn LlmProvider>>,

    /// Soroswap network the tools talk to
    pub network: Arc<str>,
}
