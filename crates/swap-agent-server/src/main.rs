//! Soroswap chat agent HTTP server
//!
//! Axum server exposing the tool-calling agent over REST. The model backend
//! is picked with `MODEL_PROVIDER` (`ollama` by default, or `openai`); the
//! Soroswap tools run against the live API when `SOROSWAP_API_KEY` is set
//! and against the mock client otherwise.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soroswap_tools::{SoroswapConfig, default_registry};
use swap_agent_core::{Agent, LlmProvider, ModelClient, OrchestratorConfig, PromptedModelClient};
use swap_agent_runtime::{OllamaConfig, OllamaProvider, OpenAiModelClient};

use crate::handlers::{chat_handler, health_check, list_tools};
use crate::state::AppState;

/// Selected model backend
struct Backend {
    name: &'static str,
    model: Arc<dyn ModelClient>,
    provider: Option<Arc<dyn LlmProvider>>,
}

async fn select_backend() -> anyhow::Result<Backend> {
    let choice = std::env::var("MODEL_PROVIDER").unwrap_or_else(|_| "ollama".into());

    match choice.trim().to_lowercase().as_str() {
        "openai" => {
            let client = OpenAiModelClient::from_env()?;
            tracing::info!("✓ Using OpenAI-compatible backend ({})", client.name());
            Ok(Backend {
                name: "openai",
                model: Arc::new(client),
                provider: None,
            })
        }
        "ollama" => {
            let config = OllamaConfig::from_env()?;
            let provider = Arc::new(OllamaProvider::new(&config));

            match provider.health_check().await {
                Ok(true) => {
                    tracing::info!("✓ Connected to Ollama at {}:{}", config.host, config.port);
                    if let Ok(models) = provider.list_models().await {
                        if !models.iter().any(|m| m.starts_with(&config.model)) {
                            tracing::warn!("⚠ Model '{}' is not pulled (available: {})", config.model, models.join(", "));
                        }
                    }
                }
                Ok(false) | Err(_) => {
                    tracing::warn!("⚠ Ollama not available - chat requests will fail");
                    tracing::warn!("  Make sure Ollama is running: ollama serve");
                }
            }

            Ok(Backend {
                name: "ollama",
                model: Arc::new(PromptedModelClient::new(provider.clone(), config.generation_options())),
                provider: Some(provider),
            })
        }
        other => anyhow::bail!("unknown MODEL_PROVIDER '{other}' (expected 'ollama' or 'openai')"),
    }
}

pub(crate) fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = OrchestratorConfig::from_env()?;
    tracing::info!(
        max_rounds = config.max_rounds,
        model_timeout_secs = config.model_timeout_secs,
        tool_timeout_secs = config.tool_timeout_secs,
        "Orchestrator configured"
    );

    let backend = select_backend().await?;

    // Soroswap client and tools
    let soroswap = SoroswapConfig::from_env()?.connect()?;
    let network = soroswap.network().to_string();
    let tools = default_registry(soroswap);

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let agent = Agent::new(backend.model, Arc::new(tools), config)?;

    let state = AppState {
        agent: Arc::new(agent),
        backend: backend.name.into(),
        provider: backend.provider,
        network: network.into(),
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 swap-agent server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health     - Health check");
    tracing::info!("  GET  /api/tools  - Tool catalog");
    tracing::info!("  POST /api/chat   - Send message");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
