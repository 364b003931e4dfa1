//! HTTP Handlers

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use swap_agent_core::{CallerContext, Message, Termination, ToolCall, ToolDescriptor};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: String,
    /// `None` when the backend has no health check
    pub model_connected: Option<bool>,
    pub network: String,
    pub tools: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<Message>,
    /// Authenticated user's id and wallet public key
    #[serde(default)]
    pub context: Option<CallerContext>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub tool_calls: Vec<ToolCall>,
    pub rounds: usize,
    pub termination: Termination,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_connected = match &state.provider {
        Some(provider) => Some(provider.health_check().await.unwrap_or(false)),
        None => None,
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.backend.to_string(),
        model_connected,
        network: state.network.to_string(),
        tools: state.agent.tools().len(),
    })
}

/// Tool catalog as shown to the model
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.agent.tools().catalog())
}

/// Main chat endpoint
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Message is required".into(),
                code: "INVALID_REQUEST".into(),
            }),
        ));
    }

    let context = payload.context.unwrap_or_default();
    tracing::info!(
        user = context.user_id.as_deref().unwrap_or("anonymous"),
        history = payload.history.len(),
        "Chat request"
    );

    let outcome = state
        .agent
        .run_conversation(payload.message, payload.history, &context)
        .await;

    Ok(Json(ChatResponse {
        message: outcome.final_answer,
        tool_calls: outcome.tool_call_trace,
        rounds: outcome.rounds,
        termination: outcome.termination,
    }))
}
