//! Error Types for Soroswap Tools

use swap_agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SwapError>;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Soroswap API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Token not supported: {0}")]
    UnsupportedToken(String),

    #[error("No transaction XDR available from quote")]
    MissingXdr,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SwapError> for AgentError {
    fn from(err: SwapError) -> Self {
        match err {
            SwapError::InvalidAmount(_) | SwapError::InvalidRequest(_) => {
                Self::ToolValidation(err.to_string())
            }
            SwapError::Config(msg) => Self::Config(msg),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}
