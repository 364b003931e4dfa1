//! Orchestrator Configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::model::ModelCallPolicy;

/// Answer returned when the round budget runs out before the model answers
pub const UNABLE_TO_COMPLETE: &str =
    "I was unable to complete this request within the allowed number of steps. Please try a simpler or more specific question.";

/// Limits for one conversation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum model rounds per request
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Budget for a single model call
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    /// Budget for a single tool invocation
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Marker returned when the round limit is hit without an answer
    #[serde(default = "default_unable_to_complete")]
    pub unable_to_complete: String,
}

const fn default_max_rounds() -> usize {
    5
}
const fn default_model_timeout() -> u64 {
    60
}
const fn default_tool_timeout() -> u64 {
    30
}
fn default_unable_to_complete() -> String {
    UNABLE_TO_COMPLETE.into()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            unable_to_complete: default_unable_to_complete(),
        }
    }
}

impl OrchestratorConfig {
    /// Read overrides from `AGENT_MAX_ROUNDS`, `AGENT_MODEL_TIMEOUT_SECS`
    /// and `AGENT_TOOL_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            fallback: T,
        ) -> Result<T> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| AgentError::Config(format!("{key} must be a number, got '{raw}'"))),
                None => Ok(fallback),
            }
        }

        let config = Self {
            max_rounds: parse(&lookup, "AGENT_MAX_ROUNDS", default_max_rounds())?,
            model_timeout_secs: parse(&lookup, "AGENT_MODEL_TIMEOUT_SECS", default_model_timeout())?,
            tool_timeout_secs: parse(&lookup, "AGENT_TOOL_TIMEOUT_SECS", default_tool_timeout())?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(AgentError::Config("max_rounds must be greater than 0".into()));
        }
        if self.model_timeout_secs == 0 || self.tool_timeout_secs == 0 {
            return Err(AgentError::Config("timeouts must be greater than 0".into()));
        }
        Ok(())
    }

    pub const fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// One retry for transient model failures
    pub const fn model_policy(&self) -> ModelCallPolicy {
        ModelCallPolicy {
            timeout: Duration::from_secs(self.model_timeout_secs),
            retries: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.model_policy().retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("AGENT_MAX_ROUNDS", "3"),
            ("AGENT_TOOL_TIMEOUT_SECS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.tool_timeout(), Duration::from_secs(10));
        assert_eq!(config.model_timeout_secs, 60);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(OrchestratorConfig::from_lookup(lookup(&[("AGENT_MAX_ROUNDS", "0")])).is_err());
        assert!(OrchestratorConfig::from_lookup(lookup(&[("AGENT_MAX_ROUNDS", "many")])).is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: OrchestratorConfig = serde_json::from_str(r#"{"max_rounds": 2}"#).unwrap();
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.unable_to_complete, UNABLE_TO_COMPLETE);
    }
}
