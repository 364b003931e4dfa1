//! Tool System
//!
//! Tools are registered once at startup into a closed [`ToolRegistry`] and
//! resolved by name with [`ToolRegistry::find`]. Each registry entry declares
//! whether the tool takes structured arguments or a legacy string bundle, so
//! the dispatcher never has to guess.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool arguments as sent by the model
pub type ToolArgs = HashMap<String, Value>;

/// Argument key under which the caller context is forwarded
pub const CALLER_CONTEXT_KEY: &str = "callerContext";

/// Argument key a legacy string tool reads its raw input from
pub const LEGACY_INPUT_KEY: &str = "input";

/// A requested or completed tool invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Unique within a round
    pub id: String,

    /// Registry key of the tool
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub args: ToolArgs,

    /// Populated by the dispatcher; `"Error: ..."` on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Set when the model's arguments could not be parsed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_error: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            result: None,
            args_error: None,
        }
    }

    /// Whether the dispatcher has filled in a result
    pub const fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    /// Whether the result is a normalized error string
    pub fn is_error(&self) -> bool {
        matches!(&self.result, Some(Value::String(s)) if s.starts_with("Error: "))
    }

    /// Result rendered as text (strings verbatim, structured values as JSON)
    pub fn result_text(&self) -> Option<String> {
        self.result.as_ref().map(render_value)
    }
}

pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Opaque identity of whoever started the conversation
///
/// The core never inspects it; it is forwarded into the input of tools whose
/// schema sets `needs_caller_context`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Wallet public key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.public_key.is_none() && self.extra.is_empty()
    }
}

/// Input handed to [`Tool::invoke`]
#[derive(Clone, Debug, PartialEq)]
pub enum ToolInput {
    /// Argument map, for tools with `accepts_structured_args`
    Structured(ToolArgs),
    /// String-encoded argument bundle, for legacy tools
    Text(String),
}

impl ToolInput {
    /// Resolve the input for a tool according to its declared contract.
    ///
    /// Legacy tools receive the raw string when the arguments are exactly
    /// `{"input": "<string>"}`, otherwise the JSON-encoded map.
    pub fn for_schema(schema: &ToolSchema, args: ToolArgs) -> Result<Self> {
        if schema.accepts_structured_args {
            return Ok(Self::Structured(args));
        }
        if args.len() == 1 {
            if let Some(Value::String(raw)) = args.get(LEGACY_INPUT_KEY) {
                return Ok(Self::Text(raw.clone()));
            }
        }
        Ok(Self::Text(serde_json::to_string(&args)?))
    }

    pub const fn args(&self) -> Option<&ToolArgs> {
        match self {
            Self::Structured(args) => Some(args),
            Self::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Structured(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// String argument, if present
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args()?.get(key)?.as_str().filter(|s| !s.trim().is_empty())
    }

    /// String argument that must be present
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.str_arg(key)
            .ok_or_else(|| AgentError::ToolValidation(format!("Missing required parameter: {key}")))
    }

    /// Caller context forwarded by the dispatcher
    pub fn caller_context(&self) -> Option<CallerContext> {
        let value = self.args()?.get(CALLER_CONTEXT_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Output of a successful invocation
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Structured(Value),
    Text(String),
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = json!({
            "type": self.param_type,
            "description": self.description,
        });
        if let Some(default) = &self.default {
            prop["default"] = default.clone();
        }
        if let Some(values) = &self.enum_values {
            prop["enum"] = Value::Array(values.clone());
        }
        prop
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,

    /// `false` for legacy tools that take a string-encoded argument bundle
    #[serde(default = "default_true")]
    pub accepts_structured_args: bool,

    /// Forward the caller context into the tool input
    #[serde(default)]
    pub needs_caller_context: bool,
}

const fn default_true() -> bool {
    true
}

impl ToolSchema {
    /// JSON Schema object describing the arguments
    pub fn argument_schema_hint(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            argument_schema_hint: self.argument_schema_hint(),
        }
    }
}

/// Catalog entry shown to the model client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub argument_schema_hint: Value,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Invoke the tool. Failures are returned, never panicked.
    async fn invoke(&self, input: ToolInput) -> Result<ToolOutput>;

    /// Validate structured arguments before invocation
    fn validate(&self, args: &ToolArgs) -> Result<()> {
        let schema = self.schema();
        if !schema.accepts_structured_args {
            return Ok(());
        }

        for param in &schema.parameters {
            let missing = args.get(&param.name).is_none_or(Value::is_null);
            if param.required && missing {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Closed registry of available tools
///
/// Built once at startup and shared read-only behind an `Arc`.
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

struct RegisteredTool {
    schema: ToolSchema,
    tool: Arc<dyn Tool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub const fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a new tool; a later registration under the same name wins
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_shared(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        if self.tools.contains_key(&schema.name) {
            tracing::warn!(tool = %schema.name, "Replacing previously registered tool");
        }
        self.tools
            .insert(schema.name.clone(), RegisteredTool { schema, tool });
    }

    /// Builder-style registration
    pub fn with<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Find-or-absent lookup by name
    pub fn find(&self, name: &str) -> Option<(&ToolSchema, Arc<dyn Tool>)> {
        self.tools
            .get(name)
            .map(|entry| (&entry.schema, Arc::clone(&entry.tool)))
    }

    /// Catalog of `{name, description, argumentSchemaHint}`, ordered by name
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.schema.descriptor()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
