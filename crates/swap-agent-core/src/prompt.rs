//! Prompted Tool Calling
//!
//! Adapts a plain [`LlmProvider`] into a [`ModelClient`] for backends without
//! native function calling. The tool catalog is written into the system
//! prompt and the model requests tools with fenced blocks:
//!
//! ````text
//! ```tool
//! {"tool": "get_quote", "arguments": {"inputToken": "XLM", "outputToken": "USDC", "inputAmount": "10"}}
//! ```
//! ````
//!
//! A block may also hold a JSON array of such objects.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::message::Message;
use crate::model::{CallArguments, Decision, ModelClient, RequestedCall};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::ToolDescriptor;

const TOOL_FENCE: &str = "```tool";
const FENCE_END: &str = "```";

/// Fallback name for a block whose JSON could not be read at all
pub const UNPARSED_TOOL_NAME: &str = "unparsed_tool_call";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful DeFi assistant for Soroswap, a decentralized exchange on the Stellar network.
You help users discover tokens, compare quotes, and prepare swaps.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

You may include several tool blocks in one reply. After receiving tool results,
synthesize them into a helpful response. If you can answer directly without
tools, do so. Never invent prices or quotes; use the tools.
Be concise and accurate."#;

/// Model client speaking the fenced-block tool protocol
pub struct PromptedModelClient {
    provider: Arc<dyn LlmProvider>,
    generation: GenerationOptions,
    system_prompt: String,
}

impl PromptedModelClient {
    pub fn new(provider: Arc<dyn LlmProvider>, generation: GenerationOptions) -> Self {
        let system_prompt = generation
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into());
        Self {
            provider,
            generation,
            system_prompt,
        }
    }

    /// Build the full system prompt including tool descriptions
    pub fn build_system_prompt(&self, catalog: &[ToolDescriptor]) -> String {
        let mut prompt = self.system_prompt.clone();
        if !catalog.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&tool_prompt_section(catalog));
        }
        prompt
    }
}

#[async_trait]
impl ModelClient for PromptedModelClient {
    async fn decide(&self, snapshot: &[Message], catalog: &[ToolDescriptor]) -> Result<Decision> {
        let mut options = self.generation.clone();
        options.system_prompt = Some(self.build_system_prompt(catalog));

        tracing::debug!(
            model = %options.model,
            messages = snapshot.len(),
            est_tokens = snapshot.iter().map(Message::estimate_tokens).sum::<u32>(),
            "Requesting completion"
        );
        let completion = self.provider.complete(snapshot, &options).await?;
        if let Some(usage) = completion.usage {
            tracing::debug!(
                model = %completion.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total(),
                "Completion received"
            );
        }
        let (text, calls) = parse_tool_blocks(&completion.content);
        Ok(Decision::resolve(Some(text), calls))
    }

    fn name(&self) -> &str {
        &self.generation.model
    }
}

/// Generate the system prompt section describing available tools
pub fn tool_prompt_section(catalog: &[ToolDescriptor]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");

    for tool in catalog {
        prompt.push_str(&format!("### {}\n{}\n", tool.name, tool.description));

        let required: Vec<&str> = tool.argument_schema_hint["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        if let Some(props) = tool.argument_schema_hint["properties"].as_object() {
            if !props.is_empty() {
                prompt.push_str("**Parameters:**\n");
            }
            for (name, prop) in props {
                let marker = if required.contains(&name.as_str()) { " (required)" } else { "" };
                prompt.push_str(&format!(
                    "- `{}` ({}){}: {}\n",
                    name,
                    prop["type"].as_str().unwrap_or("any"),
                    marker,
                    prop["description"].as_str().unwrap_or_default()
                ));
            }
        }
        prompt.push('\n');
    }

    prompt
}

/// Split a completion into its prose and its tool requests
pub fn parse_tool_blocks(content: &str) -> (String, Vec<RequestedCall>) {
    let mut calls = Vec::new();
    let mut text = String::new();
    let mut rest = content;

    while let Some(start) = rest.find(TOOL_FENCE) {
        text.push_str(&rest[..start]);
        let after = &rest[start + TOOL_FENCE.len()..];
        let Some(end) = after.find(FENCE_END) else {
            // unterminated fence: treat the remainder as the block
            calls.extend(parse_block(after.trim()));
            rest = "";
            break;
        };
        calls.extend(parse_block(after[..end].trim()));
        rest = &after[end + FENCE_END.len()..];
    }
    text.push_str(rest);

    if calls.is_empty() {
        if let Some(call) = parse_inline_call(content) {
            return (String::new(), vec![call]);
        }
    }

    (text.trim().to_string(), calls)
}

fn parse_block(block: &str) -> Vec<RequestedCall> {
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Array(items)) => items.into_iter().map(call_from_value).collect(),
        Ok(value) => vec![call_from_value(value)],
        Err(e) => vec![RequestedCall {
            id: None,
            name: sniff_tool_name(block).unwrap_or_else(|| UNPARSED_TOOL_NAME.into()),
            arguments: CallArguments::Malformed {
                raw: block.to_string(),
                reason: format!("invalid tool block: {e}"),
            },
        }],
    }
}

fn call_from_value(value: Value) -> RequestedCall {
    let name = value
        .get("tool")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .unwrap_or(UNPARSED_TOOL_NAME)
        .to_string();
    let id = value.get("id").and_then(Value::as_str).map(str::to_string);
    let arguments = match value.get("arguments").or_else(|| value.get("args")) {
        Some(Value::String(raw)) => CallArguments::from_json_str(raw),
        Some(other) => CallArguments::from_value(other.clone()),
        None => CallArguments::Parsed(Default::default()),
    };

    RequestedCall { id, name, arguments }
}

/// Bare JSON reply carrying a `"tool"` key, without a fence
fn parse_inline_call(content: &str) -> Option<RequestedCall> {
    let trimmed = content.trim();
    if !trimmed.starts_with('{') || !trimmed.contains(r#""tool""#) {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;
    value.get("tool")?;
    Some(call_from_value(value))
}

/// Best-effort `"tool": "<name>"` lookup in text that is not valid JSON
fn sniff_tool_name(block: &str) -> Option<String> {
    let key = block.find(r#""tool""#)?;
    let after_colon = block[key + 6..].trim_start().strip_prefix(':')?.trim_start();
    let quoted = after_colon.strip_prefix('"')?;
    let end = quoted.find('"')?;
    Some(quoted[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Completion, TokenUsage};
    use crate::tool::{ParameterSchema, ToolSchema};
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedProvider {
        reply: String,
        last_system: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, _: &[Message], options: &GenerationOptions) -> Result<Completion> {
            *self.last_system.lock().unwrap() = options.system_prompt.clone();
            Ok(Completion {
                content: self.reply.clone(),
                model: options.model.clone(),
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                }),
            })
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![
            ToolSchema {
                name: "calculator".into(),
                description: "Evaluate arithmetic".into(),
                parameters: vec![ParameterSchema::required("input", "string", "Expression")],
                category: None,
                has_side_effects: false,
                accepts_structured_args: false,
                needs_caller_context: false,
            }
            .descriptor(),
        ]
    }

    #[test]
    fn test_parse_single_block() {
        let content = r#"Let me check that for you.
```tool
{"tool": "calculator", "arguments": {"expression": "15*23"}}
```"#;
        let (text, calls) = parse_tool_blocks(content);
        assert_eq!(text, "Let me check that for you.");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "calculator");
        assert_eq!(
            calls[0].arguments,
            CallArguments::Parsed(serde_json::from_value(json!({"expression": "15*23"})).unwrap())
        );
    }

    #[test]
    fn test_parse_multiple_blocks_and_arrays() {
        let content = r#"```tool
{"tool": "get_tokens", "arguments": {}}
```
and
```tool
[{"tool": "get_token_price", "arguments": {"input": "CAS3"}, "id": "p1"},
 {"tool": "get_protocols"}]
```"#;
        let (text, calls) = parse_tool_blocks(content);
        assert_eq!(text, "and");
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_tokens", "get_token_price", "get_protocols"]);
        assert_eq!(calls[1].id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_parse_malformed_block() {
        let (_, calls) = parse_tool_blocks("```tool\n{\"tool\": \"get_quote\", \"arguments\": {\"inputAmount\": }\n```");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_quote");
        assert!(matches!(calls[0].arguments, CallArguments::Malformed { .. }));
    }

    #[test]
    fn test_parse_stringified_arguments() {
        let (_, calls) = parse_tool_blocks(
            "```tool\n{\"tool\": \"weather\", \"arguments\": \"{\\\"location\\\": \\\"Paris\\\"}\"}\n```",
        );
        assert!(matches!(&calls[0].arguments, CallArguments::Parsed(a) if a["location"] == json!("Paris")));
    }

    #[test]
    fn test_parse_inline_and_plain() {
        let (_, calls) = parse_tool_blocks(r#"{"tool": "get_tokens", "arguments": {}}"#);
        assert_eq!(calls.len(), 1);

        let (text, calls) = parse_tool_blocks("15 * 23 = 345");
        assert_eq!(text, "15 * 23 = 345");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_prompt_section_lists_parameters() {
        let section = tool_prompt_section(&catalog());
        assert!(section.contains("### calculator"));
        assert!(section.contains("- `input` (string) (required): Expression"));
    }

    #[tokio::test]
    async fn test_prompted_client_decisions() {
        let provider = Arc::new(CannedProvider {
            reply: "Sure.\n```tool\n{\"tool\": \"calculator\", \"arguments\": {\"input\": \"2+2\"}}\n```".into(),
            last_system: Mutex::new(None),
        });
        let client = PromptedModelClient::new(provider.clone(), GenerationOptions::default());

        let decision = client.decide(&[Message::user("2+2?")], &catalog()).await.unwrap();
        assert!(matches!(decision, Decision::ToolRequest(ref calls) if calls.len() == 1));

        let system = provider.last_system.lock().unwrap().clone().unwrap();
        assert!(system.starts_with(DEFAULT_SYSTEM_PROMPT));
        assert!(system.contains("## Available Tools"));
    }
}
