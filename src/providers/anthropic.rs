//! Anthropic Messages-API provider.
//!
//! Implements the `LLMProvider` trait against the Anthropic Messages API,
//! handling message conversion, tool calls, and response parsing. Mid-history
//! system messages (compaction summaries) are inlined as `[System: …]` user
//! turns since the API accepts only one top-level system prompt.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TabbyError};
use crate::session::{Message, Role};

use super::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};

/// The Anthropic Messages API endpoint.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Default model when neither the provider nor the call specify one.
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic LLM provider.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl AnthropicProvider {
    /// Create a new provider with the given API key and the default model.
    ///
    /// # Example
    /// ```
    /// use tabby::providers::{AnthropicProvider, LLMProvider};
    ///
    /// let provider = AnthropicProvider::new("sk-ant-xxx");
    /// assert_eq!(provider.name(), "anthropic");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Set the default model for this provider instance.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<LLMResponse> {
        let model = options.model.as_deref().unwrap_or(&self.model);

        let request = ApiRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: convert_messages(messages),
            system: system.filter(|s| !s.is_empty()).map(str::to_string),
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TabbyError::Provider(format!(
                "Anthropic API error (HTTP {}): {}",
                status, body
            )));
        }

        let api_response: ApiResponse = response.json().await?;
        Ok(convert_response(api_response))
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage> {
    let mut result = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            Role::System => {
                // Inline compaction summaries as user turns
                result.push(ApiMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::Text {
                        text: format!("[System: {}]", msg.text()),
                    }],
                });
            }
            Role::User => {
                result.push(ApiMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::Text {
                        text: msg.text().to_string(),
                    }],
                });
            }
            Role::Assistant => {
                let mut blocks = Vec::new();
                if let Some(content) = &msg.content {
                    if !content.is_empty() {
                        blocks.push(ContentBlock::Text {
                            text: content.clone(),
                        });
                    }
                }
                for call in &msg.tool_calls {
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                if blocks.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: String::new(),
                    });
                }
                result.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: blocks,
                });
            }
            Role::Tool => {
                let blocks = msg
                    .tool_results
                    .iter()
                    .map(|r| ContentBlock::ToolResult {
                        tool_use_id: r.call_id.clone(),
                        content: r.content.clone(),
                    })
                    .collect();
                result.push(ApiMessage {
                    role: "user".to_string(),
                    content: blocks,
                });
            }
        }
    }
    result
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<ApiTool> {
    tools
        .iter()
        .map(|t| ApiTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.parameters.clone(),
        })
        .collect()
}

fn convert_response(response: ApiResponse) -> LLMResponse {
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(LLMToolCall::new(&id, &name, input));
            }
            ContentBlock::ToolResult { .. } => {}
        }
    }

    let content = if text_parts.is_empty() {
        None
    } else {
        Some(text_parts.join("\n"))
    };
    let finish_reason = if tool_calls.is_empty() {
        response.stop_reason.unwrap_or_else(|| "stop".to_string())
    } else {
        "tool_calls".to_string()
    };
    let usage = response
        .usage
        .map(|u| Usage::new(u.input_tokens, u.output_tokens));

    LLMResponse {
        content,
        tool_calls,
        finish_reason,
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ToolCall, ToolResult};
    use serde_json::json;

    #[test]
    fn test_convert_messages_roles() {
        let messages = vec![
            Message::system("[Summary of 3 earlier messages]\nstuff"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let converted = convert_messages(&messages);

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "user");
        assert!(matches!(
            &converted[0].content[0],
            ContentBlock::Text { text } if text.starts_with("[System: [Summary")
        ));
        assert_eq!(converted[1].role, "user");
        assert_eq!(converted[2].role, "assistant");
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let messages = vec![Message::assistant_with_tools(
            Some("checking".into()),
            vec![ToolCall::new("c1", "read_file", json!({"path": "x"}))],
        )];
        let converted = convert_messages(&messages);

        assert_eq!(converted[0].content.len(), 2);
        assert!(matches!(&converted[0].content[0], ContentBlock::Text { text } if text == "checking"));
        assert!(matches!(
            &converted[0].content[1],
            ContentBlock::ToolUse { id, name, .. } if id == "c1" && name == "read_file"
        ));
    }

    #[test]
    fn test_convert_tool_results_become_user_blocks() {
        let messages = vec![Message::tool_results(vec![
            ToolResult::new("c1", "echo", "one"),
            ToolResult::new("c2", "echo", "two"),
        ])];
        let converted = convert_messages(&messages);

        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[0].content.len(), 2);
        assert!(matches!(
            &converted[0].content[0],
            ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "c1"
        ));
    }

    #[test]
    fn test_convert_response_text_and_tools() {
        let response = ApiResponse {
            content: vec![
                ContentBlock::Text {
                    text: "let me check".into(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "exec_shell".into(),
                    input: json!({"command": "ls"}),
                },
            ],
            stop_reason: Some("tool_use".into()),
            usage: Some(ApiUsage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        };

        let converted = convert_response(response);
        assert_eq!(converted.content.as_deref(), Some("let me check"));
        assert_eq!(converted.tool_calls.len(), 1);
        assert_eq!(converted.tool_calls[0].id, "toolu_1");
        assert_eq!(converted.finish_reason, "tool_calls");
        assert_eq!(converted.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_convert_response_text_only() {
        let response = ApiResponse {
            content: vec![ContentBlock::Text {
                text: "done".into(),
            }],
            stop_reason: Some("end_turn".into()),
            usage: None,
        };
        let converted = convert_response(response);
        assert_eq!(converted.content.as_deref(), Some("done"));
        assert!(!converted.has_tool_calls());
        assert_eq!(converted.finish_reason, "end_turn");
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = ApiRequest {
            model: "claude-sonnet-4-5".into(),
            max_tokens: 1024,
            messages: convert_messages(&[Message::user("hi")]),
            system: Some("be brief".into()),
            tools: None,
            temperature: Some(0.3),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "claude-sonnet-4-5");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_provider_metadata() {
        let provider = AnthropicProvider::new("key").with_model("claude-haiku-4-5");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.default_model(), "claude-haiku-4-5");
    }
}
