//! OpenAI-compatible Chat Completions provider.
//!
//! Works against OpenAI and any compatible endpoint (DeepSeek, local
//! gateways) via a configurable base URL. Tool-call arguments cross the wire
//! as JSON strings and are parsed back into values on the way in.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TabbyError};
use crate::session::{Message, Role};

use super::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model when neither the provider nor the call specify one.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// OpenAI-compatible LLM provider.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new provider with the given API key, the stock endpoint, and
    /// the default model.
    ///
    /// # Example
    /// ```
    /// use tabby::providers::{OpenAIProvider, LLMProvider};
    ///
    /// let provider = OpenAIProvider::new("sk-xxx");
    /// assert_eq!(provider.name(), "openai");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Point the provider at a different OpenAI-compatible endpoint.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Set the default model for this provider instance.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
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
            messages: convert_messages(messages, system),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            tool_choice: if tools.is_empty() {
                None
            } else {
                Some("auto".to_string())
            },
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TabbyError::Provider(format!(
                "OpenAI API error (HTTP {}): {}",
                status, body
            )));
        }

        let api_response: ApiResponse = response.json().await?;
        convert_response(api_response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    /// JSON-encoded arguments, per the Chat Completions wire format
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    kind: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn convert_messages(messages: &[Message], system: Option<&str>) -> Vec<ApiMessage> {
    let mut result = Vec::with_capacity(messages.len() + 1);

    if let Some(system) = system.filter(|s| !s.is_empty()) {
        result.push(ApiMessage {
            role: "system".to_string(),
            content: Some(system.to_string()),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for msg in messages {
        match msg.role {
            Role::System => {
                // Mid-history system messages (compaction summaries) are
                // inlined as user turns, matching the Anthropic adapter.
                result.push(ApiMessage {
                    role: "user".to_string(),
                    content: Some(format!("[System: {}]", msg.text())),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            Role::User => {
                result.push(ApiMessage {
                    role: "user".to_string(),
                    content: Some(msg.text().to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|c| ApiToolCall {
                                id: c.id.clone(),
                                kind: "function".to_string(),
                                function: ApiFunction {
                                    name: c.name.clone(),
                                    arguments: c.arguments.to_string(),
                                },
                            })
                            .collect(),
                    )
                };
                result.push(ApiMessage {
                    role: "assistant".to_string(),
                    content: Some(msg.text().to_string()),
                    tool_calls,
                    tool_call_id: None,
                });
            }
            Role::Tool => {
                // One wire message per result
                for r in &msg.tool_results {
                    result.push(ApiMessage {
                        role: "tool".to_string(),
                        content: Some(r.content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(r.call_id.clone()),
                    });
                }
            }
        }
    }
    result
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<ApiTool> {
    tools
        .iter()
        .map(|t| ApiTool {
            kind: "function".to_string(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

fn convert_response(response: ApiResponse) -> Result<LLMResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| TabbyError::Provider("OpenAI response had no choices".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| {
            let arguments = serde_json::from_str(&c.function.arguments)
                .unwrap_or(Value::String(c.function.arguments));
            LLMToolCall::new(&c.id, &c.function.name, arguments)
        })
        .collect::<Vec<_>>();

    let finish_reason = if tool_calls.is_empty() {
        choice.finish_reason.unwrap_or_else(|| "stop".to_string())
    } else {
        "tool_calls".to_string()
    };

    Ok(LLMResponse {
        content: choice.message.content.filter(|c| !c.is_empty()),
        tool_calls,
        finish_reason,
        usage: response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens)),
    })
}
