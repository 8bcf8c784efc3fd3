//! [`PlanGenerator`] over the Anthropic Messages API.
//!
//! The output schema is sent as the single tool and `tool_choice` forces the
//! model to call it, so the structured reply arrives as that tool call's
//! `input`. The HTTP client keeps reqwest's defaults: no request timeout,
//! no retry.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{GenerationReply, GenerationRequest, PlanGenerator, TransportError};

/// Connection settings for the Messages API.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// API key. Calls fail with [`TransportError::NotConfigured`] when unset.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

impl GeneratorConfig {
    pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
    pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
    pub const DEFAULT_MAX_TOKENS: u32 = 8192;
    pub const API_VERSION: &str = "2023-06-01";
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    tools: Vec<Tool<'a>>,
    tool_choice: ToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Pick the forced tool call out of a response.
///
/// A `tool_use` block for a different tool does not count as a structured
/// reply.
pub(crate) fn parse_reply(response: MessagesResponse, tool_name: &str) -> GenerationReply {
    let mut structured = None;
    let mut texts = Vec::new();

    for block in response.content {
        match block {
            ContentBlock::ToolUse { name, input } if name == tool_name => {
                if structured.is_none() {
                    structured = Some(input);
                }
            }
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::ToolUse { .. } | ContentBlock::Other => {}
        }
    }

    GenerationReply {
        structured,
        text: if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        },
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Generation client for the Anthropic Messages API.
pub struct AnthropicGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl AnthropicGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PlanGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationReply, TransportError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| TransportError::NotConfigured("no API key set".to_string()))?;

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: &request.instructions,
            }],
            tools: vec![Tool {
                name: &request.tool_name,
                description: "Record the complete two-week training plan.",
                input_schema: &request.output_schema,
            }],
            tool_choice: ToolChoice {
                kind: "tool",
                name: &request.tool_name,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", GeneratorConfig::API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                model = %self.config.model,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = parsed.stop_reason.as_deref().unwrap_or("unknown"),
                "generation call finished"
            );
        }

        Ok(parse_reply(parsed, &request.tool_name))
    }
}
