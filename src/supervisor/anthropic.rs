//! Anthropic messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{ensure_success, read_json};
use super::{
    ContinuationHandles, ProviderKind, SupervisorProvider, SupervisorReply, SupervisorRequest,
    MAX_OUTPUT_TOKENS, SUPERVISOR_INSTRUCTIONS,
};
use crate::error::GatewayError;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// `POST {base}/messages` with the supervisor prompt as the system field.
pub struct AnthropicProvider {
    http: reqwest::Client,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SupervisorProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn invoke(&self, request: &SupervisorRequest) -> Result<SupervisorReply, GatewayError> {
        let body = MessagesRequest {
            model: request.model_or(DEFAULT_MODEL),
            system: SUPERVISOR_INSTRUCTIONS,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &request.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "Anthropic API error").await?;
        let parsed: MessagesResponse = read_json(response, "Anthropic API error").await?;

        let content = parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .unwrap_or_default();
        Ok(SupervisorReply {
            content,
            handles: ContinuationHandles::default(),
        })
    }
}
