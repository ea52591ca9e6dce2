//! Stateless OpenAI chat completions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{ensure_success, read_json};
use super::{
    ContinuationHandles, ProviderKind, SupervisorProvider, SupervisorReply, SupervisorRequest,
    MAX_OUTPUT_TOKENS, SUPERVISOR_INSTRUCTIONS,
};
use crate::error::GatewayError;

pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `POST {base}/chat/completions` with the supervisor system message prepended.
pub struct OpenAiChatProvider {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiChatProvider {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SupervisorProvider for OpenAiChatProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiChat
    }

    async fn invoke(&self, request: &SupervisorRequest) -> Result<SupervisorReply, GatewayError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: SUPERVISOR_INSTRUCTIONS,
        });
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));
        let body = CompletionRequest {
            model: request.model_or(DEFAULT_MODEL),
            messages,
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "OpenAI API error").await?;
        let parsed: CompletionResponse = read_json(response, "OpenAI API error").await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(SupervisorReply {
            content,
            handles: ContinuationHandles::default(),
        })
    }
}
