//! Gemini `generateContent`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{ensure_success, read_json};
use super::{
    ContinuationHandles, ProviderKind, SupervisorProvider, SupervisorReply, SupervisorRequest,
    MAX_OUTPUT_TOKENS, SUPERVISOR_INSTRUCTIONS,
};
use crate::error::GatewayError;
use crate::types::ChatRole;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// `POST {base}/models/{model}:generateContent?key=...`.
pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn gemini_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

#[async_trait]
impl SupervisorProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn invoke(&self, request: &SupervisorRequest) -> Result<SupervisorReply, GatewayError> {
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SUPERVISOR_INSTRUCTIONS,
                }],
            },
            contents: request
                .messages
                .iter()
                .map(|m| Content {
                    role: Some(gemini_role(m.role)),
                    parts: vec![Part { text: &m.content }],
                })
                .collect(),
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        // The key travels in the query string; keep the URL out of logs.
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            request.model_or(DEFAULT_MODEL)
        );
        let response = self
            .http
            .post(url)
            .query(&[("key", request.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.without_url()))?;
        let response = ensure_success(response, "Gemini API error").await?;
        let parsed: GenerateResponse = read_json(response, "Gemini API error").await?;

        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default();
        Ok(SupervisorReply {
            content,
            handles: ContinuationHandles::default(),
        })
    }
}
