//! Supervisor gateway: one call contract over several LLM protocols.
//!
//! The gateway turns a normalized `{role, content}` message list into a
//! single supervisor utterance. Protocol families live in their own modules:
//! - `chat`: stateless OpenAI chat completions
//! - `assistants`: stateful OpenAI thread/run polling
//! - `anthropic`, `gemini`: system-instruction content generation
//! - `poll`: bounded run-status polling used by `assistants`
//! - `route`: the `POST /api/supervisor` HTTP surface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::error::GatewayError;
use crate::types::ChatMessage;

mod anthropic;
mod assistants;
mod chat;
mod gemini;
mod http;
pub mod poll;
pub mod route;

pub use anthropic::AnthropicProvider;
pub use assistants::OpenAiAssistantsProvider;
pub use chat::OpenAiChatProvider;
pub use gemini::GeminiProvider;

/// Instruction sent with every stateless supervisor call.
pub const SUPERVISOR_INSTRUCTIONS: &str = "You are a project supervisor. Your goal is to keep the AI agent \"Jules\" on track. Read the conversation history. Identify if the agent is stuck, off-track, or needs guidance. Provide a concise, direct instruction or feedback to the agent. Do not be conversational. Be directive but polite. Focus on the next task.";

/// Output cap for stateless providers.
pub const MAX_OUTPUT_TOKENS: u32 = 150;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ---------------------------------------------------------------------------
// Provider selection
// ---------------------------------------------------------------------------

/// Supported supervisor protocols, by wire name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Stateless chat completion.
    #[default]
    #[serde(rename = "openai")]
    OpenAiChat,
    /// Stateful assistant thread with run polling.
    #[serde(rename = "openai-assistants")]
    OpenAiAssistants,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAiChat,
        ProviderKind::OpenAiAssistants,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai",
            Self::OpenAiAssistants => "openai-assistants",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// True when conversation state lives on the provider side.
    pub fn is_stateful(self) -> bool {
        matches!(self, Self::OpenAiAssistants)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!(
                    "unknown supervisor provider `{wanted}` (expected one of: openai, openai-assistants, anthropic, gemini)"
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Call contract
// ---------------------------------------------------------------------------

/// Provider-side identifiers that let a stateful provider resume context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationHandles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

/// One supervisor invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorRequest {
    pub messages: Vec<ChatMessage>,
    pub api_key: String,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    pub handles: ContinuationHandles,
}

impl SupervisorRequest {
    /// Reject empty required fields before any network call.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.messages.is_empty() {
            return Err(GatewayError::MissingField("messages"));
        }
        if self.api_key.trim().is_empty() {
            return Err(GatewayError::MissingField("apiKey"));
        }
        Ok(())
    }

    fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(default)
    }
}

/// One supervisor utterance plus any handles to reuse next time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReply {
    pub content: String,
    pub handles: ContinuationHandles,
}

/// One protocol family.
#[async_trait]
pub trait SupervisorProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;
    async fn invoke(&self, request: &SupervisorRequest) -> Result<SupervisorReply, GatewayError>;
}

/// What the supervision loop depends on: invoke a provider by kind.
///
/// Tests substitute a scripted implementation; production uses [`HttpGateway`].
#[async_trait]
pub trait SupervisorGateway: Send + Sync {
    async fn invoke(
        &self,
        provider: ProviderKind,
        request: &SupervisorRequest,
    ) -> Result<SupervisorReply, GatewayError>;
}

// ---------------------------------------------------------------------------
// HttpGateway
// ---------------------------------------------------------------------------

/// Base URLs for each upstream API. Overridable for tests and proxies.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub openai: String,
    pub anthropic: String,
    pub gemini: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            openai: OPENAI_BASE_URL.into(),
            anthropic: ANTHROPIC_BASE_URL.into(),
            gemini: GEMINI_BASE_URL.into(),
        }
    }
}

/// Gateway that dispatches to the real provider HTTP APIs.
pub struct HttpGateway {
    chat: OpenAiChatProvider,
    assistants: OpenAiAssistantsProvider,
    anthropic: AnthropicProvider,
    gemini: GeminiProvider,
}

impl HttpGateway {
    pub fn new(timeout: Duration) -> Self {
        Self::with_endpoints(timeout, ProviderEndpoints::default(), poll::PollPolicy::default())
    }

    pub fn with_endpoints(
        timeout: Duration,
        endpoints: ProviderEndpoints,
        poll_policy: poll::PollPolicy,
    ) -> Self {
        let client = http::build_http_client(timeout);
        Self {
            chat: OpenAiChatProvider::new(client.clone(), &endpoints.openai),
            assistants: OpenAiAssistantsProvider::new(client.clone(), &endpoints.openai)
                .with_poll_policy(poll_policy),
            anthropic: AnthropicProvider::new(client.clone(), &endpoints.anthropic),
            gemini: GeminiProvider::new(client, &endpoints.gemini),
        }
    }

    fn provider(&self, kind: ProviderKind) -> &dyn SupervisorProvider {
        match kind {
            ProviderKind::OpenAiChat => &self.chat,
            ProviderKind::OpenAiAssistants => &self.assistants,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Gemini => &self.gemini,
        }
    }
}

#[async_trait]
impl SupervisorGateway for HttpGateway {
    async fn invoke(
        &self,
        provider: ProviderKind,
        request: &SupervisorRequest,
    ) -> Result<SupervisorReply, GatewayError> {
        request.validate()?;
        debug!(
            provider = %provider,
            messages = request.messages.len(),
            "invoking supervisor"
        );
        self.provider(provider).invoke(request).await
    }
}

// ---------------------------------------------------------------------------
// Wire contract
// ---------------------------------------------------------------------------

/// JSON request body of `POST /api/supervisor`.
///
/// Every field is optional at the serde layer so missing fields surface as
/// [`GatewayError::MissingField`] rather than a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

impl GatewayRequest {
    /// Validate and split into a provider selection plus call request.
    pub fn into_parts(self) -> Result<(ProviderKind, SupervisorRequest), GatewayError> {
        let messages = self
            .messages
            .filter(|m| !m.is_empty())
            .ok_or(GatewayError::MissingField("messages"))?;
        let provider = self
            .provider
            .filter(|p| !p.trim().is_empty())
            .ok_or(GatewayError::MissingField("provider"))?;
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(GatewayError::MissingField("apiKey"))?;
        let provider: ProviderKind = provider
            .parse()
            .map_err(|_| GatewayError::UnknownProvider(provider.clone()))?;
        Ok((
            provider,
            SupervisorRequest {
                messages,
                api_key,
                model: self.model,
                handles: ContinuationHandles {
                    thread_id: self.thread_id,
                    assistant_id: self.assistant_id,
                },
            },
        ))
    }
}

/// JSON success body of `POST /api/supervisor`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub content: String,
    #[serde(flatten)]
    pub handles: ContinuationHandles,
}

impl From<SupervisorReply> for GatewayResponse {
    fn from(reply: SupervisorReply) -> Self {
        Self {
            content: reply.content,
            handles: reply.handles,
        }
    }
}
