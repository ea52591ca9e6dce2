//! Stateful OpenAI assistants: one thread per supervised session.
//!
//! Only the newest user turn is posted; earlier context lives in the
//! provider-side thread identified by the continuation handles. Every call
//! runs the full sequence:
//! 1. reuse or create the assistant
//! 2. reuse or create the thread
//! 3. post the new user turn, if there is one
//! 4. start a run and poll it to a terminal status
//! 5. read back the newest assistant message

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::http::{ensure_success, read_json};
use super::poll::{poll_until_terminal, PollOutcome, PollPolicy};
use super::{
    ContinuationHandles, ProviderKind, SupervisorProvider, SupervisorReply, SupervisorRequest,
};
use crate::error::GatewayError;
use crate::types::ChatRole;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const ASSISTANT_NAME: &str = "Jules Supervisor";
pub const ASSISTANT_INSTRUCTIONS: &str = "You are a project supervisor. Your goal is to keep the AI agent 'Jules' on track. Identify if the agent is stuck, off-track, or needs guidance. Provide a concise, direct instruction or feedback to the agent. Do not be conversational. Be directive but polite. Focus on the next task.";

const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

#[derive(Serialize)]
struct CreateAssistant<'a> {
    name: &'a str,
    instructions: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct Run {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct RunStatus {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Deserialize)]
struct MessageText {
    #[serde(default)]
    value: String,
}

pub struct OpenAiAssistantsProvider {
    http: reqwest::Client,
    base_url: String,
    poll_policy: PollPolicy,
}

impl OpenAiAssistantsProvider {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_policy: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    fn post(&self, path: &str, api_key: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }

    fn get(&self, path: &str, api_key: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }

    async fn create_assistant(&self, api_key: &str, model: &str) -> Result<String, GatewayError> {
        const STEP: &str = "failed to create assistant";
        let body = CreateAssistant {
            name: ASSISTANT_NAME,
            instructions: ASSISTANT_INSTRUCTIONS,
            model,
        };
        let response = self.post("/assistants", api_key).json(&body).send().await?;
        let response = ensure_success(response, STEP).await?;
        let created: Created = read_json(response, STEP).await?;
        debug!(assistant_id = %created.id, "created supervisor assistant");
        Ok(created.id)
    }

    async fn create_thread(&self, api_key: &str) -> Result<String, GatewayError> {
        const STEP: &str = "failed to create thread";
        let response = self.post("/threads", api_key).json(&json!({})).send().await?;
        let response = ensure_success(response, STEP).await?;
        let created: Created = read_json(response, STEP).await?;
        debug!(thread_id = %created.id, "created supervisor thread");
        Ok(created.id)
    }

    async fn add_message(
        &self,
        api_key: &str,
        thread_id: &str,
        content: &str,
    ) -> Result<(), GatewayError> {
        let response = self
            .post(&format!("/threads/{thread_id}/messages"), api_key)
            .json(&json!({ "role": "user", "content": content }))
            .send()
            .await?;
        ensure_success(response, "failed to add message").await?;
        Ok(())
    }

    async fn start_run(
        &self,
        api_key: &str,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<Run, GatewayError> {
        const STEP: &str = "failed to run assistant";
        let response = self
            .post(&format!("/threads/{thread_id}/runs"), api_key)
            .json(&json!({ "assistant_id": assistant_id }))
            .send()
            .await?;
        let response = ensure_success(response, STEP).await?;
        read_json(response, STEP).await
    }

    async fn run_status(
        &self,
        api_key: &str,
        thread_id: &str,
        run_id: &str,
    ) -> Result<String, GatewayError> {
        const STEP: &str = "failed to check run status";
        let response = self
            .get(&format!("/threads/{thread_id}/runs/{run_id}"), api_key)
            .send()
            .await?;
        let response = ensure_success(response, STEP).await?;
        let status: RunStatus = read_json(response, STEP).await?;
        Ok(status.status)
    }

    async fn latest_reply(&self, api_key: &str, thread_id: &str) -> Result<String, GatewayError> {
        const STEP: &str = "failed to list messages";
        let response = self
            .get(&format!("/threads/{thread_id}/messages"), api_key)
            .send()
            .await?;
        let response = ensure_success(response, STEP).await?;
        let list: MessageList = read_json(response, STEP).await?;
        // The list endpoint returns newest first.
        Ok(list
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .and_then(|m| m.content.into_iter().next())
            .and_then(|c| c.text)
            .map(|t| t.value)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SupervisorProvider for OpenAiAssistantsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiAssistants
    }

    async fn invoke(&self, request: &SupervisorRequest) -> Result<SupervisorReply, GatewayError> {
        let api_key = request.api_key.as_str();
        let user_content = request
            .messages
            .last()
            .filter(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str());

        if user_content.is_none() && request.handles.thread_id.is_none() {
            return Ok(SupervisorReply::default());
        }

        let assistant_id = match &request.handles.assistant_id {
            Some(id) => id.clone(),
            None => {
                self.create_assistant(api_key, request.model_or(DEFAULT_MODEL))
                    .await?
            }
        };
        let thread_id = match &request.handles.thread_id {
            Some(id) => id.clone(),
            None => self.create_thread(api_key).await?,
        };

        if let Some(content) = user_content {
            self.add_message(api_key, &thread_id, content).await?;
        }

        let run = self.start_run(api_key, &thread_id, &assistant_id).await?;
        let outcome = poll_until_terminal(self.poll_policy, run.status, || {
            self.run_status(api_key, &thread_id, &run.id)
        })
        .await?;
        match outcome {
            PollOutcome::Completed => {}
            PollOutcome::Failed(status) | PollOutcome::TimedOut(status) => {
                return Err(GatewayError::RunNotCompleted(status));
            }
        }

        let content = self.latest_reply(api_key, &thread_id).await?;
        Ok(SupervisorReply {
            content,
            handles: ContinuationHandles {
                thread_id: Some(thread_id),
                assistant_id: Some(assistant_id),
            },
        })
    }
}
