//! HTTP client for the Jules REST API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::normalize::{activity_from_wire, session_from_wire};
use super::SessionSource;
use crate::error::ApiError;
use crate::types::{Activity, ActivityKind, ActivityRole, CreateActivityRequest, Session};

/// Message sent to bring a paused, completed or failed session back to work.
pub const RESUME_PROMPT: &str = "Please resume working on this session.";

/// Upper bound on followed `nextPageToken` links per listing.
const MAX_PAGES: usize = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPage {
    #[serde(default)]
    sessions: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPage {
    #[serde(default)]
    activities: Vec<Value>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Client for `https://jules.googleapis.com/v1alpha`.
pub struct JulesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl JulesClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get_page<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        page_token: Option<&str>,
    ) -> Result<T, ApiError> {
        let mut req = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("X-Goog-Api-Key", &self.api_key);
        if let Some(token) = page_token {
            req = req.query(&[("pageToken", token)]);
        }
        let response = check_status(req.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("X-Goog-Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn send_message(&self, session_id: &str, prompt: &str) -> Result<(), ApiError> {
        self.post(
            &format!("/sessions/{session_id}:sendMessage"),
            &json!({ "prompt": prompt }),
        )
        .await
    }
}

#[async_trait]
impl SessionSource for JulesClient {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let mut sessions = Vec::new();
        let mut token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page: SessionPage = self.get_page("/sessions", token.as_deref()).await?;
            sessions.extend(page.sessions.iter().filter_map(session_from_wire));
            token = page.next_page_token.filter(|t| !t.is_empty());
            if token.is_none() {
                break;
            }
        }
        debug!(count = sessions.len(), "listed sessions");
        Ok(sessions)
    }

    async fn list_activities(&self, session_id: &str) -> Result<Vec<Activity>, ApiError> {
        let path = format!("/sessions/{session_id}/activities");
        let mut activities = Vec::new();
        let mut token: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let page: ActivityPage = match self.get_page(&path, token.as_deref()).await {
                Ok(page) => page,
                // A new session has no activity collection yet.
                Err(e) if e.status_code() == Some(404) => break,
                Err(e) => return Err(e),
            };
            activities.extend(
                page.activities
                    .iter()
                    .map(|raw| activity_from_wire(session_id, raw)),
            );
            token = page.next_page_token.filter(|t| !t.is_empty());
            if token.is_none() {
                break;
            }
        }
        Ok(activities)
    }

    async fn approve_plan(&self, session_id: &str) -> Result<(), ApiError> {
        self.post(&format!("/sessions/{session_id}:approvePlan"), &json!({}))
            .await
    }

    async fn resume_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.send_message(session_id, RESUME_PROMPT).await
    }

    async fn create_activity(&self, request: &CreateActivityRequest) -> Result<Activity, ApiError> {
        self.send_message(&request.session_id, &request.content)
            .await?;
        // The API answers with an empty body; the agent's reply shows up as a later activity.
        Ok(Activity {
            id: "pending".into(),
            session_id: request.session_id.clone(),
            kind: ActivityKind::Message,
            role: ActivityRole::User,
            content: request.content.clone(),
            diff: None,
            bash_output: None,
            created_at: Some(Utc::now()),
        })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        code: status.as_u16(),
        message: status_message(status, &body),
    })
}

fn status_message(status: StatusCode, body: &str) -> String {
    match status {
        StatusCode::UNAUTHORIZED => {
            "Invalid API key. Please check your Jules API key in settings.".into()
        }
        StatusCode::FORBIDDEN => {
            "Access forbidden. Please ensure your API key has the correct permissions.".into()
        }
        StatusCode::NOT_FOUND => "Resource not found. The requested endpoint may not exist.".into(),
        _ => serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error").and_then(|e| e.get("message")))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16())),
    }
}
