//! Shared test fixtures: temp dirs, an HTTP stub, and fake collaborators for
//! the supervision loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::error::{ApiError, GatewayError};
use crate::jules::SessionSource;
use crate::keeper::Navigator;
use crate::supervisor::{ProviderKind, SupervisorGateway, SupervisorReply, SupervisorRequest};
use crate::types::{
    Activity, ActivityKind, ActivityRole, CreateActivityRequest, Session, SessionStatus,
};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

// ---------------------------------------------------------------------------
// Temp dirs
// ---------------------------------------------------------------------------

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("session-keeper-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

// ---------------------------------------------------------------------------
// HTTP stub
// ---------------------------------------------------------------------------

/// Canned response served by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// One request captured by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path including any query string.
    pub path: String,
    /// Header names lowercased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// Raw `TcpListener` HTTP/1.1 server answering one scripted response per
/// connection, in order, with `Connection: close`.
pub struct HttpStub {
    pub base_url: String,
    requests: Arc<StdMutex<Vec<RecordedRequest>>>,
}

impl HttpStub {
    pub async fn start(responses: Vec<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(StdMutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                if let Some(request) = read_request(&mut stream).await {
                    recorded.lock().expect("lock").push(request);
                }
                let reason = reqwest::StatusCode::from_u16(response.status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown");
                let raw = format!(
                    "HTTP/1.1 {} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    response.body.len(),
                    response.body
                );
                let _ = stream.write_all(raw.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

// ---------------------------------------------------------------------------
// Domain fixtures
// ---------------------------------------------------------------------------

/// Session with no timestamps and no raw state.
pub fn session(id: &str, status: SessionStatus) -> Session {
    Session {
        id: id.to_string(),
        title: format!("session {id}"),
        source_id: "acme/widgets".to_string(),
        status,
        raw_state: None,
        created_at: None,
        updated_at: None,
        last_activity_at: None,
    }
}

/// Active session whose last activity was `minutes` ago.
pub fn idle_session(id: &str, minutes: i64) -> Session {
    let mut s = session(id, SessionStatus::Active);
    s.last_activity_at = Some(Utc::now() - chrono::Duration::minutes(minutes));
    s
}

/// Agent message activity at a fixed time.
pub fn activity_at(session_id: &str, content: &str, at: DateTime<Utc>) -> Activity {
    Activity {
        id: format!("act-{}", at.timestamp()),
        session_id: session_id.to_string(),
        kind: ActivityKind::Message,
        role: ActivityRole::Agent,
        content: content.to_string(),
        diff: None,
        bash_output: None,
        created_at: Some(at),
    }
}

// ---------------------------------------------------------------------------
// Fake session source
// ---------------------------------------------------------------------------

/// Calls observed by [`FakeSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    ListSessions,
    ListActivities(String),
    ApprovePlan(String),
    Resume(String),
    CreateActivity(CreateActivityRequest),
}

/// Scripted [`SessionSource`] that records every call.
#[derive(Default)]
pub struct FakeSource {
    sessions: StdMutex<Vec<Session>>,
    activities: StdMutex<BTreeMap<String, Vec<Activity>>>,
    calls: StdMutex<Vec<SourceCall>>,
    fail_listing: AtomicBool,
    failing_sessions: StdMutex<BTreeSet<String>>,
    hold_listing: AtomicBool,
    /// Signalled when a held listing call has started.
    pub listing_started: Notify,
    /// Signal to let a held listing call finish.
    pub release_listing: Notify,
}

impl FakeSource {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self {
            sessions: StdMutex::new(sessions),
            ..Self::default()
        }
    }

    pub fn set_sessions(&self, sessions: Vec<Session>) {
        *self.sessions.lock().expect("lock") = sessions;
    }

    pub fn with_activities(self, session_id: &str, activities: Vec<Activity>) -> Self {
        self.activities
            .lock()
            .expect("lock")
            .insert(session_id.to_string(), activities);
        self
    }

    /// Make `list_sessions` fail.
    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// Make every write call for `session_id` fail.
    pub fn fail_session(&self, session_id: &str) {
        self.failing_sessions
            .lock()
            .expect("lock")
            .insert(session_id.to_string());
    }

    /// Block `list_sessions` until `release_listing` is notified.
    pub fn hold_listing(&self) {
        self.hold_listing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().expect("lock").clone()
    }

    /// Calls other than listing.
    pub fn writes(&self) -> Vec<SourceCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !matches!(c, SourceCall::ListSessions | SourceCall::ListActivities(_))
            })
            .collect()
    }

    pub fn count(&self, wanted: impl Fn(&SourceCall) -> bool) -> usize {
        self.calls().iter().filter(|c| wanted(c)).count()
    }

    fn record(&self, call: SourceCall) {
        self.calls.lock().expect("lock").push(call);
    }

    fn check_write(&self, session_id: &str) -> Result<(), ApiError> {
        if self.failing_sessions.lock().expect("lock").contains(session_id) {
            return Err(ApiError::Status {
                code: 503,
                message: format!("unavailable: {session_id}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SessionSource for FakeSource {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.record(SourceCall::ListSessions);
        if self.hold_listing.load(Ordering::SeqCst) {
            self.listing_started.notify_one();
            self.release_listing.notified().await;
        }
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                code: 500,
                message: "listing failed".into(),
            });
        }
        Ok(self.sessions.lock().expect("lock").clone())
    }

    async fn list_activities(&self, session_id: &str) -> Result<Vec<Activity>, ApiError> {
        self.record(SourceCall::ListActivities(session_id.to_string()));
        Ok(self
            .activities
            .lock()
            .expect("lock")
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn approve_plan(&self, session_id: &str) -> Result<(), ApiError> {
        self.record(SourceCall::ApprovePlan(session_id.to_string()));
        self.check_write(session_id)
    }

    async fn resume_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.record(SourceCall::Resume(session_id.to_string()));
        self.check_write(session_id)
    }

    async fn create_activity(&self, request: &CreateActivityRequest) -> Result<Activity, ApiError> {
        self.record(SourceCall::CreateActivity(request.clone()));
        self.check_write(&request.session_id)?;
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

// ---------------------------------------------------------------------------
// Fake gateway
// ---------------------------------------------------------------------------

/// [`SupervisorGateway`] answering from a queue and recording requests.
#[derive(Default)]
pub struct ScriptedGateway {
    replies: StdMutex<VecDeque<Result<SupervisorReply, GatewayError>>>,
    calls: StdMutex<Vec<(ProviderKind, SupervisorRequest)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_reply(&self, reply: SupervisorReply) {
        self.replies.lock().expect("lock").push_back(Ok(reply));
    }

    pub fn push_content(&self, content: &str) {
        self.push_reply(SupervisorReply {
            content: content.to_string(),
            ..SupervisorReply::default()
        });
    }

    pub fn push_error(&self, error: GatewayError) {
        self.replies.lock().expect("lock").push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<(ProviderKind, SupervisorRequest)> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SupervisorGateway for ScriptedGateway {
    async fn invoke(
        &self,
        provider: ProviderKind,
        request: &SupervisorRequest,
    ) -> Result<SupervisorReply, GatewayError> {
        self.calls
            .lock()
            .expect("lock")
            .push((provider, request.clone()));
        self.replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(GatewayError::Step {
                    step: "no scripted reply",
                    detail: String::new(),
                })
            })
    }
}

// ---------------------------------------------------------------------------
// Fake navigator
// ---------------------------------------------------------------------------

/// [`Navigator`] that records focus changes.
#[derive(Default)]
pub struct RecordingNavigator {
    current: StdMutex<Option<String>>,
    focused: StdMutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn viewing(session_id: &str) -> Self {
        Self {
            current: StdMutex::new(Some(session_id.to_string())),
            ..Self::default()
        }
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().expect("lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current(&self) -> Option<String> {
        self.current.lock().expect("lock").clone()
    }

    fn focus(&self, session_id: &str) {
        *self.current.lock().expect("lock") = Some(session_id.to_string());
        self.focused.lock().expect("lock").push(session_id.to_string());
    }
}
