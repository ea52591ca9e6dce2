//! Session data source: the agent platform the keeper supervises.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{Activity, CreateActivityRequest, Session};

mod client;
pub mod normalize;

pub use client::{JulesClient, RESUME_PROMPT};

/// Read and write access to agent sessions.
///
/// Every call may fail with a transport error; the supervision loop treats
/// all failures alike.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;
    /// Activities of one session, in no guaranteed order.
    async fn list_activities(&self, session_id: &str) -> Result<Vec<Activity>, ApiError>;
    async fn approve_plan(&self, session_id: &str) -> Result<(), ApiError>;
    async fn resume_session(&self, session_id: &str) -> Result<(), ApiError>;
    async fn create_activity(&self, request: &CreateActivityRequest) -> Result<Activity, ApiError>;
}
