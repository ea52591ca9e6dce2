//! session-keeper: an auto-pilot for Jules coding sessions.
//!
//! The crate watches a user's sessions on an interval and keeps them moving:
//! paused or finished sessions are resumed, plans waiting for approval are
//! approved, and agents idle past a threshold get a nudge. Nudges come either
//! from a configured message list or from an LLM supervisor reached through
//! a provider-neutral gateway (OpenAI chat, OpenAI assistants, Anthropic,
//! Gemini).
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use session_keeper::jules::JulesClient;
//! use session_keeper::keeper::SessionKeeper;
//! use session_keeper::store::JsonFileStore;
//! use session_keeper::supervisor::HttpGateway;
//!
//! # async fn example() {
//! let timeout = Duration::from_secs(30);
//! let source = Arc::new(JulesClient::new("https://jules.googleapis.com/v1alpha", "key", timeout));
//! let store = Arc::new(JsonFileStore::open("/tmp/keeper").unwrap());
//! let keeper = SessionKeeper::new(source, Arc::new(HttpGateway::new(timeout)), store.clone(), store);
//! let outcome = keeper.run_pass().await;
//! println!("{outcome:?}");
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod jules;
pub mod keeper;
pub mod store;
pub mod supervisor;
#[cfg(test)]
pub mod testsupport;
pub mod types;
