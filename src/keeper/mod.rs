//! The supervision loop.
//!
//! [`SessionKeeper::run_pass`] evaluates every session once: it decides an
//! action per session (see [`decision`]), performs it against the session
//! source, and records what happened in a rolling [`ActivityLog`]. The
//! [`Scheduler`] runs passes on an interval.
//!
//! All collaborators are injected, so the loop never reaches for ambient
//! state: sessions come from a [`SessionSource`], supervisor replies from a
//! [`SupervisorGateway`], config and memory from the store traits, focus
//! changes go to a [`Navigator`].

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::archive::ArchiveFilter;
use crate::config::SupervisionConfig;
use crate::error::{GatewayError, KeeperError};
use crate::jules::SessionSource;
use crate::store::{ConfigStore, MemoryMap, MemoryStore};
use crate::supervisor::{SupervisorGateway, SupervisorRequest};
use crate::types::{short_id, ChatMessage, CreateActivityRequest, Session};

mod context;
pub mod decision;
pub mod log;
mod scheduler;

pub use context::{build_turn, SupervisorTurn};
pub use decision::{decide, Decision, SkipReason};
pub use log::{ActivityLog, LogEntry, LogKind, LOG_CAPACITY};
pub use scheduler::Scheduler;

/// Characters of a nudge echoed in the activity log.
const NUDGE_PREVIEW_CHARS: usize = 20;

/// Where the user is looking, and how to move them.
pub trait Navigator: Send + Sync {
    /// Session currently in view, if any.
    fn current(&self) -> Option<String>;
    fn focus(&self, session_id: &str);
}

/// Headless navigator: remembers the focused session and logs each switch.
#[derive(Debug, Default)]
pub struct LogNavigator {
    current: Mutex<Option<String>>,
}

impl Navigator for LogNavigator {
    fn current(&self) -> Option<String> {
        lock(&self.current).clone()
    }

    fn focus(&self, session_id: &str) {
        info!(session_id, "switching focus");
        *lock(&self.current) = Some(session_id.to_string());
    }
}

/// Counts of what one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub sessions: usize,
    pub resumed: usize,
    pub approved: usize,
    pub nudged: usize,
    /// Nudges whose content came from the supervisor.
    pub smart_nudges: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Session focus moved to during this pass.
    pub focused: Option<String>,
}

/// How a call to [`SessionKeeper::run_pass`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was in flight; nothing was done.
    Skipped,
    /// `isEnabled` is off.
    Disabled,
    /// The pass could not start (config load or session listing failed).
    Failed(String),
    Completed(PassReport),
}

struct Pass {
    config: SupervisionConfig,
    focused: bool,
    report: PassReport,
}

/// Clears the running flag on every exit path.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SessionKeeper {
    source: Arc<dyn SessionSource>,
    gateway: Arc<dyn SupervisorGateway>,
    config_store: Arc<dyn ConfigStore>,
    memory_store: Arc<dyn MemoryStore>,
    navigator: Arc<dyn Navigator>,
    archive: Arc<dyn ArchiveFilter>,
    running: AtomicBool,
    log: Mutex<ActivityLog>,
}

impl SessionKeeper {
    pub fn new(
        source: Arc<dyn SessionSource>,
        gateway: Arc<dyn SupervisorGateway>,
        config_store: Arc<dyn ConfigStore>,
        memory_store: Arc<dyn MemoryStore>,
    ) -> Self {
        Self {
            source,
            gateway,
            config_store,
            memory_store,
            navigator: Arc::new(LogNavigator::default()),
            archive: Arc::new(std::collections::BTreeSet::<String>::new()),
            running: AtomicBool::new(false),
            log: Mutex::new(ActivityLog::default()),
        }
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn ArchiveFilter>) -> Self {
        self.archive = archive;
        self
    }

    /// True while a pass is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Logged actions, skips and errors, newest first.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        lock(&self.log).entries()
    }

    /// Interval configured for the scheduler. Falls back to the default on a store error.
    pub fn check_interval(&self) -> Duration {
        self.config_store
            .load_config()
            .unwrap_or_default()
            .check_interval()
    }

    /// Whether `isEnabled` is on. A store error reads as disabled.
    pub fn is_enabled(&self) -> bool {
        self.config_store
            .load_config()
            .map(|config| config.is_enabled)
            .unwrap_or(false)
    }

    fn record(&self, kind: LogKind, message: impl Into<String>) {
        lock(&self.log).record(kind, message);
    }

    /// Evaluate every session once.
    ///
    /// Returns [`PassOutcome::Skipped`] without touching anything when a pass
    /// is already running.
    pub async fn run_pass(&self) -> PassOutcome {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            debug!("pass already in flight; tick dropped");
            return PassOutcome::Skipped;
        };

        let config = match self.config_store.load_config() {
            Ok(config) => config,
            Err(e) => {
                self.record(LogKind::Error, format!("Error: {e}"));
                return PassOutcome::Failed(e.to_string());
            }
        };
        if !config.is_enabled {
            debug!("auto-pilot disabled; pass not run");
            return PassOutcome::Disabled;
        }

        self.record(LogKind::Info, "Checking sessions...");
        let sessions = match self.source.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                self.record(LogKind::Error, format!("Error: {e}"));
                return PassOutcome::Failed(e.to_string());
            }
        };
        let archived = self.archive.archived_ids().unwrap_or_else(|e| {
            warn!(error = %e, "could not read archived sessions; treating none as archived");
            Default::default()
        });
        let mut memory = match self.memory_store.load_memory() {
            Ok(memory) => Some(memory),
            Err(e) => {
                warn!(error = %e, "could not load supervisor memory; smart pilot off this pass");
                None
            }
        };

        let now = Utc::now();
        let mut pass = Pass {
            config,
            focused: false,
            report: PassReport {
                sessions: sessions.len(),
                ..PassReport::default()
            },
        };

        for session in &sessions {
            let decision = decide(session, &pass.config, now, &archived);
            if let Err(e) = self
                .act(session, decision, &mut pass, memory.as_mut())
                .await
            {
                pass.report.errors += 1;
                self.record(
                    LogKind::Error,
                    format!("Error processing {}: {e}", session.short_id()),
                );
            }
        }

        info!(
            sessions = pass.report.sessions,
            resumed = pass.report.resumed,
            approved = pass.report.approved,
            nudged = pass.report.nudged,
            errors = pass.report.errors,
            "pass complete"
        );
        PassOutcome::Completed(pass.report)
    }

    async fn act(
        &self,
        session: &Session,
        decision: Decision,
        pass: &mut Pass,
        memory: Option<&mut MemoryMap>,
    ) -> Result<(), KeeperError> {
        let short = session.short_id();
        match decision {
            Decision::Skip(reason) => {
                pass.report.skipped += 1;
                if let Some(message) = skip_message(short, &reason) {
                    self.record(LogKind::Skip, message);
                }
            }
            Decision::Resume => {
                self.record(
                    LogKind::Action,
                    format!("Resuming {} session {short}...", session.status.as_str()),
                );
                self.maybe_focus(&session.id, pass);
                self.source.resume_session(&session.id).await?;
                self.record(LogKind::Action, format!("Resumed {short}"));
                pass.report.resumed += 1;
            }
            Decision::ApprovePlan => {
                self.record(
                    LogKind::Action,
                    format!("Approving plan for session {short}..."),
                );
                self.maybe_focus(&session.id, pass);
                self.source.approve_plan(&session.id).await?;
                self.record(LogKind::Action, format!("Plan approved for {short}"));
                pass.report.approved += 1;
            }
            Decision::Nudge { idle_minutes } => {
                self.nudge(session, idle_minutes, pass, memory).await?;
            }
        }
        Ok(())
    }

    async fn nudge(
        &self,
        session: &Session,
        idle_minutes: f64,
        pass: &mut Pass,
        memory: Option<&mut MemoryMap>,
    ) -> Result<(), KeeperError> {
        let short = session.short_id();

        let pool = pass.config.messages_for(&session.id);
        if pool.is_empty() {
            pass.report.skipped += 1;
            self.record(
                LogKind::Skip,
                format!("Skipped {short}: No messages configured"),
            );
            return Ok(());
        }

        let mut smart = None;
        if pass.config.smart_pilot_ready() {
            let result = match memory {
                Some(memory) => {
                    self.supervisor_message(session, idle_minutes, &pass.config, memory)
                        .await
                }
                None => Err(KeeperError::Gateway(GatewayError::Step {
                    step: "supervisor memory unavailable",
                    detail: String::new(),
                })),
            };
            match result {
                Ok(content) => smart = Some(content),
                Err(e) => warn!(
                    session_id = %session.id,
                    provider = %pass.config.supervisor_provider,
                    error = %e,
                    "supervisor unavailable; using fallback message"
                ),
            }
        }

        let from_supervisor = smart.is_some();
        let Some(message) = smart.or_else(|| pick_message(pool)) else {
            return Ok(());
        };

        self.record(
            LogKind::Action,
            format!(
                "Sending nudge to {short} ({}m inactive)",
                idle_minutes.round()
            ),
        );
        self.maybe_focus(&session.id, pass);
        self.source
            .create_activity(&CreateActivityRequest::message(&session.id, &message))
            .await?;

        let preview: String = message.chars().take(NUDGE_PREVIEW_CHARS).collect();
        self.record(
            LogKind::Action,
            format!("Nudge sent to {short}: \"{preview}...\""),
        );
        pass.report.nudged += 1;
        if from_supervisor {
            pass.report.smart_nudges += 1;
        }
        Ok(())
    }

    /// One supervisor round-trip for `session`, persisting memory on both sides of the call.
    async fn supervisor_message(
        &self,
        session: &Session,
        idle_minutes: f64,
        config: &SupervisionConfig,
        memory: &mut MemoryMap,
    ) -> Result<String, KeeperError> {
        let provider = config.supervisor_provider;
        let window = config.context_window();
        let activities = self.source.list_activities(&session.id).await?;
        let turn = build_turn(
            activities,
            memory.get(&session.id),
            idle_minutes,
            provider,
            window,
        );
        debug!(
            session_id = %session.id,
            provider = %provider,
            new_activities = turn.new_activities,
            messages = turn.messages.len(),
            "consulting supervisor"
        );

        // Advance before the call so a failure does not replay the same activities.
        let entry = memory.entry(session.id.clone()).or_default();
        if let Some(at) = turn.high_water {
            entry.advance_high_water(at);
        }
        let handles = entry.handles();
        self.memory_store.save_memory(memory)?;

        let request = SupervisorRequest {
            messages: turn.messages,
            api_key: config.supervisor_api_key.clone(),
            model: config.supervisor_model.clone(),
            handles,
        };
        let reply = self.gateway.invoke(provider, &request).await?;
        let content = reply.content.trim().to_string();
        if content.is_empty() {
            return Err(KeeperError::Gateway(GatewayError::Step {
                step: "supervisor returned no content",
                detail: String::new(),
            }));
        }

        let entry = memory.entry(session.id.clone()).or_default();
        entry.push_history(
            [turn.user_turn, ChatMessage::assistant(content.clone())],
            window,
        );
        entry.remember_handles(&reply.handles);
        self.memory_store.save_memory(memory)?;
        Ok(content)
    }

    /// Move focus at most once per pass, and never to the session already in view.
    fn maybe_focus(&self, session_id: &str, pass: &mut Pass) {
        if !pass.config.auto_switch || pass.focused {
            return;
        }
        if self.navigator.current().as_deref() == Some(session_id) {
            return;
        }
        self.navigator.focus(session_id);
        pass.focused = true;
        pass.report.focused = Some(session_id.to_string());
    }
}

fn skip_message(short: &str, reason: &SkipReason) -> Option<String> {
    match reason {
        SkipReason::Archived => None,
        SkipReason::Working => Some(format!("Skipped {short}: Working (Active < 30s)")),
        SkipReason::NotInactive {
            idle_minutes,
            threshold,
        } if *idle_minutes > 1.0 => Some(format!(
            "Skipped {short}: Not inactive enough ({}m < {threshold}m)",
            (idle_minutes * 10.0).round() / 10.0
        )),
        SkipReason::NotInactive { .. } => None,
        SkipReason::NoTimestamp => Some(format!("Skipped {short}: No activity timestamp")),
    }
}

/// Uniform random pick; `None` for an empty list.
fn pick_message(messages: &[String]) -> Option<String> {
    messages.choose(&mut rand::thread_rng()).cloned()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Display helper shared with the CLI.
pub fn describe_session(session: &Session) -> String {
    format!(
        "{} [{}] {}",
        short_id(&session.id),
        session.raw_state.as_deref().unwrap_or(session.status.as_str()),
        session.title
    )
}
