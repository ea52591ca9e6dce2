//! Interval driver for the supervision loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::{PassOutcome, SessionKeeper};

/// How often a disabled keeper is checked for `config enable`.
const ENABLE_POLL: Duration = Duration::from_secs(1);

/// Runs [`SessionKeeper::run_pass`] every `checkIntervalSeconds` until cancelled.
///
/// Each pass runs on its own task, so a slow pass never delays the timer.
/// A tick that lands while the previous pass is still running is dropped.
/// The first tick fires immediately, and so does the first tick after the
/// keeper goes from disabled to enabled.
pub struct Scheduler {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn start(keeper: Arc<SessionKeeper>) -> Self {
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(run(keeper, cancelled));
        Self { cancel, task }
    }

    /// Stop ticking. Safe to call more than once. A pass already in flight
    /// runs to completion.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Wait for the tick loop to exit and for any in-flight pass to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

async fn run(keeper: Arc<SessionKeeper>, mut cancelled: watch::Receiver<bool>) {
    let mut period = keeper.check_interval();
    let mut ticker = new_ticker(Instant::now(), period);
    let mut enable_poll = interval(ENABLE_POLL);
    enable_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut enabled = keeper.is_enabled();
    let mut in_flight: Option<JoinHandle<()>> = None;
    info!(interval_secs = period.as_secs(), "auto-pilot scheduler started");

    loop {
        tokio::select! {
            biased;
            changed = cancelled.changed() => {
                if changed.is_err() || *cancelled.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if in_flight.as_ref().is_some_and(|pass| !pass.is_finished()) {
                    debug!("tick skipped: pass in flight");
                } else {
                    in_flight = Some(tokio::spawn(run_one_pass(keeper.clone())));
                }

                let next = keeper.check_interval();
                if next != period {
                    info!(
                        from_secs = period.as_secs(),
                        to_secs = next.as_secs(),
                        "check interval changed"
                    );
                    period = next;
                    ticker = ticker_after(period);
                }
            }
            _ = enable_poll.tick() => {
                let now_enabled = keeper.is_enabled();
                if now_enabled && !enabled {
                    info!("auto-pilot enabled; checking sessions now");
                    period = keeper.check_interval();
                    ticker = new_ticker(Instant::now(), period);
                }
                enabled = now_enabled;
            }
        }
    }

    if let Some(pass) = in_flight {
        debug!("waiting for in-flight pass");
        let _ = pass.await;
    }
    info!("auto-pilot scheduler stopped");
}

async fn run_one_pass(keeper: Arc<SessionKeeper>) {
    match keeper.run_pass().await {
        PassOutcome::Skipped => debug!("tick skipped: pass in flight"),
        PassOutcome::Disabled => debug!("tick skipped: auto-pilot disabled"),
        PassOutcome::Failed(reason) => debug!(%reason, "pass failed"),
        PassOutcome::Completed(report) => debug!(?report, "pass finished"),
    }
}

fn new_ticker(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn ticker_after(period: Duration) -> Interval {
    new_ticker(Instant::now() + period, period)
}
