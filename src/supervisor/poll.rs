//! Bounded polling of an asynchronous run's status.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// How long to wait between status checks and how many checks to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: 30,
        }
    }
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed(String),
    /// Attempts ran out; carries the last status seen.
    TimedOut(String),
}

fn classify(status: &str) -> Option<PollOutcome> {
    match status {
        "completed" => Some(PollOutcome::Completed),
        "failed" => Some(PollOutcome::Failed(status.to_string())),
        _ => None,
    }
}

/// Poll until the status is terminal or `policy.max_attempts` checks were made.
///
/// `initial` is the status reported when the run was created; it is examined
/// before the first sleep. Errors from `check` abort polling.
pub async fn poll_until_terminal<F, Fut, E>(
    policy: PollPolicy,
    initial: String,
    mut check: F,
) -> Result<PollOutcome, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    let mut status = initial;
    let mut attempts = 0;
    loop {
        if let Some(outcome) = classify(&status) {
            return Ok(outcome);
        }
        if attempts >= policy.max_attempts {
            return Ok(PollOutcome::TimedOut(status));
        }
        sleep(policy.interval).await;
        status = check().await?;
        attempts += 1;
    }
}
