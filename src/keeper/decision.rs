//! Per-session action selection.
//!
//! Pure function of the session, the config, the current time and the
//! archive set. First match wins:
//! 1. archived: skip
//! 2. paused / completed / failed: resume
//! 3. awaiting approval (status or raw state): approve the plan
//! 4. idle longer than the applicable threshold: nudge

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::config::SupervisionConfig;
use crate::types::{
    Session, SessionStatus, RAW_STATE_AWAITING_PLAN_APPROVAL, RAW_STATE_IN_PROGRESS,
};

/// Sessions in `IN_PROGRESS` idle for less than this are streaming output.
pub const ACTIVE_WORK_GRACE_MS: i64 = 30_000;

/// Why a session gets no action this pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Archived,
    /// `IN_PROGRESS` and idle under the grace period.
    Working,
    NotInactive { idle_minutes: f64, threshold: f64 },
    /// Neither `last_activity_at` nor `updated_at` is known.
    NoTimestamp,
}

/// What the loop should do with one session.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Skip(SkipReason),
    Resume,
    ApprovePlan,
    Nudge { idle_minutes: f64 },
}

pub fn decide(
    session: &Session,
    config: &SupervisionConfig,
    now: DateTime<Utc>,
    archived: &BTreeSet<String>,
) -> Decision {
    if archived.contains(&session.id) {
        return Decision::Skip(SkipReason::Archived);
    }
    if session.status.is_resumable() {
        return Decision::Resume;
    }
    if session.status == SessionStatus::AwaitingApproval
        || session.raw_state_is(RAW_STATE_AWAITING_PLAN_APPROVAL)
    {
        return Decision::ApprovePlan;
    }

    let Some(reference) = session.idle_reference() else {
        return Decision::Skip(SkipReason::NoTimestamp);
    };
    let idle_ms = (now - reference).num_milliseconds();
    let idle_minutes = idle_ms as f64 / 60_000.0;

    let threshold = if session.raw_state_is(RAW_STATE_IN_PROGRESS) {
        if idle_ms < ACTIVE_WORK_GRACE_MS {
            return Decision::Skip(SkipReason::Working);
        }
        config.active_work_threshold_minutes
    } else {
        config.inactivity_threshold_minutes
    };

    if idle_minutes > threshold {
        Decision::Nudge { idle_minutes }
    } else {
        Decision::Skip(SkipReason::NotInactive {
            idle_minutes,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::session;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn none() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn archived_sessions_are_skipped_before_anything_else() {
        let s = session("A", SessionStatus::Paused);
        let archived = BTreeSet::from(["A".to_string()]);
        assert_eq!(
            decide(&s, &SupervisionConfig::default(), now(), &archived),
            Decision::Skip(SkipReason::Archived)
        );
    }

    #[test]
    fn terminal_and_paused_sessions_resume() {
        for status in [
            SessionStatus::Paused,
            SessionStatus::Completed,
            SessionStatus::Failed,
        ] {
            let s = session("A", status);
            assert_eq!(
                decide(&s, &SupervisionConfig::default(), now(), &none()),
                Decision::Resume
            );
        }
    }

    #[test]
    fn awaiting_approval_by_status_or_raw_state() {
        let s = session("B", SessionStatus::AwaitingApproval);
        assert_eq!(
            decide(&s, &SupervisionConfig::default(), now(), &none()),
            Decision::ApprovePlan
        );

        let mut s = session("B", SessionStatus::Active);
        s.raw_state = Some(RAW_STATE_AWAITING_PLAN_APPROVAL.into());
        assert_eq!(
            decide(&s, &SupervisionConfig::default(), now(), &none()),
            Decision::ApprovePlan
        );
    }

    #[test]
    fn idle_beyond_threshold_nudges() {
        let mut s = session("C", SessionStatus::Active);
        s.updated_at = Some(now() - Duration::minutes(5));
        match decide(&s, &SupervisionConfig::default(), now(), &none()) {
            Decision::Nudge { idle_minutes } => assert!((idle_minutes - 5.0).abs() < 1e-9),
            other => panic!("expected nudge, got {other:?}"),
        }
    }

    #[test]
    fn last_activity_takes_precedence_over_updated_at() {
        let mut s = session("C", SessionStatus::Active);
        s.updated_at = Some(now() - Duration::minutes(30));
        s.last_activity_at = Some(now() - Duration::seconds(20));
        assert!(matches!(
            decide(&s, &SupervisionConfig::default(), now(), &none()),
            Decision::Skip(SkipReason::NotInactive { .. })
        ));
    }

    #[test]
    fn in_progress_uses_active_work_threshold() {
        let mut s = session("D", SessionStatus::Active);
        s.raw_state = Some(RAW_STATE_IN_PROGRESS.into());
        s.updated_at = Some(now() - Duration::minutes(10));
        let decision = decide(&s, &SupervisionConfig::default(), now(), &none());
        assert_eq!(
            decision,
            Decision::Skip(SkipReason::NotInactive {
                idle_minutes: 10.0,
                threshold: 30.0
            })
        );
    }

    #[test]
    fn in_progress_under_grace_is_never_touched() {
        let mut config = SupervisionConfig::default();
        config.active_work_threshold_minutes = 0.0;
        config.inactivity_threshold_minutes = 0.0;
        let mut s = session("D", SessionStatus::Active);
        s.raw_state = Some(RAW_STATE_IN_PROGRESS.into());
        s.last_activity_at = Some(now() - Duration::seconds(29));
        assert_eq!(
            decide(&s, &config, now(), &none()),
            Decision::Skip(SkipReason::Working)
        );
    }

    #[test]
    fn equal_to_threshold_is_not_inactive() {
        let mut s = session("E", SessionStatus::Active);
        s.updated_at = Some(now() - Duration::minutes(1));
        assert!(matches!(
            decide(&s, &SupervisionConfig::default(), now(), &none()),
            Decision::Skip(SkipReason::NotInactive { .. })
        ));
    }

    #[test]
    fn missing_timestamps_skip() {
        let s = session("F", SessionStatus::Active);
        assert_eq!(
            decide(&s, &SupervisionConfig::default(), now(), &none()),
            Decision::Skip(SkipReason::NoTimestamp)
        );
    }
}
