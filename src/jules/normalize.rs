//! Normalization of raw Jules API payloads into [`Session`] and [`Activity`].
//!
//! The API's activity payloads are a union of loosely-typed event objects
//! (`planGenerated`, `progressUpdated`, ...). They are walked as
//! `serde_json::Value` and reduced to one display string plus optional
//! diff/bash artifacts.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::types::{Activity, ActivityKind, ActivityRole, Session, SessionStatus};

const GITHUB_SOURCE_PREFIX: &str = "sources/github/";
const ENVELOPE_KEYS: [&str; 4] = ["name", "createTime", "originator", "id"];

/// Map a raw API state onto the normalized status. Unknown states count as active.
pub fn map_state(raw: &str) -> SessionStatus {
    match raw {
        "COMPLETED" => SessionStatus::Completed,
        "FAILED" => SessionStatus::Failed,
        "PAUSED" => SessionStatus::Paused,
        "AWAITING_PLAN_APPROVAL" => SessionStatus::AwaitingApproval,
        _ => SessionStatus::Active,
    }
}

/// Build a session from one entry of `GET /sessions`. Entries without an id are dropped.
pub fn session_from_wire(raw: &Value) -> Option<Session> {
    let id = str_field(raw, "id")
        .or_else(|| str_field(raw, "name").and_then(|n| last_segment(&n)))?;
    let raw_state = str_field(raw, "state");
    let source_id = raw
        .get("sourceContext")
        .and_then(|ctx| str_field(ctx, "source"))
        .map(|s| s.replacen(GITHUB_SOURCE_PREFIX, "", 1))
        .unwrap_or_default();

    Some(Session {
        status: raw_state
            .as_deref()
            .map(map_state)
            .unwrap_or(SessionStatus::Active),
        title: str_field(raw, "title").unwrap_or_default(),
        source_id,
        raw_state,
        created_at: time_field(raw, "createTime"),
        updated_at: time_field(raw, "updateTime"),
        last_activity_at: time_field(raw, "lastActivityAt"),
        id,
    })
}

/// Build an activity from one entry of `GET /sessions/{id}/activities`.
pub fn activity_from_wire(session_id: &str, raw: &Value) -> Activity {
    let id = str_field(raw, "name")
        .and_then(|n| last_segment(&n))
        .or_else(|| str_field(raw, "id"))
        .unwrap_or_default();

    let (kind, content, event) = classify(raw);
    let content = content
        .or_else(|| fallback_content(raw))
        .unwrap_or_else(|| payload_keys(raw));

    let artifacts = event
        .and_then(|e| e.get("artifacts"))
        .or_else(|| raw.get("artifacts"))
        .and_then(Value::as_array);
    let diff = artifacts
        .and_then(|list| list.first())
        .and_then(artifact_diff);
    let bash_output = artifacts.and_then(|list| {
        list.iter()
            .find_map(|a| a.get("bashOutput").and_then(|b| str_field(b, "output")))
    });

    Activity {
        id,
        session_id: session_id.to_string(),
        kind,
        role: if raw.get("originator").and_then(Value::as_str) == Some("agent") {
            ActivityRole::Agent
        } else {
            ActivityRole::User
        },
        content,
        diff,
        bash_output,
        created_at: time_field(raw, "createTime"),
    }
}

fn classify(raw: &Value) -> (ActivityKind, Option<String>, Option<&Value>) {
    if let Some(event) = raw.get("planGenerated") {
        let plan = event.get("plan").unwrap_or(event);
        let content = first_str(plan, &["description", "summary", "title"])
            .or_else(|| pretty(plan.get("steps").unwrap_or(plan)));
        return (ActivityKind::Plan, content, Some(event));
    }
    if let Some(event) = raw.get("planApproved") {
        return (ActivityKind::Plan, Some("Plan approved".into()), Some(event));
    }
    if let Some(event) = raw.get("progressUpdated") {
        let content = first_str(event, &["progressDescription", "description", "message"])
            .or_else(|| pretty(event));
        return (ActivityKind::Progress, content, Some(event));
    }
    if let Some(event) = raw.get("sessionCompleted") {
        let content = first_str(event, &["summary", "message"])
            .unwrap_or_else(|| "Session completed".into());
        return (ActivityKind::Result, Some(content), Some(event));
    }
    if let Some(event) = raw.get("sessionFailed") {
        let content =
            first_str(event, &["reason", "message"]).unwrap_or_else(|| "Session failed".into());
        return (ActivityKind::Error, Some(content), Some(event));
    }
    if let Some(event) = raw.get("agentMessaged") {
        return (
            ActivityKind::Message,
            first_str(event, &["agentMessage", "message"]),
            Some(event),
        );
    }
    if let Some(event) = raw.get("userMessage") {
        return (
            ActivityKind::Message,
            first_str(event, &["message", "content"]),
            Some(event),
        );
    }
    (ActivityKind::Message, None, None)
}

fn fallback_content(raw: &Value) -> Option<String> {
    first_str(raw, &["message", "content", "text", "description"])
        .or_else(|| raw.get("artifacts").and_then(pretty))
}

fn payload_keys(raw: &Value) -> String {
    let keys: Vec<&str> = raw
        .as_object()
        .map(Map::keys)
        .into_iter()
        .flatten()
        .map(String::as_str)
        .filter(|k| !ENVELOPE_KEYS.contains(k))
        .collect();
    format!("[{}]", keys.join(", "))
}

fn artifact_diff(artifact: &Value) -> Option<String> {
    let change_set = artifact.get("changeSet")?;
    change_set
        .get("gitPatch")
        .and_then(|p| str_field(p, "unidiffPatch"))
        .or_else(|| str_field(change_set, "unidiffPatch"))
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| str_field(value, k))
}

/// Non-empty string field.
fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn time_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

fn last_segment(name: &str) -> Option<String> {
    name.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn pretty(value: &Value) -> Option<String> {
    serde_json::to_string_pretty(value)
        .ok()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn maps_known_states_and_defaults_to_active() {
        assert_eq!(map_state("COMPLETED"), SessionStatus::Completed);
        assert_eq!(map_state("FAILED"), SessionStatus::Failed);
        assert_eq!(map_state("PAUSED"), SessionStatus::Paused);
        assert_eq!(
            map_state("AWAITING_PLAN_APPROVAL"),
            SessionStatus::AwaitingApproval
        );
        assert_eq!(map_state("IN_PROGRESS"), SessionStatus::Active);
        assert_eq!(map_state("QUEUED"), SessionStatus::Active);
        assert_eq!(map_state("SOMETHING_NEW"), SessionStatus::Active);
    }

    #[test]
    fn session_keeps_raw_state_and_strips_source_prefix() {
        let raw = json!({
            "id": "123456789",
            "title": "Fix flaky test",
            "state": "IN_PROGRESS",
            "sourceContext": {"source": "sources/github/acme/widgets"},
            "createTime": "2025-03-01T10:00:00Z",
            "updateTime": "2025-03-01T10:05:00.123Z"
        });
        let session = session_from_wire(&raw).expect("session");
        assert_eq!(session.id, "123456789");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.raw_state.as_deref(), Some("IN_PROGRESS"));
        assert_eq!(session.source_id, "acme/widgets");
        assert_eq!(
            session.created_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
        );
        assert!(session.updated_at.is_some());
        assert!(session.last_activity_at.is_none());
    }

    #[test]
    fn session_without_id_is_dropped() {
        assert!(session_from_wire(&json!({"state": "PAUSED"})).is_none());
        let from_name = session_from_wire(&json!({"name": "sessions/abc"})).unwrap();
        assert_eq!(from_name.id, "abc");
    }

    #[test]
    fn plan_generated_prefers_description_then_steps() {
        let raw = json!({
            "name": "sessions/s/activities/a1",
            "originator": "agent",
            "planGenerated": {"plan": {"steps": [{"title": "one"}]}}
        });
        let activity = activity_from_wire("s", &raw);
        assert_eq!(activity.id, "a1");
        assert_eq!(activity.kind, ActivityKind::Plan);
        assert_eq!(activity.role, ActivityRole::Agent);
        assert!(activity.content.contains("\"title\": \"one\""));

        let raw = json!({"planGenerated": {"plan": {"description": "Refactor parser"}}});
        assert_eq!(activity_from_wire("s", &raw).content, "Refactor parser");
    }

    #[test]
    fn progress_extracts_diff_and_bash_output() {
        let raw = json!({
            "originator": "agent",
            "createTime": "2025-03-01T10:00:00Z",
            "progressUpdated": {
                "title": "Ran tests",
                "description": "All green",
                "artifacts": [
                    {"changeSet": {"gitPatch": {"unidiffPatch": "--- a\n+++ b\n"}}},
                    {"bashOutput": {"command": "cargo test", "output": "ok"}}
                ]
            }
        });
        let activity = activity_from_wire("s", &raw);
        assert_eq!(activity.kind, ActivityKind::Progress);
        assert_eq!(activity.content, "All green");
        assert_eq!(activity.diff.as_deref(), Some("--- a\n+++ b\n"));
        assert_eq!(activity.bash_output.as_deref(), Some("ok"));
        assert!(activity.created_at.is_some());
    }

    #[test]
    fn completed_and_messages() {
        let done = activity_from_wire("s", &json!({"sessionCompleted": {}}));
        assert_eq!(done.kind, ActivityKind::Result);
        assert_eq!(done.content, "Session completed");

        let agent = activity_from_wire(
            "s",
            &json!({"originator": "agent", "agentMessaged": {"agentMessage": "Done with step 2"}}),
        );
        assert_eq!(agent.content, "Done with step 2");

        let user = activity_from_wire(
            "s",
            &json!({"originator": "user", "userMessage": {"message": "keep going"}}),
        );
        assert_eq!(user.role, ActivityRole::User);
        assert_eq!(user.kind, ActivityKind::Message);
        assert_eq!(user.content, "keep going");
    }

    #[test]
    fn unknown_payload_falls_back_to_key_list() {
        let raw = json!({
            "name": "sessions/s/activities/a9",
            "createTime": "2025-03-01T10:00:00Z",
            "originator": "system",
            "somethingNew": {"x": 1},
            "other": true
        });
        let activity = activity_from_wire("s", &raw);
        assert_eq!(activity.content, "[other, somethingNew]");
        assert_eq!(activity.role, ActivityRole::User);
    }
}
