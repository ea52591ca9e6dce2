//! Supervisor context assembly.
//!
//! Turns a session's activities plus its stored memory into the message list
//! for one supervisor call. Only activities newer than the memory's
//! high-water mark are framed; older ones are already reflected in history
//! (stateless providers) or in the remote thread (stateful provider).

use chrono::{DateTime, Utc};

use crate::store::{truncate_oldest, SupervisorMemory};
use crate::supervisor::ProviderKind;
use crate::types::{Activity, ActivityRole, ChatMessage, ChatRole};

const FULL_HISTORY_HEADER: &str = "Here is the full history of the session so far:";
const UPDATES_HEADER: &str = "Here are the updates since your last instruction:";
const BASH_OUTPUT_PREVIEW_CHARS: usize = 500;

/// Everything the keeper needs for one supervisor round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorTurn {
    /// The new user turn; appended to history after a successful reply.
    pub user_turn: ChatMessage,
    /// Messages to send, already bounded for the provider.
    pub messages: Vec<ChatMessage>,
    /// Timestamp of the newest framed activity, if any carried one.
    pub high_water: Option<DateTime<Utc>>,
    pub new_activities: usize,
}

/// Build the supervisor call for one session.
///
/// `memory` is `None` on the first interaction with the session. `window`
/// bounds the stateless message list.
pub fn build_turn(
    mut activities: Vec<Activity>,
    memory: Option<&SupervisorMemory>,
    idle_minutes: f64,
    provider: ProviderKind,
    window: usize,
) -> SupervisorTurn {
    activities.sort_by_key(|a| a.created_at);
    let mark = memory.and_then(|m| m.last_processed_activity_timestamp);
    let fresh: Vec<&Activity> = activities
        .iter()
        .filter(|a| is_after_mark(a, mark))
        .collect();

    let content = if fresh.is_empty() {
        inactivity_instruction(idle_minutes)
    } else {
        let header = if memory.is_none() {
            FULL_HISTORY_HEADER
        } else {
            UPDATES_HEADER
        };
        let body: Vec<String> = fresh.iter().copied().map(render_activity).collect();
        format!("{header}\n\n{}", body.join("\n\n"))
    };
    let high_water = fresh.iter().rev().find_map(|a| a.created_at);
    let user_turn = ChatMessage::user(content);

    let messages = if provider.is_stateful() {
        vec![user_turn.clone()]
    } else {
        let mut messages = memory.map(|m| m.history.clone()).unwrap_or_default();
        messages.push(user_turn.clone());
        truncate_oldest(&mut messages, window.max(1));
        // Stateless providers expect the conversation to open with a user turn.
        let leading = messages
            .iter()
            .take_while(|m| m.role == ChatRole::Assistant)
            .count();
        messages.drain(..leading);
        messages
    };

    SupervisorTurn {
        user_turn,
        messages,
        high_water,
        new_activities: fresh.len(),
    }
}

fn is_after_mark(activity: &Activity, mark: Option<DateTime<Utc>>) -> bool {
    match (mark, activity.created_at) {
        (None, _) => true,
        (Some(mark), Some(at)) => at > mark,
        (Some(_), None) => false,
    }
}

fn inactivity_instruction(idle_minutes: f64) -> String {
    format!(
        "The agent has been inactive for {} minutes with no new activity. Provide a nudge to get it moving again.",
        idle_minutes.round()
    )
}

fn render_activity(activity: &Activity) -> String {
    let who = match activity.role {
        ActivityRole::Agent => "Agent",
        ActivityRole::User => "User",
    };
    let mut out = format!(
        "{who} ({}): {}",
        activity.kind.as_str(),
        activity.content.trim()
    );
    if let Some(diff) = &activity.diff {
        out.push_str(&format!("\n[code changes: {} diff lines]", diff.lines().count()));
    }
    if let Some(output) = &activity.bash_output {
        let preview: String = output.chars().take(BASH_OUTPUT_PREVIEW_CHARS).collect();
        out.push_str(&format!("\n[command output]\n{preview}"));
    }
    out
}


#[cfg(all(test, feature = "fuzz-tests"))]
mod prop_tests {
    use super::*;
    use crate::testsupport::activity_at;
    use chrono::TimeZone;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn stateless_messages_never_exceed_window(
            history_len in 0usize..120,
            window in 1usize..=50,
            minutes in proptest::collection::vec(0u32..59, 0..20),
        ) {
            let memory = SupervisorMemory {
                history: (0..history_len)
                    .map(|i| match i % 2 {
                        0 => ChatMessage::user(format!("h{i}")),
                        _ => ChatMessage::assistant(format!("h{i}")),
                    })
                    .collect(),
                ..SupervisorMemory::default()
            };
            let activities = minutes
                .iter()
                .map(|m| activity_at("s", "x", Utc.with_ymd_and_hms(2025, 3, 1, 12, *m, 0).unwrap()))
                .collect();
            let turn = build_turn(activities, Some(&memory), 2.0, ProviderKind::OpenAiChat, window);
            prop_assert!(turn.messages.len() <= window);
            prop_assert_eq!(turn.messages[0].role, ChatRole::User);
            prop_assert_eq!(turn.messages.last(), Some(&turn.user_turn));
        }

        #[test]
        fn high_water_never_moves_backwards(
            marks in proptest::collection::vec(0u32..59, 1..30),
        ) {
            let mut memory = SupervisorMemory::default();
            let mut highest = None;
            for m in marks {
                let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, m, 0).unwrap();
                let turn = build_turn(
                    vec![activity_at("s", "x", at)],
                    Some(&memory),
                    2.0,
                    ProviderKind::OpenAiChat,
                    20,
                );
                if let Some(ts) = turn.high_water {
                    memory.advance_high_water(ts);
                }
                let current = memory.last_processed_activity_timestamp;
                prop_assert!(current >= highest);
                highest = current;
            }
        }
    }
}
