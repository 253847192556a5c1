//! The per-room authoritative state (`spec.md` §3).

use crate::protocol::ClipItem;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// Identity of a connected session within a room (`spec.md` §3's `members` key).
pub type SessionId = Uuid;

/// The in-memory state of a single room.
///
/// `active`/`fastest` jointly encode the phase described in `spec.md` §3:
/// `Idle` is `!active && fastest.is_none()`, `Questioning` is `active`, and
/// `Adjudicating` is `fastest.is_some()`. I2 (`active ⇒ fastest == ""`;
/// `fastest != "" ⇒ ¬active`) is maintained by every transition in
/// `room::engine` rather than represented as a separate enum.
pub struct RoomState {
    pub members: HashMap<SessionId, String>,
    pub ready: HashMap<String, bool>,
    pub playlist_id: Option<String>,
    pub remaining: Vec<ClipItem>,
    pub current_title: String,
    pub active: bool,
    pub fastest: Option<String>,
    pub answer_rights: HashMap<String, bool>,
    pub time_left: Duration,
    pub timer_started_at: Option<Instant>,
    pub timer_generation: u64,
    pub cancel_timer: Option<oneshot::Sender<()>>,
    /// Guards the `ready` all-true tie-break in §4.3.4: set while an
    /// advancement triggered by this room is in flight (including the
    /// catalog round-trip, which happens without the room lock held), so a
    /// second concurrent all-ready observation does not trigger a second
    /// advancement.
    pub advancing: bool,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            ready: HashMap::new(),
            playlist_id: None,
            remaining: Vec::new(),
            current_title: String::new(),
            active: false,
            fastest: None,
            answer_rights: HashMap::new(),
            time_left: Duration::ZERO,
            timer_started_at: None,
            timer_generation: 0,
            cancel_timer: None,
            advancing: false,
        }
    }

    /// I1: `ready` contains exactly the display names of currently joined members.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        !self.ready.is_empty() && self.ready.values().all(|&r| r)
    }

    #[must_use]
    pub fn has_member_named(&self, user: &str) -> bool {
        self.members.values().any(|name| name == user)
    }

    /// Cancel the armed timer (if any), crediting the elapsed segment back
    /// into `time_left` (`spec.md` §4.3.6, §9). Idempotent per I4.
    pub fn cancel_timer(&mut self) {
        if let Some(cancel) = self.cancel_timer.take() {
            let _ = cancel.send(());
        }
        if let Some(started) = self.timer_started_at.take() {
            self.time_left = self.time_left.saturating_sub(started.elapsed());
        }
        self.timer_generation = self.timer_generation.wrapping_add(1);
    }

    /// Reset every member's ready flag to false, e.g. after a question
    /// terminates (`spec.md` §4.3.7, §4.3.8).
    pub fn reset_ready(&mut self) {
        for ready in self.ready.values_mut() {
            *ready = false;
        }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ready_is_false_when_empty() {
        assert!(!RoomState::new().all_ready());
    }

    #[test]
    fn all_ready_requires_every_member_true() {
        let mut state = RoomState::new();
        state.ready.insert("Alice".to_string(), true);
        state.ready.insert("Bob".to_string(), false);
        assert!(!state.all_ready());
        state.ready.insert("Bob".to_string(), true);
        assert!(state.all_ready());
    }

    #[test]
    fn reset_ready_clears_all_flags() {
        let mut state = RoomState::new();
        state.ready.insert("Alice".to_string(), true);
        state.ready.insert("Bob".to_string(), true);
        state.reset_ready();
        assert!(state.ready.values().all(|&r| !r));
    }
}
