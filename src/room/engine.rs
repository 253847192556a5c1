//! The registry of rooms plus the event-driven transition logic
//! (`spec.md` §4.3): `join`, `playlist`, `ready`, `start`, `buzz`,
//! `answer_text`, `leave`, and the internal `timeout`/`advanceQuestion`
//! events.
//!
//! Every transition on a given room is serialized by that room's
//! `tokio::sync::Mutex` (`spec.md` §5); the global registry is a `DashMap`
//! so create/destroy across rooms never contends with any single room's
//! lock. Catalog round-trips (`playlist`, clip selection) are always made
//! without the room lock held, with their result installed under the lock
//! afterward.

use crate::catalog::CatalogAdapter;
use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, ClipItem, ServerMessage};
use crate::room::directive::{now_millis, Outbound};
use crate::room::judge::is_correct;
use crate::room::state::{RoomState, SessionId};
use dashmap::DashMap;
use rand::RngExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Duration;

/// Opaque room identifier, taken verbatim from the `roomId` query parameter.
pub type RoomId = String;

/// Capacity of a session's outbound queue (`spec.md` §4.2's "bounded
/// outbound queue"). Sized generously relative to the handful of messages
/// any single transition emits; a full queue means a stalled client, not a
/// congested one, so delivery past this point is best-effort (§4.2, §7).
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// A room's authoritative state plus its session set, bundled so that
/// enqueueing a broadcast never needs the room lock (`spec.md` §5: "the
/// engine is free to enqueue concurrently").
struct RoomHandle {
    state: Mutex<RoomState>,
    sessions: DashMap<SessionId, mpsc::Sender<Arc<ServerMessage>>>,
}

impl RoomHandle {
    fn new() -> Self {
        Self {
            state: Mutex::new(RoomState::new()),
            sessions: DashMap::new(),
        }
    }
}

/// The process-wide room registry and transition engine. Constructed once at
/// startup and shared behind an `Arc` (`spec.md` §9: "process-wide state
/// constructed once at startup and passed by reference").
pub struct RoomEngine {
    rooms: DashMap<RoomId, Arc<RoomHandle>>,
    catalog: Arc<dyn CatalogAdapter>,
    time_limit: Duration,
}

impl RoomEngine {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogAdapter>, config: &ServerConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            catalog,
            time_limit: Duration::from_secs(config.time_limit_secs),
        }
    }

    /// Number of rooms currently tracked. Exposed for the liveness probe.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn handle(&self, room_id: &str) -> Arc<RoomHandle> {
        if let Some(existing) = self.rooms.get(room_id) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.rooms
                .entry(room_id.to_string())
                .or_insert_with(|| Arc::new(RoomHandle::new()))
                .value(),
        )
    }

    /// `Join(roomID, session)` — `spec.md` §4.3.1. Creates the room if
    /// absent and registers the session's outbound queue. Emits nothing;
    /// the display name is not yet known.
    #[must_use]
    pub fn join_session(
        &self,
        room_id: &str,
        session_id: SessionId,
    ) -> mpsc::Receiver<Arc<ServerMessage>> {
        let handle = self.handle(room_id);
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        handle.sessions.insert(session_id, tx);
        tracing::debug!(room_id, %session_id, "session joined room");
        rx
    }

    /// Dispatch a decoded client message to its transition. Decode failures
    /// never reach here — the session drops malformed frames before calling
    /// this (`spec.md` §4.2, §7).
    pub async fn handle_message(
        self: &Arc<Self>,
        room_id: &str,
        session_id: SessionId,
        message: ClientMessage,
    ) {
        match message {
            ClientMessage::Join { user } => self.join_user(room_id, session_id, user).await,
            ClientMessage::Playlist { playlist_id } => self.playlist(room_id, playlist_id).await,
            ClientMessage::Ready { user } => self.ready(room_id, user).await,
            // `start` carries no transition of its own — the room advances
            // automatically once every member is ready (§4.3.4).
            ClientMessage::Start {} => {}
            ClientMessage::Buzz { user } => self.buzz(room_id, session_id, user).await,
            ClientMessage::AnswerText { user, answer } => {
                self.answer_text(room_id, user, answer).await;
            }
        }
    }

    /// `join` message `{user}` — `spec.md` §4.3.2.
    async fn join_user(self: &Arc<Self>, room_id: &str, session_id: SessionId, user: String) {
        let handle = self.handle(room_id);
        let directive = {
            let mut state = handle.state.lock().await;
            state.members.insert(session_id, user.clone());
            state.ready.entry(user).or_insert(false);
            Outbound::All(ServerMessage::ReadyState {
                timestamp: now_millis(),
                ready_users: state.ready.clone(),
            })
        };
        self.dispatch(&handle, vec![directive]).await;
    }

    /// `playlist` message `{playlistId}` — `spec.md` §4.3.3. Stores the
    /// playlist id, then synchronously enumerates the catalog into
    /// `remaining`. Does not post a clip; that is deferred to the all-ready
    /// advancement (§4.3.5).
    async fn playlist(self: &Arc<Self>, room_id: &str, playlist_id: String) {
        let handle = self.handle(room_id);
        {
            let mut state = handle.state.lock().await;
            state.playlist_id = Some(playlist_id.clone());
        }

        match self.catalog.list_playlist(&playlist_id).await {
            Ok(clips) => {
                let mut state = handle.state.lock().await;
                state.remaining = clips;
            }
            Err(err) => {
                tracing::debug!(room_id, %playlist_id, error = %err, "playlist enumeration failed, dropping message");
            }
        }
    }

    /// `ready` message `{user}` — `spec.md` §4.3.4.
    async fn ready(self: &Arc<Self>, room_id: &str, user: String) {
        let handle = self.handle(room_id);
        let mut should_advance = false;
        let directive = {
            let mut state = handle.state.lock().await;
            state.ready.insert(user, true);
            let directive = Outbound::All(ServerMessage::ReadyState {
                timestamp: now_millis(),
                ready_users: state.ready.clone(),
            });
            if !state.members.is_empty() && state.all_ready() && !state.advancing {
                state.advancing = true;
                should_advance = true;
            }
            directive
        };

        self.dispatch(&handle, vec![directive]).await;

        if should_advance {
            self.advance_question(room_id, &handle).await;
        }
    }

    /// `buzz` message `{user}` — `spec.md` §4.3.6.
    async fn buzz(self: &Arc<Self>, room_id: &str, session_id: SessionId, user: String) {
        let handle = self.handle(room_id);

        // Always first: a "someone buzzed" notification to everyone else,
        // regardless of whether this buzz is ultimately honored.
        let mut directives = vec![Outbound::ExcludeSender(
            session_id,
            ServerMessage::Answer {
                timestamp: now_millis(),
                user: user.clone(),
            },
        )];

        {
            let mut state = handle.state.lock().await;
            let eligible = state.answer_rights.get(&user).copied().unwrap_or(false);
            if state.active && state.fastest.is_none() && eligible {
                state.fastest = Some(user.clone());
                state.active = false;
                state.cancel_timer();
                directives.push(Outbound::All(ServerMessage::BuzzResult {
                    timestamp: now_millis(),
                    user,
                }));
            }
            // Otherwise: TransitionReject, silent no-op (`spec.md` §7).
        }

        self.dispatch(&handle, directives).await;
    }

    /// `answer_text` message `{user, answer}` — `spec.md` §4.3.7.
    async fn answer_text(self: &Arc<Self>, room_id: &str, user: String, answer: String) {
        let handle = self.handle(room_id);

        enum Outcome {
            NotFastest,
            Correct(String),
            // Carries the timer-resume parameters computed under the same
            // lock acquisition that decided this outcome, so `active` is
            // already `true` again before the `resume` broadcast is ever
            // dispatched (see `begin_resume_locked`).
            IncorrectResume(String, u64, Duration, oneshot::Receiver<()>),
            IncorrectExhausted(String),
        }

        let outcome = {
            let mut state = handle.state.lock().await;
            if state.fastest.as_deref() != Some(user.as_str()) {
                Outcome::NotFastest
            } else if is_correct(&answer, &state.current_title) {
                state.active = false;
                state.fastest = None;
                for right in state.answer_rights.values_mut() {
                    *right = false;
                }
                state.reset_ready();
                Outcome::Correct(state.current_title.clone())
            } else {
                state.answer_rights.insert(user.clone(), false);
                state.fastest = None;
                if state.answer_rights.values().any(|&r| r) {
                    let title = state.current_title.clone();
                    let (generation, duration, cancel_rx) = Self::begin_resume_locked(&mut state);
                    Outcome::IncorrectResume(title, generation, duration, cancel_rx)
                } else {
                    state.reset_ready();
                    Outcome::IncorrectExhausted(state.current_title.clone())
                }
            }
        };

        match outcome {
            Outcome::NotFastest => {
                tracing::trace!(room_id, %user, "answer_text rejected: not the fastest buzzer");
            }
            Outcome::Correct(title) => {
                let ready_users = { handle.state.lock().await.ready.clone() };
                let directives = vec![
                    Outbound::All(ServerMessage::AnswerResult {
                        timestamp: now_millis(),
                        user,
                        correct: true,
                        video_title: title,
                    }),
                    Outbound::All(ServerMessage::ReadyState {
                        timestamp: now_millis(),
                        ready_users,
                    }),
                ];
                self.dispatch(&handle, directives).await;
            }
            Outcome::IncorrectResume(title, generation, duration, cancel_rx) => {
                // `active` is already `true` again (set under the lock
                // above) before this dispatch, so a concurrent `buzz` that
                // lands the instant `resume` is delivered can never observe
                // a stale `active == false` and be rejected.
                self.arm_timer(
                    room_id.to_string(),
                    Arc::clone(&handle),
                    duration,
                    generation,
                    cancel_rx,
                );
                let directives = vec![
                    Outbound::All(ServerMessage::AnswerResult {
                        timestamp: now_millis(),
                        user,
                        correct: false,
                        video_title: title,
                    }),
                    Outbound::All(ServerMessage::Resume {
                        timestamp: now_millis(),
                    }),
                ];
                self.dispatch(&handle, directives).await;
            }
            Outcome::IncorrectExhausted(title) => {
                let ready_users = { handle.state.lock().await.ready.clone() };
                let directives = vec![
                    Outbound::All(ServerMessage::AnswerResult {
                        timestamp: now_millis(),
                        user,
                        correct: false,
                        video_title: title,
                    }),
                    Outbound::All(ServerMessage::ReadyState {
                        timestamp: now_millis(),
                        ready_users,
                    }),
                ];
                self.dispatch(&handle, directives).await;
            }
        }
    }

    /// `Leave(roomID, session)` — `spec.md` §4.3.10.
    pub async fn leave(self: &Arc<Self>, room_id: &str, session_id: SessionId) {
        let Some(handle) = self.rooms.get(room_id).map(|entry| Arc::clone(entry.value())) else {
            return;
        };
        handle.sessions.remove(&session_id);

        let mut directives = Vec::new();
        // Timer-resume parameters, computed under the same lock acquisition
        // that decides a resume is needed, so `active` is already `true`
        // again before the `resume` broadcast is dispatched below (mirrors
        // the `answer_text` `IncorrectResume` path).
        let mut resume_timer_params = None;

        {
            let mut state = handle.state.lock().await;
            if let Some(user) = state.members.remove(&session_id) {
                state.ready.remove(&user);
                state.answer_rights.remove(&user);

                // Open question (not specified by `spec.md`): the user
                // holding exclusive answer rights disconnects before
                // submitting. Treated the same as an incorrect answer so
                // the question cannot stall forever waiting on an
                // `answer_text` that will never arrive (documented in
                // DESIGN.md).
                if state.fastest.as_deref() == Some(user.as_str()) {
                    state.fastest = None;
                    if state.answer_rights.values().any(|&r| r) {
                        directives.push(Outbound::All(ServerMessage::Resume {
                            timestamp: now_millis(),
                        }));
                        resume_timer_params = Some(Self::begin_resume_locked(&mut state));
                    } else {
                        state.reset_ready();
                        directives.push(Outbound::All(ServerMessage::ReadyState {
                            timestamp: now_millis(),
                            ready_users: state.ready.clone(),
                        }));
                    }
                }
            }
        }

        if let Some((generation, duration, cancel_rx)) = resume_timer_params {
            self.arm_timer(
                room_id.to_string(),
                Arc::clone(&handle),
                duration,
                generation,
                cancel_rx,
            );
        }
        if !directives.is_empty() {
            self.dispatch(&handle, directives).await;
        }

        if handle.sessions.is_empty() {
            if let Some((_, handle)) = self.rooms.remove(room_id) {
                handle.state.lock().await.cancel_timer();
                tracing::debug!(room_id, "room torn down: last session left");
            }
        }
    }

    /// `advanceQuestion(roomID)` (internal) — `spec.md` §4.3.5.
    async fn advance_question(self: &Arc<Self>, room_id: &str, handle: &Arc<RoomHandle>) {
        let playlist_id = { handle.state.lock().await.playlist_id.clone() };

        let clip = self.next_video(handle, playlist_id.as_deref()).await;

        let Some(clip) = clip else {
            handle.state.lock().await.advancing = false;
            tracing::debug!(room_id, "advancement aborted: no clip available");
            return;
        };

        let generation;
        let cancel_rx;
        {
            let mut state = handle.state.lock().await;
            state.current_title = clip.title.clone();
            state.active = true;
            state.fastest = None;
            state.answer_rights = state
                .members
                .values()
                .map(|name| (name.clone(), true))
                .collect();
            state.time_left = self.time_limit;
            state.timer_started_at = Some(tokio::time::Instant::now());
            state.timer_generation = state.timer_generation.wrapping_add(1);
            generation = state.timer_generation;
            let (tx, rx) = oneshot::channel();
            state.cancel_timer = Some(tx);
            cancel_rx = rx;
            state.advancing = false;
        }

        self.arm_timer(
            room_id.to_string(),
            Arc::clone(handle),
            self.time_limit,
            generation,
            cancel_rx,
        );

        // Ordering guarantee: `video` strictly precedes `start` (§4.3.5).
        let directives = vec![
            Outbound::All(ServerMessage::Video {
                timestamp: now_millis(),
                video_id: clip.id,
            }),
            Outbound::All(ServerMessage::Start {
                timestamp: now_millis(),
            }),
        ];
        self.dispatch(handle, directives).await;
    }

    /// Clip selection (`NextVideo`) — `spec.md` §4.3.9. Draws a uniformly
    /// random unseen clip, probing each candidate for embeddability and
    /// discarding rejects without replacement (P5). Re-enumerates the
    /// catalog whenever `remaining` is empty.
    async fn next_video(&self, handle: &RoomHandle, playlist_id: Option<&str>) -> Option<ClipItem> {
        loop {
            let popped = {
                let mut state = handle.state.lock().await;
                if state.remaining.is_empty() {
                    None
                } else {
                    let idx = rand::rng().random_range(0..state.remaining.len());
                    Some(state.remaining.remove(idx))
                }
            };

            let clip = match popped {
                Some(clip) => clip,
                None => {
                    let playlist_id = playlist_id?;
                    match self.catalog.list_playlist(playlist_id).await {
                        Ok(clips) => {
                            handle.state.lock().await.remaining = clips;
                            continue;
                        }
                        Err(err) => {
                            tracing::debug!(error = %err, "catalog re-enumeration failed, no clip available");
                            return None;
                        }
                    }
                }
            };

            match self.catalog.is_embeddable(&clip.id).await {
                Ok(true) => return Some(clip),
                Ok(false) => {
                    tracing::trace!(clip_id = %clip.id, "clip not embeddable, discarding");
                }
                Err(err) => {
                    tracing::debug!(clip_id = %clip.id, error = %err, "embeddability probe failed, aborting advancement");
                    return None;
                }
            }
        }
    }

    /// Reopen the question for buzzing with the remaining `time_left`, after
    /// an incorrect answer leaves at least one eligible user (`spec.md`
    /// §4.3.7, §9). Takes an already-locked `RoomState` and mutates it
    /// in place — callers must perform this within the same lock
    /// acquisition that decided a resume is needed, and dispatch the
    /// `resume` broadcast only after releasing that lock. This keeps
    /// `active` true before any session can observe the broadcast, so a
    /// `buzz` racing in on another OS thread (the runtime is
    /// multi-threaded) never sees a stale `active == false` and is
    /// wrongly rejected.
    fn begin_resume_locked(state: &mut RoomState) -> (u64, Duration, oneshot::Receiver<()>) {
        state.active = true;
        state.timer_started_at = Some(tokio::time::Instant::now());
        state.timer_generation = state.timer_generation.wrapping_add(1);
        let generation = state.timer_generation;
        let duration = state.time_left;
        let (tx, rx) = oneshot::channel();
        state.cancel_timer = Some(tx);
        (generation, duration, rx)
    }

    /// Arm a one-shot timer task racing `duration` against cancellation
    /// (`spec.md` §5, §9). `generation` guards the double-fire hazard: the
    /// expiry branch rechecks it under the lock before emitting `timeout`.
    fn arm_timer(
        self: &Arc<Self>,
        room_id: RoomId,
        handle: Arc<RoomHandle>,
        duration: Duration,
        generation: u64,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(duration) => {
                    engine.on_timeout(&room_id, &handle, generation).await;
                }
                _ = &mut cancel_rx => {
                    // Cancelled by a buzz or room teardown; the canceller
                    // already credited the elapsed segment under the lock.
                }
            }
        });
    }

    /// Timer expiry (internal `timeout`) — `spec.md` §4.3.8.
    async fn on_timeout(self: &Arc<Self>, room_id: &str, handle: &Arc<RoomHandle>, generation: u64) {
        let fired = {
            let mut state = handle.state.lock().await;
            if state.timer_generation == generation && state.active && state.fastest.is_none() {
                state.active = false;
                for right in state.answer_rights.values_mut() {
                    *right = false;
                }
                state.reset_ready();
                state.cancel_timer = None;
                state.timer_started_at = None;
                true
            } else {
                false
            }
        };

        if !fired {
            return;
        }

        tracing::debug!(room_id, "question timed out with no successful buzz");

        let ready_users = { handle.state.lock().await.ready.clone() };
        let directives = vec![
            Outbound::All(ServerMessage::Timeout {
                timestamp: now_millis(),
            }),
            Outbound::All(ServerMessage::ReadyState {
                timestamp: now_millis(),
                ready_users,
            }),
        ];
        self.dispatch(handle, directives).await;
    }

    /// Deliver a sequence of directives in order, preserving each
    /// recipient's FIFO ordering (`spec.md` §4.4, §5).
    async fn dispatch(&self, handle: &RoomHandle, directives: Vec<Outbound>) {
        for directive in directives {
            match directive {
                Outbound::SelfOnly(session_id, message) => {
                    self.send_one(handle, session_id, message);
                }
                Outbound::ExcludeSender(sender_id, message) => {
                    let message = Arc::new(message);
                    for entry in &handle.sessions {
                        if *entry.key() == sender_id {
                            continue;
                        }
                        self.try_send(*entry.key(), entry.value(), Arc::clone(&message));
                    }
                }
                Outbound::All(message) => {
                    let message = Arc::new(message);
                    for entry in &handle.sessions {
                        self.try_send(*entry.key(), entry.value(), Arc::clone(&message));
                    }
                }
            }
        }
    }

    fn send_one(&self, handle: &RoomHandle, session_id: SessionId, message: ServerMessage) {
        if let Some(tx) = handle.sessions.get(&session_id) {
            self.try_send(session_id, tx.value(), Arc::new(message));
        }
    }

    fn try_send(
        &self,
        session_id: SessionId,
        tx: &mpsc::Sender<Arc<ServerMessage>>,
        message: Arc<ServerMessage>,
    ) {
        if let Err(err) = tx.try_send(message) {
            // Best-effort delivery (`spec.md` §4.2): a full or closed queue
            // never blocks the engine. The session's send task will exit
            // and trigger `Leave` on its next write error regardless.
            tracing::warn!(%session_id, error = %err, "dropped outbound message: queue full or session closed");
        }
    }
}
