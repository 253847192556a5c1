use async_trait::async_trait;
use intro_quiz_server::catalog::{CatalogAdapter, CatalogError};
use intro_quiz_server::config::ServerConfig;
use intro_quiz_server::protocol::{ClientMessage, ClipItem, ServerMessage};
use intro_quiz_server::room::RoomEngine;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A catalog stub with a fixed single-clip playlist, so every question in a
/// test resolves to the same clip and title.
struct FixedCatalog;

#[async_trait]
impl CatalogAdapter for FixedCatalog {
    async fn list_playlist(&self, _playlist_id: &str) -> Result<Vec<ClipItem>, CatalogError> {
        Ok(vec![ClipItem {
            id: "v1".to_string(),
            title: "The Answer (Live)".to_string(),
        }])
    }

    async fn is_embeddable(&self, _clip_id: &str) -> Result<bool, CatalogError> {
        Ok(true)
    }
}

fn test_engine(time_limit_secs: u64) -> Arc<RoomEngine> {
    let catalog = Arc::new(FixedCatalog);
    let config = ServerConfig { time_limit_secs };
    Arc::new(RoomEngine::new(catalog, &config))
}

/// A connected test player: its session id plus its outbound queue.
struct Player {
    session_id: Uuid,
    rx: mpsc::Receiver<Arc<ServerMessage>>,
}

impl Player {
    fn join(engine: &RoomEngine, room_id: &str) -> Self {
        let session_id = Uuid::new_v4();
        let rx = engine.join_session(room_id, session_id);
        Self { session_id, rx }
    }

    /// Receive the next message, panicking if none arrives promptly.
    async fn recv(&mut self) -> ServerMessage {
        tokio::time::timeout(tokio::time::Duration::from_secs(1), self.rx.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("channel closed unexpectedly")
            .as_ref()
            .clone()
    }

    async fn assert_idle(&mut self) {
        let result = tokio::time::timeout(tokio::time::Duration::from_millis(50), self.rx.recv()).await;
        assert!(result.is_err(), "expected no further message, got one");
    }
}

async fn join(engine: &Arc<RoomEngine>, room_id: &str, player: &Player, name: &str) {
    engine
        .handle_message(
            room_id,
            player.session_id,
            ClientMessage::Join {
                user: name.to_string(),
            },
        )
        .await;
}

async fn set_playlist(engine: &Arc<RoomEngine>, room_id: &str, player: &Player) {
    engine
        .handle_message(
            room_id,
            player.session_id,
            ClientMessage::Playlist {
                playlist_id: "PLX".to_string(),
            },
        )
        .await;
}

async fn ready(engine: &Arc<RoomEngine>, room_id: &str, player: &Player, name: &str) {
    engine
        .handle_message(
            room_id,
            player.session_id,
            ClientMessage::Ready {
                user: name.to_string(),
            },
        )
        .await;
}

async fn buzz(engine: &Arc<RoomEngine>, room_id: &str, player: &Player, name: &str) {
    engine
        .handle_message(
            room_id,
            player.session_id,
            ClientMessage::Buzz {
                user: name.to_string(),
            },
        )
        .await;
}

async fn answer(engine: &Arc<RoomEngine>, room_id: &str, player: &Player, name: &str, text: &str) {
    engine
        .handle_message(
            room_id,
            player.session_id,
            ClientMessage::AnswerText {
                user: name.to_string(),
                answer: text.to_string(),
            },
        )
        .await;
}

fn assert_ready_state(msg: ServerMessage, expected: &[(&str, bool)]) {
    match msg {
        ServerMessage::ReadyState { ready_users, .. } => {
            assert_eq!(ready_users.len(), expected.len());
            for (name, value) in expected {
                assert_eq!(ready_users.get(*name), Some(value));
            }
        }
        other => panic!("expected ready_state, got {other:?}"),
    }
}

/// Two players join, ready up, and race to answer correctly
/// (`spec.md` §8 scenario 1).
#[tokio::test]
async fn happy_path_two_players_correct_answer() {
    let engine = test_engine(10);
    let room_id = "r1";

    let mut alice = Player::join(&engine, room_id);
    let mut bob = Player::join(&engine, room_id);

    join(&engine, room_id, &alice, "Alice").await;
    assert_ready_state(alice.recv().await, &[("Alice", false)]);
    assert_ready_state(bob.recv().await, &[("Alice", false)]);

    join(&engine, room_id, &bob, "Bob").await;
    assert_ready_state(alice.recv().await, &[("Alice", false), ("Bob", false)]);
    assert_ready_state(bob.recv().await, &[("Alice", false), ("Bob", false)]);

    set_playlist(&engine, room_id, &alice).await;

    ready(&engine, room_id, &alice, "Alice").await;
    assert_ready_state(alice.recv().await, &[("Alice", true), ("Bob", false)]);
    assert_ready_state(bob.recv().await, &[("Alice", true), ("Bob", false)]);

    ready(&engine, room_id, &bob, "Bob").await;
    assert_ready_state(alice.recv().await, &[("Alice", true), ("Bob", true)]);
    assert_ready_state(bob.recv().await, &[("Alice", true), ("Bob", true)]);

    match alice.recv().await {
        ServerMessage::Video { video_id, .. } => assert_eq!(video_id, "v1"),
        other => panic!("expected video, got {other:?}"),
    }
    match bob.recv().await {
        ServerMessage::Video { video_id, .. } => assert_eq!(video_id, "v1"),
        other => panic!("expected video, got {other:?}"),
    }
    assert!(matches!(alice.recv().await, ServerMessage::Start { .. }));
    assert!(matches!(bob.recv().await, ServerMessage::Start { .. }));

    buzz(&engine, room_id, &bob, "Bob").await;

    match alice.recv().await {
        ServerMessage::Answer { user, .. } => assert_eq!(user, "Bob"),
        other => panic!("expected answer notification, got {other:?}"),
    }
    match alice.recv().await {
        ServerMessage::BuzzResult { user, .. } => assert_eq!(user, "Bob"),
        other => panic!("expected buzz_result, got {other:?}"),
    }
    match bob.recv().await {
        ServerMessage::BuzzResult { user, .. } => assert_eq!(user, "Bob"),
        other => panic!("expected buzz_result, got {other:?}"),
    }

    answer(&engine, room_id, &bob, "Bob", "the answer").await;

    match alice.recv().await {
        ServerMessage::AnswerResult {
            user,
            correct,
            video_title,
            ..
        } => {
            assert_eq!(user, "Bob");
            assert!(correct);
            assert_eq!(video_title, "The Answer (Live)");
        }
        other => panic!("expected answer_result, got {other:?}"),
    }
    assert!(matches!(
        bob.recv().await,
        ServerMessage::AnswerResult { correct: true, .. }
    ));

    assert_ready_state(alice.recv().await, &[("Alice", false), ("Bob", false)]);
    assert_ready_state(bob.recv().await, &[("Alice", false), ("Bob", false)]);
}

/// A wrong answer resumes the timer for a still-eligible player, who then
/// answers correctly (`spec.md` §8 scenario 2).
#[tokio::test]
async fn wrong_then_right_resumes_timer_for_other_player() {
    let engine = test_engine(10);
    let room_id = "r2";

    let mut alice = Player::join(&engine, room_id);
    let mut bob = Player::join(&engine, room_id);

    join(&engine, room_id, &alice, "Alice").await;
    let _ = alice.recv().await;
    let _ = bob.recv().await;
    join(&engine, room_id, &bob, "Bob").await;
    let _ = alice.recv().await;
    let _ = bob.recv().await;

    set_playlist(&engine, room_id, &alice).await;

    ready(&engine, room_id, &alice, "Alice").await;
    let _ = alice.recv().await;
    let _ = bob.recv().await;
    ready(&engine, room_id, &bob, "Bob").await;
    let _ = alice.recv().await; // ready_state all true
    let _ = bob.recv().await;
    let _ = alice.recv().await; // video
    let _ = bob.recv().await;
    let _ = alice.recv().await; // start
    let _ = bob.recv().await;

    buzz(&engine, room_id, &bob, "Bob").await;
    let _ = alice.recv().await; // answer notification
    let _ = alice.recv().await; // buzz_result
    let _ = bob.recv().await; // buzz_result

    answer(&engine, room_id, &bob, "Bob", "wrong").await;

    match alice.recv().await {
        ServerMessage::AnswerResult { correct, .. } => assert!(!correct),
        other => panic!("expected incorrect answer_result, got {other:?}"),
    }
    let _ = bob.recv().await;
    assert!(matches!(alice.recv().await, ServerMessage::Resume { .. }));
    assert!(matches!(bob.recv().await, ServerMessage::Resume { .. }));

    buzz(&engine, room_id, &alice, "Alice").await;
    let _ = bob.recv().await; // answer notification excluding Alice
    let _ = alice.recv().await; // buzz_result
    let _ = bob.recv().await;

    answer(&engine, room_id, &alice, "Alice", "the answer").await;

    match alice.recv().await {
        ServerMessage::AnswerResult { user, correct, .. } => {
            assert_eq!(user, "Alice");
            assert!(correct);
        }
        other => panic!("expected correct answer_result for Alice, got {other:?}"),
    }
}

/// A single player answers wrong with nobody else eligible: exhaustion, no
/// `resume`, no auto-advance (`spec.md` §8 scenario 3).
#[tokio::test]
async fn all_wrong_exhaustion_has_no_resume_and_no_auto_advance() {
    let engine = test_engine(10);
    let room_id = "r3";

    let mut carol = Player::join(&engine, room_id);
    join(&engine, room_id, &carol, "Carol").await;
    let _ = carol.recv().await;

    set_playlist(&engine, room_id, &carol).await;

    ready(&engine, room_id, &carol, "Carol").await;
    let _ = carol.recv().await; // ready_state all true
    let _ = carol.recv().await; // video
    let _ = carol.recv().await; // start

    buzz(&engine, room_id, &carol, "Carol").await;
    let _ = carol.recv().await; // buzz_result (no other session to notify)

    answer(&engine, room_id, &carol, "Carol", "wrong").await;

    match carol.recv().await {
        ServerMessage::AnswerResult { correct, .. } => assert!(!correct),
        other => panic!("expected incorrect answer_result, got {other:?}"),
    }
    assert_ready_state(carol.recv().await, &[("Carol", false)]);
    carol.assert_idle().await;
}

/// Nobody buzzes before the answer window elapses (`spec.md` §8 scenario 4).
#[tokio::test]
async fn timeout_fires_when_nobody_buzzes() {
    tokio::time::pause();
    let engine = test_engine(2);
    let room_id = "r4";

    let mut alice = Player::join(&engine, room_id);
    let mut bob = Player::join(&engine, room_id);
    join(&engine, room_id, &alice, "Alice").await;
    let _ = alice.recv().await;
    let _ = bob.recv().await;
    join(&engine, room_id, &bob, "Bob").await;
    let _ = alice.recv().await;
    let _ = bob.recv().await;

    set_playlist(&engine, room_id, &alice).await;

    ready(&engine, room_id, &alice, "Alice").await;
    let _ = alice.recv().await;
    let _ = bob.recv().await;
    ready(&engine, room_id, &bob, "Bob").await;
    let _ = alice.recv().await; // ready_state all true
    let _ = bob.recv().await;
    let _ = alice.recv().await; // video
    let _ = bob.recv().await;
    let _ = alice.recv().await; // start
    let _ = bob.recv().await;

    tokio::time::advance(tokio::time::Duration::from_secs(2)).await;
    // Let the spawned timer task actually run past the woken sleep.
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

    assert!(matches!(alice.recv().await, ServerMessage::Timeout { .. }));
    assert!(matches!(bob.recv().await, ServerMessage::Timeout { .. }));
    assert_ready_state(alice.recv().await, &[("Alice", false), ("Bob", false)]);
    assert_ready_state(bob.recv().await, &[("Alice", false), ("Bob", false)]);
}

/// A buzz pauses the timer; the remainder is honored on resume rather than
/// the full window (`spec.md` §8 scenario 5).
#[tokio::test]
async fn buzz_cancels_timer_and_resume_runs_for_the_remainder() {
    tokio::time::pause();
    let engine = test_engine(10);
    let room_id = "r5";

    let mut dave = Player::join(&engine, room_id);
    let mut erin = Player::join(&engine, room_id);
    join(&engine, room_id, &dave, "Dave").await;
    let _ = dave.recv().await;
    let _ = erin.recv().await;
    join(&engine, room_id, &erin, "Erin").await;
    let _ = dave.recv().await;
    let _ = erin.recv().await;

    set_playlist(&engine, room_id, &dave).await;

    ready(&engine, room_id, &dave, "Dave").await;
    let _ = dave.recv().await;
    let _ = erin.recv().await;
    ready(&engine, room_id, &erin, "Erin").await;
    let _ = dave.recv().await; // ready_state all true
    let _ = erin.recv().await;
    let _ = dave.recv().await; // video
    let _ = erin.recv().await;
    let _ = dave.recv().await; // start
    let _ = erin.recv().await;

    // t=3s: Dave buzzes.
    tokio::time::advance(tokio::time::Duration::from_secs(3)).await;
    buzz(&engine, room_id, &dave, "Dave").await;
    let _ = erin.recv().await; // answer notification
    let _ = dave.recv().await; // buzz_result
    let _ = erin.recv().await;

    // t=5s: Dave answers wrong, resume should run for 7s, not 10.
    tokio::time::advance(tokio::time::Duration::from_secs(2)).await;
    answer(&engine, room_id, &dave, "Dave", "wrong").await;
    let _ = dave.recv().await; // answer_result
    let _ = erin.recv().await;
    assert!(matches!(dave.recv().await, ServerMessage::Resume { .. }));
    assert!(matches!(erin.recv().await, ServerMessage::Resume { .. }));

    // Just under 7s since resume: no timeout yet.
    tokio::time::advance(tokio::time::Duration::from_millis(6900)).await;
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    dave.assert_idle().await;
    erin.assert_idle().await;

    // Past 7s: timeout fires.
    tokio::time::advance(tokio::time::Duration::from_millis(200)).await;
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    assert!(matches!(dave.recv().await, ServerMessage::Timeout { .. }));
    assert!(matches!(erin.recv().await, ServerMessage::Timeout { .. }));
}

/// A non-buzzing member disconnects mid-question; the remaining member can
/// still resolve it (`spec.md` §8 scenario 6).
#[tokio::test]
async fn leave_during_question_drops_departed_users_answer_rights() {
    let engine = test_engine(10);
    let room_id = "r6";

    let mut alice = Player::join(&engine, room_id);
    let bob = Player::join(&engine, room_id);
    join(&engine, room_id, &alice, "Alice").await;
    let _ = alice.recv().await;
    join(&engine, room_id, &bob, "Bob").await;
    let _ = alice.recv().await;

    set_playlist(&engine, room_id, &alice).await;

    ready(&engine, room_id, &alice, "Alice").await;
    let _ = alice.recv().await;
    ready(&engine, room_id, &bob, "Bob").await;
    let _ = alice.recv().await; // ready_state all true
    let _ = alice.recv().await; // video
    let _ = alice.recv().await; // start

    // Bob disconnects before buzzing.
    engine.leave(room_id, bob.session_id).await;

    buzz(&engine, room_id, &alice, "Alice").await;
    match alice.recv().await {
        ServerMessage::BuzzResult { user, .. } => assert_eq!(user, "Alice"),
        other => panic!("expected buzz_result for Alice, got {other:?}"),
    }

    answer(&engine, room_id, &alice, "Alice", "the answer").await;
    match alice.recv().await {
        ServerMessage::AnswerResult { user, correct, .. } => {
            assert_eq!(user, "Alice");
            assert!(correct);
        }
        other => panic!("expected correct answer_result, got {other:?}"),
    }
    assert_ready_state(alice.recv().await, &[("Alice", false)]);
}
