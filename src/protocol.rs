//! Wire protocol: the JSON message vocabulary exchanged with connected players.
//!
//! Both directions use a flat, internally-tagged JSON object (`#[serde(tag =
//! "type")]`) rather than a nested envelope, matching `spec.md` §6's wire
//! table. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message received from a connected player.
///
/// Unknown `type` values and malformed frames are dropped by the session
/// (`websocket::connection`) without terminating the connection — decoding
/// happens here and simply fails for anything this enum doesn't recognize.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register or reaffirm the sender's display name.
    Join { user: String },
    /// Store a playlist identifier and (re)enumerate the catalog into the
    /// room's clip pool.
    Playlist {
        #[serde(rename = "playlistId")]
        playlist_id: String,
    },
    /// Cast an all-ready vote for the next question.
    Ready { user: String },
    /// Reserved: `spec.md` §6 lists `start` as a recognized type with no
    /// payload and no specified transition; the room advances automatically
    /// once every member is ready (§4.3.4), so this variant decodes but the
    /// engine has nothing to do with it beyond accepting the frame.
    Start {},
    /// Bid for exclusive answer rights on the open question.
    Buzz { user: String },
    /// Submit an answer; honored only from the current `fastest` holder.
    AnswerText { user: String, answer: String },
}

/// A message broadcast to one or more connected players.
///
/// `timestamp` is stamped by the engine at emission time (ms since epoch)
/// and is always present; every other field is populated only for the
/// variants that carry it, exactly as `spec.md` §6 describes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Complete ready tally, broadcast whenever it changes.
    ReadyState {
        timestamp: i64,
        #[serde(rename = "readyUsers")]
        ready_users: HashMap<String, bool>,
    },
    /// The clip now on screen.
    Video {
        timestamp: i64,
        #[serde(rename = "videoId")]
        video_id: String,
    },
    /// The answer window has opened for buzzing.
    Start { timestamp: i64 },
    /// "Someone buzzed" notification, sent to everyone except the buzzer.
    Answer { timestamp: i64, user: String },
    /// A user has won exclusive answer rights.
    BuzzResult { timestamp: i64, user: String },
    /// Adjudication of a submitted answer.
    AnswerResult {
        timestamp: i64,
        user: String,
        correct: bool,
        #[serde(rename = "videoTitle")]
        video_title: String,
    },
    /// The question window has reopened for buzzing after a wrong answer
    /// with other eligible users remaining.
    Resume { timestamp: i64 },
    /// Nobody buzzed before the answer window elapsed.
    Timeout { timestamp: i64 },
}

/// A single catalog entry: a clip identifier paired with its display title.
///
/// `spec.md` §3's `ClipItem`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipItem {
    pub id: String,
    pub title: String,
}
