#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Intro Quiz Server
//!
//! A room-based multiplayer game server: connected players join a room,
//! mark themselves ready, and race to buzz in and name the video clip
//! currently playing. Clips are resolved through a pluggable catalog
//! adapter; the room engine holds no state beyond process memory.

/// Media catalog adapter: resolves playlists into clips and probes
/// embeddability.
pub mod catalog;

/// Server configuration and environment variables.
pub mod config;

/// Structured logging configuration.
pub mod logging;

/// WebSocket message protocol definitions.
pub mod protocol;

/// Room registry and transition engine.
pub mod room;

/// WebSocket connection handling.
pub mod websocket;
