//! Room Engine (`spec.md` §3, §4.3): the authoritative per-room state
//! machine and its registry.

mod directive;
mod engine;
mod judge;
mod state;

pub use engine::{RoomEngine, RoomId};
pub use state::SessionId;
