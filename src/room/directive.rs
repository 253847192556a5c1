//! Tagged outbound directives (`spec.md` §9): every broadcast an engine
//! transition produces is tagged with its dispatch discipline rather than
//! the transition calling three different send functions directly.

use crate::protocol::ServerMessage;
use crate::room::state::SessionId;

/// One message queued for delivery, tagged with who should receive it.
///
/// Order matters: directives are dispatched in the order a transition
/// returns them, and the session send queue preserves FIFO per recipient
/// (`spec.md` §4.4, §5).
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Deliver only to the originating session.
    SelfOnly(SessionId, ServerMessage),
    /// Deliver to every session in the room except the sender.
    ExcludeSender(SessionId, ServerMessage),
    /// Deliver to every session in the room, including the sender.
    All(ServerMessage),
}

/// Current wall-clock time in milliseconds since the epoch, stamped onto
/// every outbound `ServerMessage` at emission (`spec.md` §4.3).
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
