//! Session lifecycle states.

use std::fmt;

/// Where a [`Session`](super::Session) is in its lifecycle.
///
/// ```text
/// Disconnected -> Connecting -> AwaitingUsername -> AwaitingPassword -> Authenticated -> Closed
/// ```
///
/// `Error` is terminal and reachable from any state before `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingUsername,
    AwaitingPassword,
    Authenticated,
    Closed,
    Error,
}

impl SessionState {
    /// `Closed` and `Error` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Error)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingUsername => "awaiting username",
            SessionState::AwaitingPassword => "awaiting password",
            SessionState::Authenticated => "authenticated",
            SessionState::Closed => "closed",
            SessionState::Error => "in error",
        })
    }
}
