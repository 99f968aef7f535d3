//! Error types for the session layer.

use worldgate_protocol::Opcode;

use crate::ClientProfile;

/// Errors returned by session operations.
///
/// Most of what goes wrong inside a session (a message arriving in the
/// wrong state, a malformed payload, an overlong tick) is logged and
/// absorbed rather than returned. These variants are the cases where
/// the caller asked for something the session cannot do.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The opcode is outside the dispatch table's range. It has no
    /// entry and therefore no threading classification.
    #[error("opcode {0} is outside the dispatch table")]
    UnknownOpcode(Opcode),

    /// The session's receive queues are gone (the session was
    /// destroyed while the connection layer still held an inbox).
    #[error("session inbox is closed")]
    InboxClosed,

    /// A session owns at most one player. Logout must finish before a
    /// new one can be installed.
    #[error("session already owns a player")]
    PlayerAlreadyPresent,

    /// The client reported an operating system the anti-cheat layer
    /// doesn't know.
    #[error("unsupported anti-cheat client profile {0:?}")]
    UnsupportedClientProfile(ClientProfile),

    /// An anti-cheat engine is already running for this session. It
    /// lives as long as the session and is never replaced.
    #[error("anti-cheat engine already active")]
    AntiCheatAlreadyActive,
}
