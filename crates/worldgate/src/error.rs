//! Unified error type for Worldgate.

use worldgate_protocol::ProtocolError;
use worldgate_session::SessionError;
use worldgate_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Code built on the `worldgate` facade deals with this single type. The
/// `#[from]` attribute on each variant generates the `From` impl, so `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WorldgateError {
    /// A connection-level error (send on a closed connection).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A payload-level error (short read, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown opcode, closed inbox, player or
    /// anti-cheat already present).
    #[error(transparent)]
    Session(#[from] SessionError),
}
