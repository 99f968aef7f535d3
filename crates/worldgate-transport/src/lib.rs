//! Connection handle abstraction for Worldgate.
//!
//! Provides the [`Connection`] trait: the narrow surface a session needs
//! from the socket layer (send, close, closed?, remote address). Byte
//! framing, socket accept/read/write and the authentication handshake
//! all live on the other side of this trait.
//!
//! # Sharing
//!
//! A connection is shared between the socket layer and the session as an
//! `Arc<dyn Connection>`. The session's clone of that `Arc` *is* its
//! reference: it acquires one when it is created and releases it exactly
//! once, by dropping it, when it notices the connection has closed or
//! when the session itself is destroyed.

mod channel;
mod error;

pub use channel::ChannelConnection;
pub use error::TransportError;

use std::fmt;

use worldgate_protocol::Packet;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A live client connection as seen from a session.
///
/// All methods are synchronous: the session calls them from inside its
/// update cycle, which never suspends. Implementations hand the actual
/// I/O to their own tasks.
pub trait Connection: Send + Sync + 'static {
    /// Queues a packet for delivery to the client.
    ///
    /// # Errors
    /// [`TransportError::ConnectionClosed`] if the connection can no
    /// longer deliver anything. The caller is expected to close it.
    fn send_packet(&self, packet: &Packet) -> Result<(), TransportError>;

    /// Closes the connection. Idempotent.
    fn close(&self);

    /// Returns `true` once the connection has been closed from either
    /// side.
    fn is_closed(&self) -> bool;

    /// The peer's address as text, used for address-level ban records.
    fn remote_address(&self) -> &str;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
