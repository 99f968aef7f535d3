//! Channel-backed connection handle.
//!
//! The socket layer owns the actual stream in its own task. It creates
//! a [`ChannelConnection`] per accepted client, keeps the receiving end
//! of the outbound channel for its writer loop, and shares the handle
//! with the session. Sending never blocks the session's update cycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::mpsc;
use worldgate_protocol::Packet;

use crate::{Connection, ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A [`Connection`] whose outbound packets are forwarded over an
/// unbounded mpsc channel to the socket writer task.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    remote_address: String,
    outbound: mpsc::UnboundedSender<Packet>,
    closed: AtomicBool,
}

impl ChannelConnection {
    /// Creates a connection handle and the receiver the writer task
    /// drains.
    pub fn new(remote_address: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        let remote_address = remote_address.into();
        tracing::debug!(%id, remote = %remote_address, "connection handle created");

        let conn = Self {
            id,
            remote_address,
            outbound: tx,
            closed: AtomicBool::new(false),
        };
        (conn, rx)
    }
}

impl Connection for ChannelConnection {
    fn send_packet(&self, packet: &Packet) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(format!(
                "{} already closed",
                self.id
            )));
        }
        self.outbound.send(packet.clone()).map_err(|_| {
            TransportError::ConnectionClosed(format!("{} writer is gone", self.id))
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(id = %self.id, "connection closed");
        }
    }

    fn is_closed(&self) -> bool {
        // A writer that dropped its receiver counts as closed too: the
        // socket is gone even if nobody called close().
        self.closed.load(Ordering::Acquire) || self.outbound.is_closed()
    }

    fn remote_address(&self) -> &str {
        &self.remote_address
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
