//! Incoming message queues.
//!
//! A session has two FIFO receive queues, split by threading
//! classification. The connection layer's receive task holds a
//! [`SessionInbox`] (cheap to clone, any number of producers); the
//! session holds the [`PacketQueues`] and drains one queue per update
//! call.
//!
//! ```text
//!               ┌─ InPlace / ThreadSafe ─→ thread-safe queue   ─→ map context
//! recv task ────┤
//!               └─ ThreadUnsafe ─────────→ thread-unsafe queue ─→ world context
//! ```
//!
//! Both queues are unbounded tokio mpsc channels. Draining uses
//! `try_recv`, which never suspends, so an update call stays
//! synchronous.

use std::sync::Arc;

use tokio::sync::mpsc;
use worldgate_protocol::Packet;

use crate::{OpcodeTable, QueueKind, SessionError};

/// Producer handle for a session's receive queues.
#[derive(Debug, Clone)]
pub struct SessionInbox {
    opcodes: Arc<OpcodeTable>,
    thread_safe: mpsc::UnboundedSender<Packet>,
    thread_unsafe: mpsc::UnboundedSender<Packet>,
}

impl SessionInbox {
    /// Classifies `packet` by its opcode and appends it to the matching
    /// queue. Returns the queue it went to.
    ///
    /// # Errors
    /// - [`SessionError::UnknownOpcode`]: opcode outside the table; the
    ///   packet is dropped.
    /// - [`SessionError::InboxClosed`]: the session is gone.
    pub fn queue_packet(&self, packet: Packet) -> Result<QueueKind, SessionError> {
        let kind = self.opcodes.processing(packet.opcode())?.queue();
        let queue = match kind {
            QueueKind::ThreadSafe => &self.thread_safe,
            QueueKind::ThreadUnsafe => &self.thread_unsafe,
        };
        queue.send(packet).map_err(|_| SessionError::InboxClosed)?;
        Ok(kind)
    }
}

/// Consumer side of the receive queues, owned by the session.
#[derive(Debug)]
pub(crate) struct PacketQueues {
    thread_safe: mpsc::UnboundedReceiver<Packet>,
    thread_unsafe: mpsc::UnboundedReceiver<Packet>,
}

impl PacketQueues {
    pub(crate) fn new(opcodes: Arc<OpcodeTable>) -> (SessionInbox, Self) {
        let (safe_tx, safe_rx) = mpsc::unbounded_channel();
        let (unsafe_tx, unsafe_rx) = mpsc::unbounded_channel();
        let inbox = SessionInbox {
            opcodes,
            thread_safe: safe_tx,
            thread_unsafe: unsafe_tx,
        };
        let queues = Self {
            thread_safe: safe_rx,
            thread_unsafe: unsafe_rx,
        };
        (inbox, queues)
    }

    /// Pops the oldest packet from `kind`'s queue, if any.
    pub(crate) fn next(&mut self, kind: QueueKind) -> Option<Packet> {
        let queue = match kind {
            QueueKind::ThreadSafe => &mut self.thread_safe,
            QueueKind::ThreadUnsafe => &mut self.thread_unsafe,
        };
        queue.try_recv().ok()
    }

    /// Closes both queues to producers and drops everything still in
    /// them. Returns how many packets were discarded.
    pub(crate) fn discard_all(&mut self) -> usize {
        self.thread_safe.close();
        self.thread_unsafe.close();
        let mut discarded = 0;
        while self.thread_safe.try_recv().is_ok() {
            discarded += 1;
        }
        while self.thread_unsafe.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }
}
