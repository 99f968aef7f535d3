//! The opcode dispatch table.
//!
//! Every message type has exactly one entry: a handler, the session
//! status the message requires, and which queue it is processed from.
//! The table is built once at process start, wrapped in an `Arc`, and
//! shared read-only by every session.
//!
//! ```text
//! Opcode ──index──→ OpcodeEntry { name, status, processing, handler }
//! ```
//!
//! Slots nobody registers still exist: they behave like
//! [`handle_null`] with status [`SessionStatus::Never`], so the only
//! opcodes without an entry are the ones past [`Opcode::COUNT`].

use std::fmt;
use std::sync::Arc;

use worldgate_protocol::{Opcode, Packet, ProtocolError};

use crate::{SessionError, WorldSession};

/// Name logged for opcodes outside the table.
pub const UNKNOWN_OPCODE_NAME: &str = "UNKNOWN";

/// Name of table slots that were never registered.
const UNREGISTERED_NAME: &str = "MSG_NULL_ACTION";

// ---------------------------------------------------------------------------
// Entry attributes
// ---------------------------------------------------------------------------

/// The session state a message requires before its handler may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Never dispatched. Server-side or retired opcodes.
    Never,
    /// The connection is authenticated and past the login queue.
    Authenticated,
    /// A player is logged in and placed in the world.
    LoggedIn,
    /// A player is logged in and mid-transfer between maps.
    TransferPending,
}

/// Which queue a message is processed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketProcessing {
    /// Cheap enough to run on whichever context drains the safe queue.
    InPlace,
    /// Touches only the player's own map; runs on the map context.
    ThreadSafe,
    /// Touches shared world state; runs only on the world context.
    ThreadUnsafe,
}

impl PacketProcessing {
    /// The queue a message with this classification goes to.
    pub fn queue(self) -> QueueKind {
        match self {
            Self::InPlace | Self::ThreadSafe => QueueKind::ThreadSafe,
            Self::ThreadUnsafe => QueueKind::ThreadUnsafe,
        }
    }
}

/// One of the session's two receive queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    ThreadSafe,
    ThreadUnsafe,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Something that can process one message for a session.
///
/// Closures and plain functions with the matching signature implement
/// this automatically. A handler that finds the payload too short
/// returns the reader's [`ProtocolError::SizeMismatch`]; the dispatcher
/// logs it and drops the packet without touching the connection.
pub trait PacketHandler: Send + Sync + 'static {
    fn handle(&self, session: &mut WorldSession, packet: &Packet) -> Result<(), ProtocolError>;
}

impl<F> PacketHandler for F
where
    F: Fn(&mut WorldSession, &Packet) -> Result<(), ProtocolError> + Send + Sync + 'static,
{
    fn handle(&self, session: &mut WorldSession, packet: &Packet) -> Result<(), ProtocolError> {
        self(session, packet)
    }
}

/// Default handler for opcodes the server doesn't implement.
pub fn handle_null(session: &mut WorldSession, packet: &Packet) -> Result<(), ProtocolError> {
    tracing::debug!(
        account = %session.account_id(),
        opcode = %packet.opcode(),
        name = session.opcode_name(packet.opcode()),
        "received unhandled opcode"
    );
    Ok(())
}

/// For opcodes the connection layer consumes itself (auth, ping). One
/// reaching a session means the connection layer let it through.
pub fn handle_early_process(
    session: &mut WorldSession,
    packet: &Packet,
) -> Result<(), ProtocolError> {
    tracing::error!(
        account = %session.account_id(),
        opcode = %packet.opcode(),
        name = session.opcode_name(packet.opcode()),
        "received opcode that must be processed by the connection layer"
    );
    Ok(())
}

/// For server-to-client opcodes a client sent back.
pub fn handle_server_side(
    session: &mut WorldSession,
    packet: &Packet,
) -> Result<(), ProtocolError> {
    tracing::error!(
        account = %session.account_id(),
        opcode = %packet.opcode(),
        name = session.opcode_name(packet.opcode()),
        "received server-side opcode"
    );
    Ok(())
}

pub fn handle_deprecated(
    session: &mut WorldSession,
    packet: &Packet,
) -> Result<(), ProtocolError> {
    tracing::error!(
        account = %session.account_id(),
        opcode = %packet.opcode(),
        name = session.opcode_name(packet.opcode()),
        "received deprecated opcode"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A single dispatch table slot.
#[derive(Clone)]
pub struct OpcodeEntry {
    pub name: &'static str,
    pub status: SessionStatus,
    pub processing: PacketProcessing,
    pub handler: Arc<dyn PacketHandler>,
}

impl fmt::Debug for OpcodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeEntry")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("processing", &self.processing)
            .finish_non_exhaustive()
    }
}

/// Read-only lookup from opcode to its dispatch entry.
#[derive(Debug)]
pub struct OpcodeTable {
    entries: Vec<OpcodeEntry>,
}

impl OpcodeTable {
    /// Starts a table where every slot is unregistered.
    pub fn builder() -> OpcodeTableBuilder {
        let null: Arc<dyn PacketHandler> = Arc::new(handle_null);
        let unregistered = OpcodeEntry {
            name: UNREGISTERED_NAME,
            status: SessionStatus::Never,
            processing: PacketProcessing::InPlace,
            handler: null,
        };
        OpcodeTableBuilder {
            entries: vec![unregistered; usize::from(Opcode::COUNT)],
        }
    }

    /// Returns the entry for `opcode`, or `None` if it is out of range.
    pub fn get(&self, opcode: Opcode) -> Option<&OpcodeEntry> {
        if !opcode.in_range() {
            return None;
        }
        self.entries.get(opcode.index())
    }

    /// The threading classification for `opcode`.
    ///
    /// # Errors
    /// [`SessionError::UnknownOpcode`] if the opcode is out of range.
    pub fn processing(&self, opcode: Opcode) -> Result<PacketProcessing, SessionError> {
        self.get(opcode)
            .map(|entry| entry.processing)
            .ok_or(SessionError::UnknownOpcode(opcode))
    }

    /// The opcode's name, for logging.
    pub fn name(&self, opcode: Opcode) -> &'static str {
        self.get(opcode).map_or(UNKNOWN_OPCODE_NAME, |entry| entry.name)
    }
}

/// Collects registrations, then freezes them into an [`OpcodeTable`].
pub struct OpcodeTableBuilder {
    entries: Vec<OpcodeEntry>,
}

impl OpcodeTableBuilder {
    /// Registers a closure or function as the handler for `opcode`.
    pub fn register<F>(
        self,
        opcode: Opcode,
        name: &'static str,
        status: SessionStatus,
        processing: PacketProcessing,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut WorldSession, &Packet) -> Result<(), ProtocolError> + Send + Sync + 'static,
    {
        self.register_handler(opcode, name, status, processing, Arc::new(handler))
    }

    /// Registers an already-shared handler for `opcode`.
    ///
    /// Out-of-range opcodes are rejected with an error log; the table
    /// keeps its fixed size. Registering the same opcode twice keeps the
    /// later registration.
    pub fn register_handler(
        mut self,
        opcode: Opcode,
        name: &'static str,
        status: SessionStatus,
        processing: PacketProcessing,
        handler: Arc<dyn PacketHandler>,
    ) -> Self {
        let Some(slot) = self.entries.get_mut(opcode.index()) else {
            tracing::error!(%opcode, name, "cannot register opcode outside the dispatch table");
            return self;
        };
        if slot.name != UNREGISTERED_NAME {
            tracing::warn!(%opcode, old = slot.name, new = name, "opcode registered twice");
        }
        *slot = OpcodeEntry {
            name,
            status,
            processing,
            handler,
        };
        self
    }

    pub fn build(self) -> OpcodeTable {
        OpcodeTable {
            entries: self.entries,
        }
    }
}
