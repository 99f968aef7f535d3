//! # Worldgate
//!
//! Per-connection world session controller for MMO game servers.
//!
//! Worldgate sits between the socket layer and the simulation. Each
//! authenticated connection gets a [`WorldSession`] that:
//!
//! - classifies incoming packets into two queues by threading needs,
//! - checks every packet against the session's state before its handler
//!   runs,
//! - keeps each update inside a time budget, escalating when it doesn't,
//! - and logs the player out of every subsystem, in order, exactly once.
//!
//! ## Layers
//!
//! ```text
//! worldgate-transport  Connection, ChannelConnection
//! worldgate-protocol   Opcode, Packet, PacketReader
//! worldgate-session    OpcodeTable, WorldSession, logout, anti-cheat hook
//! worldgate            this facade: prelude, WorldgateError, init_tracing
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use worldgate::prelude::*;
//!
//! worldgate::init_tracing("info");
//!
//! let opcodes = Arc::new(
//!     OpcodeTable::builder()
//!         .register(Opcode(0x4B), "CMSG_LOGOUT_REQUEST", SessionStatus::LoggedIn,
//!                   PacketProcessing::ThreadUnsafe, handle_logout_request)
//!         .build(),
//! );
//! let mut session = WorldSession::new(account, Some(connection), opcodes, services, config);
//!
//! // Receive task:  session.inbox().queue_packet(packet)?;
//! // Map tick:      session.update(diff, UpdateContext::Map);
//! // World tick:    if !session.update(diff, UpdateContext::World) { drop(session) }
//! ```

mod error;
mod logging;

pub use error::WorldgateError;
pub use logging::init_tracing;

pub use worldgate_protocol as protocol;
pub use worldgate_session as session;
pub use worldgate_transport as transport;

pub use worldgate_session::{UpdateContext, WorldSession};

/// Everything needed to build a session and its dispatch table.
pub mod prelude {
    pub use std::sync::Arc;

    pub use worldgate_protocol::{AccountId, ObjectGuid, Opcode, Packet, ProtocolError};
    pub use worldgate_session::{
        AccountInfo, DispatchOutcome, OpcodeTable, OvertimePolicy, PacketProcessing, Player,
        SessionConfig, SessionError, SessionInbox, SessionStatus, UpdateContext, WorldServices,
        WorldSession,
    };
    pub use worldgate_transport::{ChannelConnection, Connection};

    pub use crate::{WorldgateError, init_tracing};
}
