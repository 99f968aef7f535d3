//! Wire-level vocabulary for Worldgate.
//!
//! This crate defines what travels between a client connection and its
//! session:
//!
//! - **Identity** ([`AccountId`], [`ObjectGuid`]): who a session or
//!   entity is.
//! - **Opcodes** ([`Opcode`]): the integer key that selects a message's
//!   type and its dispatch entry.
//! - **Packets** ([`Packet`], [`PacketReader`]): an opcode plus an
//!   opaque payload, with little-endian readers/writers for the few
//!   payloads the session core builds itself.
//! - **Errors** ([`ProtocolError`]): what can go wrong reading a payload.
//!
//! # Architecture
//!
//! Byte framing belongs to the connection layer. By the time a packet
//! reaches this crate it has already been split off the stream; the
//! protocol layer only knows how to name it and read its fields.
//!
//! ```text
//! Transport (frames) → Protocol (Packet) → Session (dispatch)
//! ```

mod error;
mod packet;
mod types;

pub use error::ProtocolError;
pub use packet::{Packet, PacketReader};
pub use types::{AccountId, ObjectGuid, Opcode};
