//! Error types for the protocol layer.
//!
//! Each crate in Worldgate defines its own error enum. A
//! `ProtocolError` always means a payload did not have the shape its
//! handler expected; it never means the connection itself is broken.

use crate::Opcode;

/// Errors that can occur while reading a packet payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The payload is shorter than the handler needs.
    ///
    /// `size` is what the client actually sent, `expected` is the
    /// minimum number of bytes the read required.
    #[error("packet {opcode} has size {size} but expected {expected}")]
    SizeMismatch {
        opcode: Opcode,
        size: usize,
        expected: usize,
    },

    /// The payload is long enough but violates the message's rules,
    /// e.g. an enum field outside its valid range.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
