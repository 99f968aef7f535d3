//! Packets: an opcode plus an opaque payload.
//!
//! Ownership of a `Packet` moves from the connection layer into a
//! session queue, then into the dispatch call, and the packet is
//! dropped once its handler returns. Nothing in the core keeps a
//! packet around after that.
//!
//! Payload fields are little-endian. Strings are NUL-terminated.

use crate::{Opcode, ProtocolError};

/// A single message, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    opcode: Opcode,
    payload: Vec<u8>,
}

impl Packet {
    /// Creates an empty packet.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
        }
    }

    /// Creates an empty packet with room for `size_hint` payload bytes.
    ///
    /// The hint is the expected size of the finished payload; writing
    /// more than that is allowed, it just reallocates.
    pub fn with_capacity(opcode: Opcode, size_hint: usize) -> Self {
        Self {
            opcode,
            payload: Vec::with_capacity(size_hint),
        }
    }

    /// Wraps a payload received from the connection layer.
    pub fn from_payload(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Fails with [`ProtocolError::SizeMismatch`] unless the payload
    /// holds at least `expected` bytes.
    pub fn ensure_size(&self, expected: usize) -> Result<(), ProtocolError> {
        if self.payload.len() < expected {
            return Err(self.size_mismatch(expected));
        }
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.payload.push(value);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.payload.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends `value` followed by a NUL terminator.
    ///
    /// Interior NULs are written as-is; the reader will stop at the
    /// first one, same as the client does.
    pub fn put_cstr(&mut self, value: &str) -> &mut Self {
        self.payload.extend_from_slice(value.as_bytes());
        self.payload.push(0);
        self
    }

    /// Starts reading the payload from the beginning.
    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader {
            packet: self,
            pos: 0,
        }
    }

    fn size_mismatch(&self, expected: usize) -> ProtocolError {
        ProtocolError::SizeMismatch {
            opcode: self.opcode,
            size: self.payload.len(),
            expected,
        }
    }
}

/// Sequential reader over a packet's payload.
///
/// Every read that would run past the end of the payload returns
/// [`ProtocolError::SizeMismatch`] with `expected` set to the size the
/// read needed, and leaves the cursor where it was.
#[derive(Debug)]
pub struct PacketReader<'a> {
    packet: &'a Packet,
    pos: usize,
}

impl PacketReader<'_> {
    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.packet.payload.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        let [b] = self.take::<1>()?;
        Ok(b)
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_le_bytes(self.take::<8>()?))
    }

    /// Reads a NUL-terminated string. Invalid UTF-8 is replaced rather
    /// than rejected; clients send whatever their locale produced.
    pub fn read_cstr(&mut self) -> Result<String, ProtocolError> {
        let rest = &self.packet.payload[self.pos..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            // The terminator itself is the missing byte.
            return Err(self.packet.size_mismatch(self.packet.payload.len() + 1));
        };
        let text = String::from_utf8_lossy(&rest[..nul]).into_owned();
        self.pos += nul + 1;
        Ok(text)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let end = self.pos + N;
        let bytes = self
            .packet
            .payload
            .get(self.pos..end)
            .ok_or_else(|| self.packet.size_mismatch(end))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos = end;
        Ok(out)
    }
}
