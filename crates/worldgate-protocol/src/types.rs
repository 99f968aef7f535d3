//! Identity and opcode types shared by every layer.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The account a session is authenticated as.
///
/// A newtype over the raw `u32` the login database hands out, so an
/// account id can never be passed where a character guid is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique identifier of a world object (player, creature, pet,
/// loot container, ...).
///
/// The low 32 bits are the per-type counter used by the social and
/// character tables; see [`ObjectGuid::low`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectGuid(pub u64);

impl ObjectGuid {
    /// Returns the low 32-bit counter part of the guid.
    pub fn low(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }
}

impl fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// The message-type identifier carried by every packet.
///
/// Opcodes index the session's dispatch table directly, so anything at
/// or above [`Opcode::COUNT`] is out of range and must never be used as
/// an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Number of message types the dispatch table is sized for.
    pub const COUNT: u16 = 0x424;

    /// Client keepalive sent while another unit holds the mover. It is
    /// marked never-allowed but arrives constantly, so it is dropped
    /// without logging.
    pub const MOVE_NOT_ACTIVE_MOVER: Opcode = Opcode(0x2D1);

    pub const LOGOUT_COMPLETE: Opcode = Opcode(0x04D);
    pub const GUILD_EVENT: Opcode = Opcode(0x092);
    pub const NOTIFICATION: Opcode = Opcode(0x1CB);
    pub const AUTH_RESPONSE: Opcode = Opcode(0x1EE);
    pub const AREA_TRIGGER_MESSAGE: Opcode = Opcode(0x2B8);

    /// Returns `true` if this opcode has a slot in the dispatch table.
    pub fn in_range(self) -> bool {
        self.0 < Self::COUNT
    }

    /// The table index for this opcode.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}
