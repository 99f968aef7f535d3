//! Per-connection session controller for Worldgate.
//!
//! One [`WorldSession`] sits between an authenticated client connection
//! and the simulated world. It handles:
//!
//! 1. **Dispatch**: an [`OpcodeTable`] maps every opcode to a handler,
//!    the [`SessionStatus`] it requires, and its [`PacketProcessing`]
//!    class.
//! 2. **Queueing**: the connection layer pushes packets into a
//!    [`SessionInbox`]; they land in one of two FIFO queues by class.
//! 3. **Gating**: each dequeued packet is checked against the session's
//!    state before its handler runs.
//! 4. **Updating**: [`WorldSession::update`] drains one queue per call,
//!    enforces the time budget, ticks anti-cheat, and decides when the
//!    session is done.
//! 5. **Logout**: [`WorldSession::logout_player`] tears the player out
//!    of every subsystem in a fixed order, exactly once.
//!
//! # How it fits in the stack
//!
//! ```text
//! World / map schedulers (above)  ← call update(), own the session registry
//!     ↕
//! Session Layer (this crate)      ← dispatch, gating, logout
//!     ↕
//! Transport + Protocol (below)    ← Connection, Packet, Opcode
//! ```
//!
//! Everything outside the session (databases, guilds, groups,
//! battlegrounds, the player entity itself) is reached through the
//! traits in [`WorldServices`] and [`Player`].

mod account;
mod anticheat;
mod budget;
mod config;
mod error;
mod gate;
mod inbox;
mod logout;
mod opcode;
mod player;
mod services;
mod session;

pub use account::{AccountInfo, Locale, SecurityLevel};
pub use anticheat::{AntiCheat, AntiCheatFactory, ClientProfile, SessionKey};
pub use config::{OvertimeAction, OvertimePolicy, SessionConfig};
pub use error::SessionError;
pub use inbox::SessionInbox;
pub use opcode::{
    OpcodeEntry, OpcodeTable, OpcodeTableBuilder, PacketHandler, PacketProcessing, QueueKind,
    SessionStatus, UNKNOWN_OPCODE_NAME, handle_deprecated, handle_early_process, handle_null,
    handle_server_side,
};
pub use player::{
    Attacker, BattlegroundId, BattlegroundTypeId, GroupId, GuildId, Player, UnitRef,
    pvp_attackers,
};
pub use services::{
    Battleground, Battlegrounds, CharacterDatabase, FriendStatus, Group, Groups, Guild, Guilds,
    HonorRewards, LoginDatabase, OutdoorPvp, PlayerRegistry, Social, StringTable,
    TransferCompletion, WorldServices,
};
pub use session::{AUTH_OK, AUTH_WAIT_QUEUE, DispatchOutcome, UpdateContext, WorldSession};
