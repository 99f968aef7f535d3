//! Anti-cheat engine lifecycle.
//!
//! The detection algorithm and its wire protocol belong to the engine.
//! The session only decides which engine to create, ticks it once per
//! update while the connection is open, forwards whatever packets it
//! produces, and drops it when the session goes away.

use std::fmt;

use worldgate_protocol::{AccountId, Packet};

/// The shared secret negotiated during authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(pub Vec<u8>);

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the key itself.
        write!(f, "SessionKey({} bytes)", self.0.len())
    }
}

/// The client platform, which decides the engine flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientProfile {
    Windows,
    Mac,
    Unsupported(u8),
}

impl ClientProfile {
    /// Maps the operating system byte the client reports.
    pub fn from_os(os: u8) -> Self {
        match os {
            0 => Self::Windows,
            1 => Self::Mac,
            other => Self::Unsupported(other),
        }
    }
}

/// One anti-cheat engine instance, owned by a session.
pub trait AntiCheat: Send {
    /// Starts the engine. Returns packets to send to the client.
    fn init(&mut self, account: AccountId, key: &SessionKey) -> Vec<Packet>;

    /// Advances the engine by one session update. Returns packets to
    /// send to the client.
    fn update(&mut self) -> Vec<Packet>;
}

/// Creates engines by client profile.
pub trait AntiCheatFactory: Send + Sync {
    /// `None` if there is no engine for this profile. Unsupported
    /// profiles never reach the factory.
    fn create(&self, profile: ClientProfile) -> Option<Box<dyn AntiCheat>>;
}
