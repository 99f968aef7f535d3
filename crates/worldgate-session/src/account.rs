//! Account attributes a session is created with.

use std::time::SystemTime;

use worldgate_protocol::AccountId;

/// Account privilege tier, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    Player,
    Moderator,
    GameMaster,
    Administrator,
    Console,
}

impl SecurityLevel {
    /// Maps the login database's raw column. Anything above the known
    /// tiers is treated as console access.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Player,
            1 => Self::Moderator,
            2 => Self::GameMaster,
            3 => Self::Administrator,
            _ => Self::Console,
        }
    }
}

/// Client locale, in the order the client reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    #[default]
    EnUs,
    KoKr,
    FrFr,
    DeDe,
    ZhCn,
    ZhTw,
    EsEs,
    EsMx,
    RuRu,
}

impl Locale {
    /// Maps the client's locale index; unknown indices fall back to
    /// `enUS`.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Self::KoKr,
            2 => Self::FrFr,
            3 => Self::DeDe,
            4 => Self::ZhCn,
            5 => Self::ZhTw,
            6 => Self::EsEs,
            7 => Self::EsMx,
            8 => Self::RuRu,
            _ => Self::EnUs,
        }
    }
}

/// Everything the login server knows about the account when the
/// session is created.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub id: AccountId,
    pub security: SecurityLevel,
    /// Highest content expansion the account may use.
    pub expansion: u8,
    pub locale: Locale,
    /// Chat is muted until this instant, if set.
    pub mute_until: Option<SystemTime>,
    pub mute_reason: String,
    pub flags: u64,
    /// Bitmask of administratively disabled message groups.
    pub opcodes_disabled: u16,
}

impl AccountInfo {
    /// An unprivileged, unmuted enUS account with the given id.
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            security: SecurityLevel::Player,
            expansion: 0,
            locale: Locale::EnUs,
            mute_until: None,
            mute_reason: String::new(),
            flags: 0,
            opcodes_disabled: 0,
        }
    }
}
