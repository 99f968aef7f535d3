//! Collaborators a session calls into.
//!
//! Everything a session touches outside itself goes through one of
//! these traits, handed in at construction as [`WorldServices`]. None of
//! them report failure: a collaborator either succeeds or deals with its
//! own faults (a persistence layer retries or logs on its side).

use std::sync::Arc;

use worldgate_protocol::{AccountId, ObjectGuid, Packet};

use crate::{
    AntiCheatFactory, BattlegroundId, BattlegroundTypeId, GroupId, GuildId, Locale, Player,
};

/// Account-level persistence.
pub trait LoginDatabase: Send + Sync {
    fn set_account_online(&self, account: AccountId, online: bool);
    fn save_disabled_opcodes(&self, account: AccountId, mask: u16);
    fn ban_address(&self, address: &str, author: &str, reason: &str);
    fn ban_account(&self, account: AccountId, author: &str, reason: &str);
}

/// Character-level persistence.
pub trait CharacterDatabase: Send + Sync {
    /// Marks every character on the account offline.
    fn set_characters_offline(&self, account: AccountId);
}

/// The global registry of live player entities.
pub trait PlayerRegistry: Send + Sync {
    fn remove_player(&self, player: ObjectGuid);
}

/// Honor distribution for player kills.
pub trait HonorRewards: Send + Sync {
    /// Rewards `attacker` for killing `victim`, shared among
    /// `group_size` distinct attackers.
    fn reward_honor(&self, attacker: ObjectGuid, victim: ObjectGuid, group_size: usize);
}

/// A running battleground instance.
pub trait Battleground: Send + Sync {
    fn handle_kill_player(&self, victim: ObjectGuid, killer: ObjectGuid);
    /// Drops or returns any flag the player carries.
    fn player_logged_out(&self, player: ObjectGuid);
}

/// Battleground instances and queues.
pub trait Battlegrounds: Send + Sync {
    fn get(&self, id: BattlegroundId) -> Option<Arc<dyn Battleground>>;
    fn leave_queue(&self, bg_type: BattlegroundTypeId, player: ObjectGuid, decrease_invite: bool);
}

/// Outdoor world-PvP zones.
pub trait OutdoorPvp: Send + Sync {
    fn player_leave(&self, player: ObjectGuid);
}

pub trait Guild: Send + Sync {
    /// Refreshes the roster entry for `member` from the player's state.
    fn load_member_stats(&self, member: ObjectGuid);
    fn update_logout_time(&self, member: ObjectGuid);
    fn broadcast(&self, packet: &Packet);
}

pub trait Guilds: Send + Sync {
    fn get(&self, id: GuildId) -> Option<Arc<dyn Guild>>;
}

pub trait Group: Send + Sync {
    /// Passes leadership on if `member` was the leader.
    fn check_leader(&self, member: ObjectGuid, logout: bool);
    fn send_update(&self);
}

pub trait Groups: Send + Sync {
    fn get(&self, id: GroupId) -> Option<Arc<dyn Group>>;
}

/// Friend-list presence states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendStatus {
    Offline,
    Online,
    Afk,
    Dnd,
}

/// Friend and ignore lists.
pub trait Social: Send + Sync {
    fn send_friend_status(&self, player: ObjectGuid, status: FriendStatus, broadcast: bool);
    /// Drops the player's social data and removes them from others'
    /// lists. Keyed by the guid's low part.
    fn remove_player_social(&self, guid_low: u32);
}

/// Finishes a pending map transfer (the world-port acknowledgement).
pub trait TransferCompletion: Send + Sync {
    fn complete_transfer(&self, player: &mut dyn Player);
}

/// Localised server strings.
pub trait StringTable: Send + Sync {
    fn get(&self, entry: i32, locale: Locale) -> Option<String>;
}

/// Every collaborator a session needs, injected at construction.
#[derive(Clone)]
pub struct WorldServices {
    pub login_db: Arc<dyn LoginDatabase>,
    pub character_db: Arc<dyn CharacterDatabase>,
    pub players: Arc<dyn PlayerRegistry>,
    pub honor: Arc<dyn HonorRewards>,
    pub battlegrounds: Arc<dyn Battlegrounds>,
    pub outdoor_pvp: Arc<dyn OutdoorPvp>,
    pub guilds: Arc<dyn Guilds>,
    pub groups: Arc<dyn Groups>,
    pub social: Arc<dyn Social>,
    pub transfers: Arc<dyn TransferCompletion>,
    pub anticheat: Arc<dyn AntiCheatFactory>,
    pub strings: Arc<dyn StringTable>,
}
