//! The player entity as seen by its session.
//!
//! A session owns at most one player, as a `Box<dyn Player>`. Combat
//! rules, aura bookkeeping, map placement and persistence all live
//! behind this trait; the session only decides *when* each of them runs
//! during logout.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use worldgate_protocol::ObjectGuid;

/// A guild, as the guild directory keys it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuildId(pub u32);

/// A party or raid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

/// A running battleground instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BattlegroundId(pub u32);

/// A battleground type, as used by the queue system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BattlegroundTypeId(pub u32);

/// A reference to some unit in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitRef {
    pub guid: ObjectGuid,
    pub is_player: bool,
}

/// One unit currently attacking the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attacker {
    pub unit: UnitRef,
    /// The unit's controller, for pets, totems and other minions.
    pub owner: Option<UnitRef>,
}

impl Attacker {
    /// The player responsible for this attacker, if any.
    ///
    /// A minion counts for its owner when the owner is a player, and for
    /// nobody otherwise. An unowned unit counts only if it is a player.
    pub fn controlling_player(&self) -> Option<ObjectGuid> {
        match self.owner {
            Some(owner) => owner.is_player.then_some(owner.guid),
            None => self.unit.is_player.then_some(self.unit.guid),
        }
    }
}

/// The distinct players behind a set of attackers, ordered by guid.
pub fn pvp_attackers(attackers: &[Attacker]) -> BTreeSet<ObjectGuid> {
    attackers
        .iter()
        .filter_map(Attacker::controlling_player)
        .collect()
}

/// A live player entity.
pub trait Player: Send {
    fn guid(&self) -> ObjectGuid;
    fn name(&self) -> &str;

    /// The lock the simulation takes while updating this player.
    /// Logout holds it for the whole teardown.
    fn update_lock(&self) -> Arc<Mutex<()>>;

    /// Placed on a map and visible to the simulation.
    fn is_in_world(&self) -> bool;
    /// Mid-teleport between maps.
    fn is_being_teleported(&self) -> bool;

    // -- Loot -------------------------------------------------------------

    /// The loot container the player has open.
    fn loot_guid(&self) -> Option<ObjectGuid>;
    fn release_loot(&mut self, loot: ObjectGuid);

    // -- Death and combat ------------------------------------------------

    /// Dead and waiting for the release timer.
    fn has_death_timer(&self) -> bool;
    fn attackers(&self) -> Vec<Attacker>;
    /// A boss encounter is active on the player's instance.
    fn encounter_in_progress(&self) -> bool;
    /// Alive only because of a redemption form.
    fn has_spirit_of_redemption(&self) -> bool;

    fn combat_stop(&mut self);
    fn set_hostile_refs_online(&mut self, online: bool);
    fn delete_hostile_refs(&mut self);
    fn remove_auras_on_death(&mut self);
    fn remove_shapeshift_auras(&mut self);
    fn set_pvp_death(&mut self, pvp: bool);
    fn kill(&mut self);
    /// Turns the corpse into a ghost.
    fn build_repop(&mut self);
    /// Moves the ghost to the nearest graveyard.
    fn repop_at_graveyard(&mut self);

    // -- Affiliations ----------------------------------------------------

    fn battleground(&self) -> Option<BattlegroundId>;
    /// Battleground queues the player is signed up for.
    fn battleground_queues(&self) -> Vec<BattlegroundTypeId>;
    fn remove_battleground_queue(&mut self, bg_type: BattlegroundTypeId);
    fn guild(&self) -> Option<GuildId>;
    fn group(&self) -> Option<GroupId>;

    // -- Teardown --------------------------------------------------------

    /// Dismisses the active pet, saving it as the current pet.
    fn remove_pet(&mut self);
    fn clear_buyback(&mut self);
    fn save(&mut self);
    fn leave_channels(&mut self);
    /// Leaves the group, disbanding it if only one member would remain.
    fn uninvite_from_group(&mut self);
    fn cleanup_before_delete(&mut self);
    fn remove_from_map(&mut self);
}
