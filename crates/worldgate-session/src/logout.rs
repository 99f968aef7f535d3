//! Logout: removing a player from the live world.
//!
//! Teardown touches combat, battlegrounds, guild, group, social lists and
//! persistence, and the order matters. The player is settled (dead or
//! alive) before anyone is told it left, it is saved before it leaves its
//! group, and it is only destroyed once every system has let go of it.
//!
//! ```text
//! logout_player()
//!   ├─ no-op if recently logged out
//!   ├─ finish any pending map transfer (bounded)
//!   ├─ teardown_player()  ← only with a player, under its update lock
//!   │    loot → death → battleground → outdoor pvp → queues → guild
//!   │    → pet → save → channels → group → social → destroy
//!   │    → LOGOUT_COMPLETE → characters offline
//!   └─ finalize: clear flags, set recently-logged-out
//! ```

use std::sync::PoisonError;

use tracing::{debug, error, info};
use worldgate_protocol::{ObjectGuid, Opcode, Packet};

use crate::player::pvp_attackers;
use crate::{FriendStatus, Player, WorldSession};

/// Guild event id broadcast when a member signs off.
const GE_SIGNED_OFF: u8 = 13;

impl WorldSession {
    /// Logs the player out, persisting it first when `save` is set.
    ///
    /// Runs at most once between logins: a second call before the next
    /// login does nothing. Without a player only the finalization runs.
    pub fn logout_player(&mut self, save: bool) {
        if self.recently_logged_out {
            return;
        }

        self.resolve_pending_transfer();

        self.player_logout = true;
        self.player_save = save;

        if let Some(player) = self.player.take() {
            self.teardown_player(player, save);
        }

        self.player_logout = false;
        self.player_save = false;
        self.recently_logged_out = true;
        self.logout_requested_at = None;
    }

    /// Completes a map transfer still in flight, so the player leaves
    /// from a consistent map state.
    fn resolve_pending_transfer(&mut self) {
        let limit = self.config.max_transfer_resolve_attempts;
        let mut attempts = 0;
        while let Some(player) = self.player.as_deref_mut() {
            if !player.is_being_teleported() {
                return;
            }
            if attempts >= limit {
                error!(
                    account = %self.account.id,
                    player = %player.guid(),
                    attempts,
                    fatal = true,
                    "transfer still pending after every completion attempt, logging out anyway"
                );
                return;
            }
            self.services.transfers.complete_transfer(player);
            attempts += 1;
        }
    }

    fn teardown_player(&mut self, mut player: Box<dyn Player>, save: bool) {
        let lock = player.update_lock();
        // A poisoned lock only means another updater panicked; teardown
        // still has to run.
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let guid = player.guid();

        if let Some(loot) = player.loot_guid() {
            player.release_loot(loot);
        }

        self.settle_death(player.as_mut());

        if let Some(bg) = player
            .battleground()
            .and_then(|id| self.services.battlegrounds.get(id))
        {
            bg.player_logged_out(guid);
        }

        self.services.outdoor_pvp.player_leave(guid);

        for bg_type in player.battleground_queues() {
            player.remove_battleground_queue(bg_type);
            self.services.battlegrounds.leave_queue(bg_type, guid, true);
        }

        if let Some(guild) = player.guild().and_then(|id| self.services.guilds.get(id)) {
            guild.load_member_stats(guid);
            guild.update_logout_time(guid);
            guild.broadcast(&signed_off_event(player.name(), guid));
        }

        player.remove_pet();

        if save {
            player.clear_buyback();
            player.save();
        }

        player.leave_channels();

        player.uninvite_from_group();
        // Still grouped: the group outlived our departure.
        if let Some(group) = player.group().and_then(|id| self.services.groups.get(id)) {
            group.check_leader(guid, true);
            group.send_update();
        }

        self.services
            .social
            .send_friend_status(guid, FriendStatus::Offline, true);
        self.services.social.remove_player_social(guid.low());

        player.cleanup_before_delete();
        if player.is_in_world() {
            player.remove_from_map();
        }
        self.services.players.remove_player(guid);

        drop(guard);
        drop(player);

        self.send_packet(&Packet::new(Opcode::LOGOUT_COMPLETE));
        debug!(account = %self.account.id, "logout acknowledgement sent");

        self.services
            .character_db
            .set_characters_offline(self.account.id);

        info!(account = %self.account.id, player = %guid, saved = save, "player logged out");
    }

    /// Settles a player that is dead, dying or in combat so it doesn't
    /// come back alive on next login.
    fn settle_death(&self, player: &mut dyn Player) {
        if player.has_death_timer() {
            player.delete_hostile_refs();
            player.build_repop();
            player.repop_at_graveyard();
            return;
        }

        let attackers = player.attackers();
        if !attackers.is_empty() || player.encounter_in_progress() {
            let victim = player.guid();
            player.combat_stop();
            player.set_hostile_refs_online(false);
            player.remove_auras_on_death();

            let killers = pvp_attackers(&attackers);
            player.set_pvp_death(!killers.is_empty());
            player.kill();
            player.build_repop();
            player.repop_at_graveyard();

            for &killer in &killers {
                self.services.honor.reward_honor(killer, victim, killers.len());
            }

            let bg = player
                .battleground()
                .and_then(|id| self.services.battlegrounds.get(id));
            if let (Some(bg), Some(&first)) = (bg, killers.first()) {
                bg.handle_kill_player(victim, first);
            }
        } else if player.has_spirit_of_redemption() {
            player.remove_shapeshift_auras();
            player.kill();
            player.build_repop();
            player.repop_at_graveyard();
        }
    }
}

/// The guild broadcast announcing a member went offline.
fn signed_off_event(name: &str, guid: ObjectGuid) -> Packet {
    let mut packet = Packet::with_capacity(Opcode::GUILD_EVENT, 1 + 1 + name.len() + 1 + 8);
    packet
        .put_u8(GE_SIGNED_OFF)
        .put_u8(1)
        .put_cstr(name)
        .put_u64(guid.0);
    packet
}
