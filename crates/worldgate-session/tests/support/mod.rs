//! Shared in-memory world for the session integration tests.
//!
//! Every collaborator call, from the services and from the mock player,
//! lands in one [`Journal`] so tests can assert on ordering.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use worldgate_protocol::{AccountId, ObjectGuid, Opcode, Packet, ProtocolError};
use worldgate_session::{
    AccountInfo, AntiCheat, AntiCheatFactory, Attacker, Battleground, BattlegroundId,
    BattlegroundTypeId, Battlegrounds, CharacterDatabase, ClientProfile, FriendStatus, Group,
    GroupId, Groups, Guild, GuildId, Guilds, HonorRewards, Locale, LoginDatabase, OpcodeTable,
    OutdoorPvp, PacketProcessing, Player, PlayerRegistry, SessionConfig, SessionKey,
    SessionStatus, Social, StringTable, TransferCompletion, WorldServices, WorldSession,
};
use worldgate_transport::{ChannelConnection, Connection};

// =========================================================================
// Journal
// =========================================================================

/// One observed collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AccountOnline(bool),
    SaveDisabledOpcodes(u16),
    BanAddress(String),
    BanAccount(AccountId),
    CharactersOffline,
    RemovePlayer(ObjectGuid),
    RewardHonor {
        attacker: ObjectGuid,
        victim: ObjectGuid,
        group_size: usize,
    },
    BgKill {
        victim: ObjectGuid,
        killer: ObjectGuid,
    },
    BgLoggedOut,
    LeaveQueue(BattlegroundTypeId),
    OutdoorLeave,
    GuildStats,
    GuildLogoutTime,
    GuildBroadcast(Opcode),
    GroupCheckLeader,
    GroupUpdate,
    FriendStatus(FriendStatus),
    SocialRemoved(u32),
    CompleteTransfer,
    AntiCheatInit,
    AntiCheatTick,
    /// A method called on the mock player.
    Player(&'static str),
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Index of the first occurrence of `call`.
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    /// Asserts that `calls` appear in this order (not necessarily
    /// adjacent).
    pub fn assert_in_order(&self, calls: &[Call]) {
        let positions: Vec<usize> = calls
            .iter()
            .map(|c| {
                self.position(c)
                    .unwrap_or_else(|| panic!("{c:?} never happened: {:?}", self.calls()))
            })
            .collect();
        assert!(
            positions.windows(2).all(|w| w[0] < w[1]),
            "out of order: {calls:?} at {positions:?}"
        );
    }
}

// =========================================================================
// Mock world: every service trait
// =========================================================================

#[derive(Default)]
pub struct MockWorld {
    pub journal: Journal,
    registry: Mutex<HashSet<ObjectGuid>>,
    /// Transfers the mock player still has to finish.
    pub pending_transfers: Arc<AtomicU32>,
    /// When set, completing a transfer never makes progress.
    pub transfers_stuck: AtomicBool,
}

impl MockWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn services(self: &Arc<Self>) -> WorldServices {
        WorldServices {
            login_db: self.clone(),
            character_db: self.clone(),
            players: self.clone(),
            honor: self.clone(),
            battlegrounds: self.clone(),
            outdoor_pvp: self.clone(),
            guilds: self.clone(),
            groups: self.clone(),
            social: self.clone(),
            transfers: self.clone(),
            anticheat: self.clone(),
            strings: self.clone(),
        }
    }

    pub fn register(&self, guid: ObjectGuid) {
        self.registry.lock().unwrap().insert(guid);
    }

    pub fn is_registered(&self, guid: ObjectGuid) -> bool {
        self.registry.lock().unwrap().contains(&guid)
    }
}

impl LoginDatabase for MockWorld {
    fn set_account_online(&self, _account: AccountId, online: bool) {
        self.journal.record(Call::AccountOnline(online));
    }

    fn save_disabled_opcodes(&self, _account: AccountId, mask: u16) {
        self.journal.record(Call::SaveDisabledOpcodes(mask));
    }

    fn ban_address(&self, address: &str, _author: &str, _reason: &str) {
        self.journal.record(Call::BanAddress(address.to_owned()));
    }

    fn ban_account(&self, account: AccountId, _author: &str, _reason: &str) {
        self.journal.record(Call::BanAccount(account));
    }
}

impl CharacterDatabase for MockWorld {
    fn set_characters_offline(&self, _account: AccountId) {
        self.journal.record(Call::CharactersOffline);
    }
}

impl PlayerRegistry for MockWorld {
    fn remove_player(&self, player: ObjectGuid) {
        self.registry.lock().unwrap().remove(&player);
        self.journal.record(Call::RemovePlayer(player));
    }
}

impl HonorRewards for MockWorld {
    fn reward_honor(&self, attacker: ObjectGuid, victim: ObjectGuid, group_size: usize) {
        self.journal.record(Call::RewardHonor {
            attacker,
            victim,
            group_size,
        });
    }
}

struct MockBattleground(Journal);

impl Battleground for MockBattleground {
    fn handle_kill_player(&self, victim: ObjectGuid, killer: ObjectGuid) {
        self.0.record(Call::BgKill { victim, killer });
    }

    fn player_logged_out(&self, _player: ObjectGuid) {
        self.0.record(Call::BgLoggedOut);
    }
}

impl Battlegrounds for MockWorld {
    fn get(&self, _id: BattlegroundId) -> Option<Arc<dyn Battleground>> {
        Some(Arc::new(MockBattleground(self.journal.clone())))
    }

    fn leave_queue(&self, bg_type: BattlegroundTypeId, _player: ObjectGuid, _decrease: bool) {
        self.journal.record(Call::LeaveQueue(bg_type));
    }
}

impl OutdoorPvp for MockWorld {
    fn player_leave(&self, _player: ObjectGuid) {
        self.journal.record(Call::OutdoorLeave);
    }
}

struct MockGuild(Journal);

impl Guild for MockGuild {
    fn load_member_stats(&self, _member: ObjectGuid) {
        self.0.record(Call::GuildStats);
    }

    fn update_logout_time(&self, _member: ObjectGuid) {
        self.0.record(Call::GuildLogoutTime);
    }

    fn broadcast(&self, packet: &Packet) {
        self.0.record(Call::GuildBroadcast(packet.opcode()));
    }
}

impl Guilds for MockWorld {
    fn get(&self, _id: GuildId) -> Option<Arc<dyn Guild>> {
        Some(Arc::new(MockGuild(self.journal.clone())))
    }
}

struct MockGroup(Journal);

impl Group for MockGroup {
    fn check_leader(&self, _member: ObjectGuid, _logout: bool) {
        self.0.record(Call::GroupCheckLeader);
    }

    fn send_update(&self) {
        self.0.record(Call::GroupUpdate);
    }
}

impl Groups for MockWorld {
    fn get(&self, _id: GroupId) -> Option<Arc<dyn Group>> {
        Some(Arc::new(MockGroup(self.journal.clone())))
    }
}

impl Social for MockWorld {
    fn send_friend_status(&self, _player: ObjectGuid, status: FriendStatus, _broadcast: bool) {
        self.journal.record(Call::FriendStatus(status));
    }

    fn remove_player_social(&self, guid_low: u32) {
        self.journal.record(Call::SocialRemoved(guid_low));
    }
}

impl TransferCompletion for MockWorld {
    fn complete_transfer(&self, _player: &mut dyn Player) {
        self.journal.record(Call::CompleteTransfer);
        if !self.transfers_stuck.load(Ordering::SeqCst) {
            // Saturating: never wraps below zero.
            let _ = self
                .pending_transfers
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        }
    }
}

impl StringTable for MockWorld {
    fn get(&self, entry: i32, locale: Locale) -> Option<String> {
        (entry == 1).then(|| format!("greeting {locale:?}"))
    }
}

/// Opcode the mock anti-cheat engine sends on init.
pub const ANTICHEAT_OP: Opcode = Opcode(0x2E6);

struct MockAntiCheat(Journal);

impl AntiCheat for MockAntiCheat {
    fn init(&mut self, _account: AccountId, _key: &SessionKey) -> Vec<Packet> {
        self.0.record(Call::AntiCheatInit);
        vec![Packet::new(ANTICHEAT_OP)]
    }

    fn update(&mut self) -> Vec<Packet> {
        self.0.record(Call::AntiCheatTick);
        Vec::new()
    }
}

impl AntiCheatFactory for MockWorld {
    fn create(&self, profile: ClientProfile) -> Option<Box<dyn AntiCheat>> {
        match profile {
            ClientProfile::Windows => Some(Box::new(MockAntiCheat(self.journal.clone()))),
            _ => None,
        }
    }
}

// =========================================================================
// Mock player
// =========================================================================

pub struct MockPlayer {
    pub guid: ObjectGuid,
    pub name: String,
    pub in_world: bool,
    pub loot: Option<ObjectGuid>,
    pub death_timer: bool,
    pub attackers: Vec<Attacker>,
    pub encounter: bool,
    pub redemption: bool,
    pub battleground: Option<BattlegroundId>,
    pub queues: Vec<BattlegroundTypeId>,
    pub guild: Option<GuildId>,
    pub group: Option<GroupId>,
    /// Group left after uninviting; `Some` keeps the player grouped.
    pub group_after_leave: Option<GroupId>,
    pending_transfers: Arc<AtomicU32>,
    lock: Arc<Mutex<()>>,
    /// Each state-mutating call, paired with whether the update lock was
    /// held at that moment.
    lock_samples: Arc<Mutex<Vec<(&'static str, bool)>>>,
    journal: Journal,
}

impl MockPlayer {
    /// An idle, in-world player with no affiliations.
    pub fn new(world: &MockWorld, guid: u64, name: &str) -> Self {
        Self {
            guid: ObjectGuid(guid),
            name: name.to_owned(),
            in_world: true,
            loot: None,
            death_timer: false,
            attackers: Vec::new(),
            encounter: false,
            redemption: false,
            battleground: None,
            queues: Vec::new(),
            guild: None,
            group: None,
            group_after_leave: None,
            pending_transfers: world.pending_transfers.clone(),
            lock: Arc::new(Mutex::new(())),
            lock_samples: Arc::new(Mutex::new(Vec::new())),
            journal: world.journal.clone(),
        }
    }

    /// The player's update lock, for tests that check it is released.
    pub fn lock(&self) -> Arc<Mutex<()>> {
        self.lock.clone()
    }

    /// Lock observations, readable after the player has been destroyed.
    pub fn lock_samples(&self) -> Arc<Mutex<Vec<(&'static str, bool)>>> {
        self.lock_samples.clone()
    }

    fn record(&self, what: &'static str) {
        self.journal.record(Call::Player(what));
    }

    /// Records `what` and notes whether someone holds the update lock.
    fn record_locked(&self, what: &'static str) {
        let held = self.lock.try_lock().is_err();
        self.lock_samples.lock().unwrap().push((what, held));
        self.record(what);
    }
}

impl Player for MockPlayer {
    fn guid(&self) -> ObjectGuid {
        self.guid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn update_lock(&self) -> Arc<Mutex<()>> {
        self.lock.clone()
    }

    fn is_in_world(&self) -> bool {
        self.in_world
    }

    fn is_being_teleported(&self) -> bool {
        self.pending_transfers.load(Ordering::SeqCst) > 0
    }

    fn loot_guid(&self) -> Option<ObjectGuid> {
        self.loot
    }

    fn release_loot(&mut self, _loot: ObjectGuid) {
        self.loot = None;
        self.record_locked("release_loot");
    }

    fn has_death_timer(&self) -> bool {
        self.death_timer
    }

    fn attackers(&self) -> Vec<Attacker> {
        self.attackers.clone()
    }

    fn encounter_in_progress(&self) -> bool {
        self.encounter
    }

    fn has_spirit_of_redemption(&self) -> bool {
        self.redemption
    }

    fn combat_stop(&mut self) {
        self.attackers.clear();
        self.record_locked("combat_stop");
    }

    fn set_hostile_refs_online(&mut self, _online: bool) {
        self.record("hostile_refs_offline");
    }

    fn delete_hostile_refs(&mut self) {
        self.record("delete_hostile_refs");
    }

    fn remove_auras_on_death(&mut self) {
        self.record("remove_auras_on_death");
    }

    fn remove_shapeshift_auras(&mut self) {
        self.record("remove_shapeshift_auras");
    }

    fn set_pvp_death(&mut self, pvp: bool) {
        self.record(if pvp { "pvp_death" } else { "pve_death" });
    }

    fn kill(&mut self) {
        self.record_locked("kill");
    }

    fn build_repop(&mut self) {
        self.record("build_repop");
    }

    fn repop_at_graveyard(&mut self) {
        self.record("repop_at_graveyard");
    }

    fn battleground(&self) -> Option<BattlegroundId> {
        self.battleground
    }

    fn battleground_queues(&self) -> Vec<BattlegroundTypeId> {
        self.queues.clone()
    }

    fn remove_battleground_queue(&mut self, bg_type: BattlegroundTypeId) {
        self.queues.retain(|q| *q != bg_type);
        self.record("remove_battleground_queue");
    }

    fn guild(&self) -> Option<GuildId> {
        self.guild
    }

    fn group(&self) -> Option<GroupId> {
        self.group
    }

    fn remove_pet(&mut self) {
        self.record("remove_pet");
    }

    fn clear_buyback(&mut self) {
        self.record("clear_buyback");
    }

    fn save(&mut self) {
        self.record_locked("save");
    }

    fn leave_channels(&mut self) {
        self.record("leave_channels");
    }

    fn uninvite_from_group(&mut self) {
        self.group = self.group_after_leave;
        self.record("uninvite_from_group");
    }

    fn cleanup_before_delete(&mut self) {
        self.record_locked("cleanup_before_delete");
    }

    fn remove_from_map(&mut self) {
        self.in_world = false;
        self.record_locked("remove_from_map");
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        self.record("dropped");
    }
}

// =========================================================================
// Opcode table
// =========================================================================

pub const SAFE_OP: Opcode = Opcode(0x200);
pub const INPLACE_OP: Opcode = Opcode(0x201);
pub const UNSAFE_OP: Opcode = Opcode(0x202);
pub const AUTH_OP: Opcode = Opcode(0x203);
pub const TRANSFER_OP: Opcode = Opcode(0x204);
pub const SERVER_SIDE_OP: Opcode = Opcode(0x205);
/// LoggedIn, thread-unsafe, needs a u32 payload.
pub const SIZED_OP: Opcode = Opcode(0x206);
/// LoggedIn, thread-unsafe, sleeps for [`SLOW_HANDLER_TIME`].
pub const SLOW_OP: Opcode = Opcode(0x207);

pub const SLOW_HANDLER_TIME: Duration = Duration::from_millis(20);

/// Handler invocations, as (opcode, sequence number if any).
#[derive(Clone, Default)]
pub struct Dispatched(Arc<Mutex<Vec<(Opcode, Option<u32>)>>>);

impl Dispatched {
    pub fn all(&self) -> Vec<(Opcode, Option<u32>)> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn sequence(&self, opcode: Opcode) -> Vec<u32> {
        self.all()
            .into_iter()
            .filter(|(op, _)| *op == opcode)
            .filter_map(|(_, n)| n)
            .collect()
    }
}

pub fn numbered(opcode: Opcode, n: u32) -> Packet {
    let mut packet = Packet::new(opcode);
    packet.put_u32(n);
    packet
}

pub fn test_table(dispatched: &Dispatched) -> Arc<OpcodeTable> {
    let recorder = |dispatched: &Dispatched| {
        let dispatched = dispatched.clone();
        move |_: &mut WorldSession, packet: &Packet| -> Result<(), ProtocolError> {
            let n = packet.reader().read_u32().ok();
            dispatched.0.lock().unwrap().push((packet.opcode(), n));
            Ok(())
        }
    };
    let sized = {
        let dispatched = dispatched.clone();
        move |_: &mut WorldSession, packet: &Packet| -> Result<(), ProtocolError> {
            let n = packet.reader().read_u32()?;
            dispatched.0.lock().unwrap().push((packet.opcode(), Some(n)));
            Ok(())
        }
    };
    let slow = |_: &mut WorldSession, _: &Packet| -> Result<(), ProtocolError> {
        std::thread::sleep(SLOW_HANDLER_TIME);
        Ok(())
    };

    use PacketProcessing::*;
    use SessionStatus::*;
    Arc::new(
        OpcodeTable::builder()
            .register(SAFE_OP, "CMSG_SAFE", LoggedIn, ThreadSafe, recorder(dispatched))
            .register(INPLACE_OP, "CMSG_INPLACE", LoggedIn, InPlace, recorder(dispatched))
            .register(UNSAFE_OP, "CMSG_UNSAFE", LoggedIn, ThreadUnsafe, recorder(dispatched))
            .register(AUTH_OP, "CMSG_AUTHED", Authenticated, ThreadUnsafe, recorder(dispatched))
            .register(TRANSFER_OP, "MSG_TRANSFER", TransferPending, ThreadUnsafe, recorder(dispatched))
            .register(SERVER_SIDE_OP, "SMSG_SERVER", Never, InPlace, recorder(dispatched))
            .register(Opcode::MOVE_NOT_ACTIVE_MOVER, "CMSG_MOVE_NOT_ACTIVE_MOVER", Never, InPlace, recorder(dispatched))
            .register(SIZED_OP, "CMSG_SIZED", LoggedIn, ThreadUnsafe, sized)
            .register(SLOW_OP, "CMSG_SLOW", LoggedIn, ThreadUnsafe, slow)
            .build(),
    )
}

// =========================================================================
// Harness
// =========================================================================

pub const ACCOUNT: AccountId = AccountId(77);
pub const REMOTE: &str = "203.0.113.9";

pub struct Harness {
    pub world: Arc<MockWorld>,
    pub dispatched: Dispatched,
    pub connection: Arc<ChannelConnection>,
    /// What the socket writer task would receive.
    pub outbound: mpsc::UnboundedReceiver<Packet>,
    pub session: WorldSession,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let world = MockWorld::new();
        let dispatched = Dispatched::default();
        let (connection, outbound) = ChannelConnection::new(REMOTE);
        let connection = Arc::new(connection);
        let shared: Arc<dyn Connection> = connection.clone();
        let session = WorldSession::new(
            AccountInfo::new(ACCOUNT),
            Some(shared),
            test_table(&dispatched),
            world.services(),
            Arc::new(config),
        );
        Self {
            world,
            dispatched,
            connection,
            outbound,
            session,
        }
    }

    /// Installs an in-world player and registers it with the world.
    pub fn login(&mut self, player: MockPlayer) {
        self.world.register(player.guid);
        self.session
            .set_player(Box::new(player))
            .expect("no player installed yet");
    }

    pub fn player(&self, guid: u64, name: &str) -> MockPlayer {
        MockPlayer::new(&self.world, guid, name)
    }

    /// Packets sent to the client so far.
    pub fn sent(&mut self) -> Vec<Packet> {
        std::iter::from_fn(|| self.outbound.try_recv().ok()).collect()
    }
}

// =========================================================================
// Log capture
// =========================================================================

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A layer that keeps every event it sees.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<CapturedEvent>>>);

impl LogCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, message: &str) -> usize {
        self.events().iter().filter(|e| e.message == message).count()
    }

    pub fn find(&self, message: &str) -> Option<CapturedEvent> {
        self.events().into_iter().find(|e| e.message == message)
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name().to_owned(), format!("{value:?}")));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.0.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Runs `f` with every tracing event on this thread captured.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, LogCapture) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, capture)
}
