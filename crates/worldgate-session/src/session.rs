//! The per-connection session controller.
//!
//! A [`WorldSession`] exists for every authenticated connection. It owns
//! the player while one is logged in, drains its receive queues through
//! the status gate, and runs logout when the player leaves.
//!
//! ## Lifecycle
//!
//! ```text
//! new() ──→ update(Map) / update(World) each tick ──→ update() == false ──→ drop
//!               │                                         ▲
//!               │  connection gone, or logout timer due   │
//!               └──────────→ logout_player() ─────────────┘
//! ```
//!
//! `update` is called from two scheduling contexts: the map context
//! drains the thread-safe queue, the world context drains the
//! thread-unsafe queue and is the only one that may run logout. The
//! caller removes the session from its registry once `update` returns
//! `false`.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, error, info, trace, warn};
use worldgate_protocol::{AccountId, Opcode, Packet, ProtocolError};
use worldgate_transport::Connection;

use crate::account::{AccountInfo, Locale, SecurityLevel};
use crate::budget::StageTimer;
use crate::config::{OvertimeAction, SessionConfig};
use crate::gate::{self, GateState, Verdict};
use crate::inbox::{PacketQueues, SessionInbox};
use crate::{
    AntiCheat, ClientProfile, OpcodeTable, Player, QueueKind, SessionError, SessionKey,
    WorldServices,
};

/// `AUTH_RESPONSE` result: admitted.
pub const AUTH_OK: u8 = 0x0C;
/// `AUTH_RESPONSE` result: waiting in the login queue.
pub const AUTH_WAIT_QUEUE: u8 = 0x1B;

/// Longest text the client accepts in a notification, in bytes.
const MAX_MESSAGE_LEN: usize = 1023;

/// Author recorded on bans the server issues by itself.
const BAN_AUTHOR: &str = "CONSOLE";
const OVERTIME_BAN_REASON: &str = "session update overtime";

/// Player name logged when there is none.
const NO_PLAYER_NAME: &str = "<none>";

/// Which queue an [`WorldSession::update`] call drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateContext {
    /// Per-map update: drains the thread-safe queue.
    Map,
    /// World update: drains the thread-unsafe queue and may log out.
    World,
}

impl UpdateContext {
    fn queue(self) -> QueueKind {
        match self {
            Self::Map => QueueKind::ThreadSafe,
            Self::World => QueueKind::ThreadUnsafe,
        }
    }
}

/// What happened to one dispatched packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran and accepted the payload.
    Handled,
    /// The handler ran and rejected the payload.
    Malformed,
    /// Dropped without a log line.
    Ignored,
    /// Dropped as not allowed in the session's current state.
    Unexpected,
    /// Dropped as never allowed from a client.
    Forbidden,
    /// The opcode has no table entry.
    UnknownOpcode,
}

/// One authenticated connection and, while logged in, its player.
pub struct WorldSession {
    pub(crate) account: AccountInfo,
    pub(crate) config: Arc<SessionConfig>,
    opcodes: Arc<OpcodeTable>,
    pub(crate) services: WorldServices,

    /// Our reference to the shared connection. `None` once released.
    connection: Option<Arc<dyn Connection>>,
    /// Kept after the connection is released, for logs and bans.
    remote_address: String,

    inbox: SessionInbox,
    queues: PacketQueues,

    pub(crate) player: Option<Box<dyn Player>>,
    anticheat: Option<Box<dyn AntiCheat>>,

    kick_timer: Duration,
    pub(crate) logout_requested_at: Option<Instant>,
    latency: u32,

    in_queue: bool,
    player_loading: bool,
    pub(crate) player_logout: bool,
    pub(crate) player_save: bool,
    pub(crate) recently_logged_out: bool,
}

impl WorldSession {
    /// Creates the session for a freshly authenticated connection.
    ///
    /// With a connection, the account is flagged online right away.
    /// `connection` may be `None` for sessions that never had a socket.
    pub fn new(
        account: AccountInfo,
        connection: Option<Arc<dyn Connection>>,
        opcodes: Arc<OpcodeTable>,
        services: WorldServices,
        config: Arc<SessionConfig>,
    ) -> Self {
        let remote_address = connection
            .as_ref()
            .map(|conn| conn.remote_address().to_owned())
            .unwrap_or_default();
        let (inbox, queues) = PacketQueues::new(Arc::clone(&opcodes));

        if connection.is_some() {
            services.login_db.set_account_online(account.id, true);
        }
        info!(account = %account.id, address = %remote_address, "session created");

        Self {
            kick_timer: config.idle_kick_after,
            account,
            config,
            opcodes,
            services,
            connection,
            remote_address,
            inbox,
            queues,
            player: None,
            anticheat: None,
            logout_requested_at: None,
            latency: 0,
            in_queue: false,
            player_loading: false,
            player_logout: false,
            player_save: false,
            recently_logged_out: false,
        }
    }

    // -----------------------------------------------------------------------
    // Account and connection state
    // -----------------------------------------------------------------------

    pub fn account_id(&self) -> AccountId {
        self.account.id
    }

    pub fn security(&self) -> SecurityLevel {
        self.account.security
    }

    pub fn expansion(&self) -> u8 {
        self.account.expansion
    }

    pub fn locale(&self) -> Locale {
        self.account.locale
    }

    pub fn account_flags(&self) -> u64 {
        self.account.flags
    }

    /// `true` while the account's chat mute runs past `now`.
    pub fn is_muted_at(&self, now: SystemTime) -> bool {
        self.account.mute_until.is_some_and(|until| until > now)
    }

    pub fn mute_reason(&self) -> &str {
        &self.account.mute_reason
    }

    /// Mutes chat until `until`, or unmutes with `None`.
    pub fn set_mute(&mut self, until: Option<SystemTime>, reason: impl Into<String>) {
        self.account.mute_until = until;
        self.account.mute_reason = reason.into();
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }

    pub fn set_latency(&mut self, latency: u32) {
        self.latency = latency;
    }

    /// `true` while the session still holds its connection reference.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Holding a connection that hasn't closed yet.
    fn connection_open(&self) -> bool {
        self.connection.as_ref().is_some_and(|conn| !conn.is_closed())
    }

    pub fn in_queue(&self) -> bool {
        self.in_queue
    }

    pub fn set_in_queue(&mut self, in_queue: bool) {
        self.in_queue = in_queue;
    }

    pub fn player_loading(&self) -> bool {
        self.player_loading
    }

    pub fn set_player_loading(&mut self, loading: bool) {
        self.player_loading = loading;
    }

    /// `true` while a logout is requested or running.
    pub fn is_logging_out(&self) -> bool {
        self.logout_requested_at.is_some() || self.player_logout
    }

    /// `true` while a running logout will persist the player.
    pub fn is_saving(&self) -> bool {
        self.player_save
    }

    pub fn recently_logged_out(&self) -> bool {
        self.recently_logged_out
    }

    /// Time left before an idle session is kicked.
    pub fn kick_timer(&self) -> Duration {
        self.kick_timer
    }

    pub fn has_anticheat(&self) -> bool {
        self.anticheat.is_some()
    }

    /// The logging name of `opcode`.
    pub fn opcode_name(&self, opcode: Opcode) -> &'static str {
        self.opcodes.name(opcode)
    }

    // -----------------------------------------------------------------------
    // Player
    // -----------------------------------------------------------------------

    pub fn player(&self) -> Option<&dyn Player> {
        self.player.as_deref()
    }

    pub fn player_mut(&mut self) -> Option<&mut (dyn Player + 'static)> {
        self.player.as_deref_mut()
    }

    pub fn player_name(&self) -> &str {
        self.player.as_deref().map_or(NO_PLAYER_NAME, |p| p.name())
    }

    /// Installs the logged-in player.
    ///
    /// # Errors
    /// [`SessionError::PlayerAlreadyPresent`] if a player is already
    /// installed. The new one is dropped.
    pub fn set_player(&mut self, player: Box<dyn Player>) -> Result<(), SessionError> {
        if self.player.is_some() {
            return Err(SessionError::PlayerAlreadyPresent);
        }
        debug!(account = %self.account.id, player = %player.guid(), "player installed");
        self.player = Some(player);
        self.recently_logged_out = false;
        Ok(())
    }

    fn player_in_world(&self) -> bool {
        self.player.as_deref().is_some_and(|p| p.is_in_world())
    }

    // -----------------------------------------------------------------------
    // Logout request timer
    // -----------------------------------------------------------------------

    /// Starts (`Some`) or cancels (`None`) a delayed logout.
    pub fn request_logout(&mut self, requested_at: Option<Instant>) {
        self.logout_requested_at = requested_at;
    }

    /// `true` once a requested logout's delay has elapsed at `now`.
    pub fn should_logout(&self, now: Instant) -> bool {
        self.logout_requested_at
            .is_some_and(|at| now >= at + self.config.logout_delay)
    }

    // -----------------------------------------------------------------------
    // Disabled opcodes
    // -----------------------------------------------------------------------

    pub fn set_opcode_disable_flag(&mut self, flag: u16) {
        self.account.opcodes_disabled |= flag;
        self.services
            .login_db
            .save_disabled_opcodes(self.account.id, self.account.opcodes_disabled);
    }

    pub fn remove_opcode_disable_flag(&mut self, flag: u16) {
        self.account.opcodes_disabled &= !flag;
        self.services
            .login_db
            .save_disabled_opcodes(self.account.id, self.account.opcodes_disabled);
    }

    pub fn is_opcode_disabled(&self, flag: u16) -> bool {
        self.account.opcodes_disabled & flag != 0
    }

    // -----------------------------------------------------------------------
    // Incoming
    // -----------------------------------------------------------------------

    /// A producer handle for the connection layer's receive task.
    pub fn inbox(&self) -> SessionInbox {
        self.inbox.clone()
    }

    /// Enqueues a packet on this session directly.
    ///
    /// # Errors
    /// [`SessionError::UnknownOpcode`] for opcodes outside the table.
    pub fn queue_packet(&self, packet: Packet) -> Result<QueueKind, SessionError> {
        self.inbox.queue_packet(packet)
    }

    fn gate_state(&self) -> GateState {
        GateState {
            has_player: self.player.is_some(),
            player_in_world: self.player_in_world(),
            in_queue: self.in_queue,
            recently_logged_out: self.recently_logged_out,
        }
    }

    /// Runs one packet through the status gate and, if allowed, its
    /// handler.
    pub fn process_packet(&mut self, packet: &Packet) -> DispatchOutcome {
        let opcode = packet.opcode();
        let table = Arc::clone(&self.opcodes);
        let Some(entry) = table.get(opcode) else {
            error!(account = %self.account.id, %opcode, "received non-existent opcode");
            return DispatchOutcome::UnknownOpcode;
        };

        match gate::evaluate(entry.status, opcode, self.gate_state()) {
            Verdict::Invoke { clears_logout_grace } => {
                if clears_logout_grace {
                    self.recently_logged_out = false;
                }
                trace!(
                    account = %self.account.id,
                    %opcode,
                    name = entry.name,
                    size = packet.len(),
                    "dispatching packet"
                );
                match entry.handler.handle(self, packet) {
                    Ok(()) => DispatchOutcome::Handled,
                    Err(ProtocolError::SizeMismatch { expected, .. }) => {
                        self.size_error(packet, expected);
                        DispatchOutcome::Malformed
                    }
                    Err(err) => {
                        error!(
                            account = %self.account.id,
                            %opcode,
                            name = entry.name,
                            error = %err,
                            "handler rejected packet"
                        );
                        DispatchOutcome::Malformed
                    }
                }
            }
            Verdict::Ignore => DispatchOutcome::Ignored,
            Verdict::Unexpected(reason) => {
                debug!(
                    account = %self.account.id,
                    player = self.player_name(),
                    %opcode,
                    name = entry.name,
                    reason,
                    "received unexpected opcode"
                );
                DispatchOutcome::Unexpected
            }
            Verdict::Forbidden => {
                error!(
                    account = %self.account.id,
                    player = self.player_name(),
                    %opcode,
                    name = entry.name,
                    "received not allowed opcode"
                );
                DispatchOutcome::Forbidden
            }
        }
    }

    /// Logs a payload that is shorter than its handler needs.
    pub fn size_error(&self, packet: &Packet, expected: usize) {
        error!(
            account = %self.account.id,
            opcode = %packet.opcode(),
            name = self.opcode_name(packet.opcode()),
            size = packet.len(),
            expected,
            "client sent packet with wrong size, skipped"
        );
    }

    // -----------------------------------------------------------------------
    // Update cycle
    // -----------------------------------------------------------------------

    /// Advances the session by `diff` on behalf of `context`.
    ///
    /// Returns `false` once the session has released its connection and
    /// should be unregistered and dropped.
    pub fn update(&mut self, diff: Duration, context: UpdateContext) -> bool {
        self.tick_kick_timer(diff);

        let mut timer = StageTimer::start(self.config.update_max_time, self.account.id);

        let queue = context.queue();
        while self.connection_open() {
            let Some(packet) = self.queues.next(queue) else {
                break;
            };
            self.process_packet(&packet);
        }
        timer.lap("packets");

        let open = self.connection_open();
        let outbound = match self.anticheat.as_mut() {
            Some(engine) if open => engine.update(),
            _ => Vec::new(),
        };
        for packet in &outbound {
            self.send_packet(packet);
        }
        timer.lap("anticheat");

        if timer.overtime() {
            self.apply_overtime_policy();
        }

        if context == UpdateContext::World {
            let logout_due = self.should_logout(Instant::now()) && !self.player_loading;
            if self.connection.is_none() || logout_due {
                self.logout_player(true);
            }
        }

        if self.connection.as_ref().is_some_and(|conn| conn.is_closed()) {
            self.release_connection();
        }

        self.connection.is_some()
    }

    fn tick_kick_timer(&mut self, diff: Duration) {
        let idle = !self.in_queue && !self.player_loading && !self.player_in_world();
        if !idle {
            self.kick_timer = self.config.idle_kick_after;
            return;
        }

        self.kick_timer = self.kick_timer.saturating_sub(diff);
        if self.kick_timer.is_zero() && self.connection_open() {
            info!(account = %self.account.id, "kicking idle session");
            self.kick_player();
        }
    }

    fn apply_overtime_policy(&self) {
        let policy = self.config.overtime_policy;
        for action in policy.escalation() {
            match action {
                OvertimeAction::BanAddress => self.services.login_db.ban_address(
                    &self.remote_address,
                    BAN_AUTHOR,
                    OVERTIME_BAN_REASON,
                ),
                OvertimeAction::BanAccount => self.services.login_db.ban_account(
                    self.account.id,
                    BAN_AUTHOR,
                    OVERTIME_BAN_REASON,
                ),
                OvertimeAction::Kick => self.kick_player(),
                OvertimeAction::Log => error!(
                    account = %self.account.id,
                    address = %self.remote_address,
                    ?policy,
                    "session update took longer than allowed"
                ),
            }
        }
    }

    /// Drops our connection reference. Safe to call more than once.
    fn release_connection(&mut self) {
        if let Some(conn) = self.connection.take() {
            debug!(account = %self.account.id, connection = %conn.id(), "released connection");
        }
    }

    // -----------------------------------------------------------------------
    // Outgoing
    // -----------------------------------------------------------------------

    /// Sends a packet to the client. A failed send closes the
    /// connection; without one this is a no-op.
    pub fn send_packet(&self, packet: &Packet) {
        let Some(conn) = &self.connection else {
            return;
        };
        trace!(account = %self.account.id, opcode = %packet.opcode(), size = packet.len(), "send");
        if let Err(err) = conn.send_packet(packet) {
            debug!(account = %self.account.id, error = %err, "send failed, closing connection");
            conn.close();
        }
    }

    /// Closes the connection. The session notices on its next update.
    pub fn kick_player(&self) {
        if let Some(conn) = &self.connection {
            conn.close();
        }
    }

    pub fn send_area_trigger_message(&self, text: &str) {
        let text = truncate_message(text);
        let mut packet = Packet::with_capacity(Opcode::AREA_TRIGGER_MESSAGE, 4 + text.len() + 1);
        // Length includes the terminator.
        packet.put_u32(text.len() as u32 + 1).put_cstr(text);
        self.send_packet(&packet);
    }

    pub fn send_notification(&self, text: &str) {
        let text = truncate_message(text);
        let mut packet = Packet::with_capacity(Opcode::NOTIFICATION, text.len() + 1);
        packet.put_cstr(text);
        self.send_packet(&packet);
    }

    /// Sends server string `entry` in the session's locale as a
    /// notification. Nothing is sent for an unknown entry.
    pub fn send_localized_notification(&self, entry: i32) {
        if let Some(text) = self.localized_string(entry) {
            self.send_notification(&text);
        }
    }

    /// A server string in the session's locale.
    pub fn localized_string(&self, entry: i32) -> Option<String> {
        self.services.strings.get(entry, self.account.locale)
    }

    /// Tells the client where it stands in the login queue. Position
    /// zero means it has been admitted.
    pub fn send_auth_wait_queue(&self, position: u32) {
        let mut packet = Packet::with_capacity(Opcode::AUTH_RESPONSE, 5);
        if position == 0 {
            packet.put_u8(AUTH_OK);
        } else {
            packet.put_u8(AUTH_WAIT_QUEUE).put_u32(position);
        }
        self.send_packet(&packet);
    }

    // -----------------------------------------------------------------------
    // Anti-cheat
    // -----------------------------------------------------------------------

    /// Starts the anti-cheat engine for the client's operating system.
    ///
    /// A profile the factory has no engine for starts nothing and
    /// succeeds.
    ///
    /// # Errors
    /// - [`SessionError::AntiCheatAlreadyActive`] if an engine is
    ///   already running.
    /// - [`SessionError::UnsupportedClientProfile`] for an unknown OS.
    ///   The client is kicked if the config says so.
    pub fn init_anticheat(&mut self, key: &SessionKey, os: u8) -> Result<(), SessionError> {
        if self.anticheat.is_some() {
            warn!(account = %self.account.id, "anti-cheat already initialised");
            return Err(SessionError::AntiCheatAlreadyActive);
        }

        let profile = ClientProfile::from_os(os);
        if let ClientProfile::Unsupported(os) = profile {
            warn!(account = %self.account.id, os, "client reported unsupported operating system");
            if self.config.anticheat_kick_unsupported {
                info!(account = %self.account.id, "kicking client with unsupported anti-cheat profile");
                self.kick_player();
            }
            return Err(SessionError::UnsupportedClientProfile(profile));
        }

        let Some(mut engine) = self.services.anticheat.create(profile) else {
            debug!(account = %self.account.id, ?profile, "no anti-cheat engine for profile");
            return Ok(());
        };
        let outbound = engine.init(self.account.id, key);
        self.anticheat = Some(engine);
        for packet in &outbound {
            self.send_packet(packet);
        }
        Ok(())
    }
}

impl Drop for WorldSession {
    fn drop(&mut self) {
        if self.player.is_some() {
            self.logout_player(true);
        }
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
        self.anticheat = None;
        let discarded = self.queues.discard_all();

        self.services.login_db.set_account_online(self.account.id, false);
        self.services.character_db.set_characters_offline(self.account.id);
        debug!(account = %self.account.id, discarded, "session destroyed");
    }
}

/// Cuts `text` to at most [`MAX_MESSAGE_LEN`] bytes on a char boundary.
fn truncate_message(text: &str) -> &str {
    if text.len() <= MAX_MESSAGE_LEN {
        return text;
    }
    let mut end = MAX_MESSAGE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
