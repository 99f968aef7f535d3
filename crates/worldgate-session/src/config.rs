//! Session configuration and the overtime escalation ladder.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OvertimePolicy
// ---------------------------------------------------------------------------

/// What to do with a session whose update ran past its time budget.
///
/// The levels are ordered by severity and each one implies every level
/// below it:
///
/// ```text
/// IpBan ⊃ AccountBan ⊃ Kick ⊃ Log
/// ```
///
/// So `IpBan` writes an address ban, an account ban, kicks, *and* logs.
/// Treat these as a ladder, not as independent choices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertimePolicy {
    #[default]
    Log,
    Kick,
    AccountBan,
    IpBan,
}

/// A single rung of the overtime ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvertimeAction {
    BanAddress,
    BanAccount,
    Kick,
    Log,
}

impl OvertimePolicy {
    /// The actions this policy fires, most severe first.
    pub fn escalation(self) -> &'static [OvertimeAction] {
        const LADDER: [OvertimeAction; 4] = [
            OvertimeAction::BanAddress,
            OvertimeAction::BanAccount,
            OvertimeAction::Kick,
            OvertimeAction::Log,
        ];
        match self {
            Self::IpBan => &LADDER[0..],
            Self::AccountBan => &LADDER[1..],
            Self::Kick => &LADDER[2..],
            Self::Log => &LADDER[3..],
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables shared by every session on a realm.
///
/// Loaded once at startup and handed to sessions as an
/// `Arc<SessionConfig>`. Durations serialize as whole milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Per-stage processing budget for one update call. Draining the
    /// queue and ticking anti-cheat are each measured against it.
    #[serde(with = "millis")]
    pub update_max_time: Duration,

    /// What happens when a stage goes over `update_max_time`.
    pub overtime_policy: OvertimePolicy,

    /// Kick clients whose anti-cheat profile is unsupported.
    pub anticheat_kick_unsupported: bool,

    /// How long a connected session may sit without an in-world player
    /// (and without being queued or loading) before it is kicked.
    #[serde(with = "millis")]
    pub idle_kick_after: Duration,

    /// Delay between a client's logout request and the forced logout.
    #[serde(with = "millis")]
    pub logout_delay: Duration,

    /// How many times logout re-runs the transfer-completion step for a
    /// player stuck mid-teleport before giving up on it.
    pub max_transfer_resolve_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_max_time: Duration::from_millis(100),
            overtime_policy: OvertimePolicy::default(),
            anticheat_kick_unsupported: false,
            idle_kick_after: Duration::from_secs(15 * 60),
            logout_delay: Duration::from_secs(20),
            max_transfer_resolve_attempts: 100,
        }
    }
}

impl SessionConfig {
    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// - `max_transfer_resolve_attempts` is raised to at least 1, so a
    ///   pending transfer always gets one completion attempt.
    pub fn validated(mut self) -> Self {
        if self.max_transfer_resolve_attempts == 0 {
            tracing::warn!("max_transfer_resolve_attempts is 0, raising to 1");
            self.max_transfer_resolve_attempts = 1;
        }
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
