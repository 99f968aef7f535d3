//! The status gate: may this message run in the session's current state?
//!
//! The decision is a pure function of the message's required
//! [`SessionStatus`] and a snapshot of the session ([`GateState`]).
//! Logging and invoking are left to the caller, which keeps every rule
//! in one table:
//!
//! | required        | no player                       | player, in world | player, not in world |
//! |-----------------|---------------------------------|------------------|----------------------|
//! | LoggedIn        | unexpected (ignored after logout)| invoke          | ignore               |
//! | TransferPending | unexpected                      | unexpected       | invoke               |
//! | Authenticated   | invoke unless queued            | invoke unless queued | invoke unless queued |
//! | Never           | forbidden (keepalive ignored)   | forbidden        | forbidden            |

use worldgate_protocol::Opcode;

use crate::SessionStatus;

/// What the gate needs to know about the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateState {
    pub has_player: bool,
    pub player_in_world: bool,
    /// Still waiting in the login queue.
    pub in_queue: bool,
    /// A logout finished and no authenticated message has arrived since.
    pub recently_logged_out: bool,
}

/// The gate's decision for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Run the handler. When `clears_logout_grace` is set the session's
    /// recently-logged-out flag must be cleared first.
    Invoke { clears_logout_grace: bool },
    /// Drop silently.
    Ignore,
    /// Drop and log as an unexpected opcode, with the reason.
    Unexpected(&'static str),
    /// Drop and log as a never-allowed opcode.
    Forbidden,
}

pub const REASON_NOT_LOGGED_IN: &str = "the player has not logged in yet";
pub const REASON_STILL_IN_WORLD: &str = "the player is still in world";
pub const REASON_IN_QUEUE: &str = "the player has not passed the queue yet";

/// Decides what to do with a message requiring `status`.
pub fn evaluate(status: SessionStatus, opcode: Opcode, state: GateState) -> Verdict {
    match status {
        SessionStatus::LoggedIn => {
            if !state.has_player {
                // Delayed packets from before a logout are expected.
                if state.recently_logged_out {
                    Verdict::Ignore
                } else {
                    Verdict::Unexpected(REASON_NOT_LOGGED_IN)
                }
            } else if state.player_in_world {
                Verdict::Invoke {
                    clears_logout_grace: false,
                }
            } else {
                // Lag can deliver these after a transfer has started.
                Verdict::Ignore
            }
        }
        SessionStatus::TransferPending => {
            if !state.has_player {
                Verdict::Unexpected(REASON_NOT_LOGGED_IN)
            } else if state.player_in_world {
                Verdict::Unexpected(REASON_STILL_IN_WORLD)
            } else {
                Verdict::Invoke {
                    clears_logout_grace: false,
                }
            }
        }
        SessionStatus::Authenticated => {
            if state.in_queue {
                Verdict::Unexpected(REASON_IN_QUEUE)
            } else {
                Verdict::Invoke {
                    clears_logout_grace: true,
                }
            }
        }
        SessionStatus::Never => {
            if opcode == Opcode::MOVE_NOT_ACTIVE_MOVER {
                Verdict::Ignore
            } else {
                Verdict::Forbidden
            }
        }
    }
}
