//! Connection state machine.

use super::commands::{Command, CommandKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the link to the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Transport not open
    Closed,
    /// Transport open, meter not answering; alive poll running
    Offline,
    /// Meter answered; initialization sequence in flight
    Initializing,
    /// Meter answering data requests; measurement poll running
    Online,
    /// Transport being torn down
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Closed => "Closed",
            ConnectionState::Offline => "Offline",
            ConnectionState::Initializing => "Initializing",
            ConnectionState::Online => "Online",
            ConnectionState::Closing => "Closing",
        };
        f.write_str(name)
    }
}

/// Why the scheduler loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The outstanding command's timer fired
    Timeout,
    /// A line satisfied the outstanding command
    ResponseReceived,
}

/// Decide the next state after `last` completed with `outcome`.
///
/// Only commands that required a response can move the state. Returns
/// `None` when the state stays put.
pub fn next_state(
    current: ConnectionState,
    outcome: Outcome,
    last: &Command,
    init_pending: bool,
) -> Option<ConnectionState> {
    use ConnectionState::*;

    if !last.response_required {
        return None;
    }
    match (current, outcome, last.kind) {
        (Offline, Outcome::ResponseReceived, CommandKind::Poll) => {
            Some(if init_pending { Initializing } else { Online })
        }
        (Initializing, Outcome::ResponseReceived, CommandKind::GetData) => Some(Online),
        (Initializing, Outcome::Timeout, CommandKind::GetData) => Some(Offline),
        (Online, Outcome::Timeout, _) => Some(Offline),
        _ => None,
    }
}
