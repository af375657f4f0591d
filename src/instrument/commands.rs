//! Command catalog for the Orion 5-Star Plus.
//!
//! Every command is a plain value: the catalog hands out copies and
//! placeholder substitution returns a new [`Command`], so queued commands never
//! share template state.

use crate::config::{DateFormat, Settings};
use crate::error::MeterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Line terminator the meter expects after every command.
pub const TERMINATOR: char = '\r';

/// First positional placeholder in a command template.
pub const PLACEHOLDER_1: &str = "REPLACE1";
/// Second positional placeholder in a command template.
pub const PLACEHOLDER_2: &str = "REPLACE2";

/// Named commands understood by the driver.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// No-op that only holds the scheduler for its timeout
    Pause,
    /// Heartbeat probe (`GETCAL ORP`)
    Poll,
    /// Data request (`GETMEAS`)
    GetData,
    GetMethod,
    GetPHCal,
    GetCondCal,
    GetConfig,
    SetEchoOff,
    /// Long display flash, used to acknowledge a requested sample
    Flash,
    /// Short display blip
    Blip,
    /// Front panel reset key
    Reset,
    SetDataDisplay,
    SetNoAutoShutoff,
    SetAutoShutoff,
    SetHours,
    SetMinutes,
    SetYear,
    SetMonth,
    SetDay,
    SetDateFormat,
    Set232Format,
    /// Caller-supplied raw text
    Custom,
}

impl CommandKind {
    /// Every catalog entry, in declaration order.
    pub const ALL: [CommandKind; 22] = [
        CommandKind::Pause,
        CommandKind::Poll,
        CommandKind::GetData,
        CommandKind::GetMethod,
        CommandKind::GetPHCal,
        CommandKind::GetCondCal,
        CommandKind::GetConfig,
        CommandKind::SetEchoOff,
        CommandKind::Flash,
        CommandKind::Blip,
        CommandKind::Reset,
        CommandKind::SetDataDisplay,
        CommandKind::SetNoAutoShutoff,
        CommandKind::SetAutoShutoff,
        CommandKind::SetHours,
        CommandKind::SetMinutes,
        CommandKind::SetYear,
        CommandKind::SetMonth,
        CommandKind::SetDay,
        CommandKind::SetDateFormat,
        CommandKind::Set232Format,
        CommandKind::Custom,
    ];

    /// Catalog name of the command.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Pause => "Pause",
            CommandKind::Poll => "Poll",
            CommandKind::GetData => "GetData",
            CommandKind::GetMethod => "GetMethod",
            CommandKind::GetPHCal => "GetPHCal",
            CommandKind::GetCondCal => "GetCondCal",
            CommandKind::GetConfig => "GetConfig",
            CommandKind::SetEchoOff => "SetEchoOff",
            CommandKind::Flash => "Flash",
            CommandKind::Blip => "Blip",
            CommandKind::Reset => "Reset",
            CommandKind::SetDataDisplay => "SetDataDisplay",
            CommandKind::SetNoAutoShutoff => "SetNoAutoShutoff",
            CommandKind::SetAutoShutoff => "SetAutoShutoff",
            CommandKind::SetHours => "SetHours",
            CommandKind::SetMinutes => "SetMinutes",
            CommandKind::SetYear => "SetYear",
            CommandKind::SetMonth => "SetMonth",
            CommandKind::SetDay => "SetDay",
            CommandKind::SetDateFormat => "SetDateFormat",
            CommandKind::Set232Format => "Set232Format",
            CommandKind::Custom => "Custom",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .iter()
            .copied()
            .find(|kind| *kind != CommandKind::Custom && kind.name() == s)
            .ok_or_else(|| MeterError::UnknownCommand(s.to_string()))
    }
}

/// A command ready to be queued or transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// Which catalog entry this command came from
    pub kind: CommandKind,
    /// Wire text including the trailing terminator (empty for pauses)
    pub text: String,
    /// How long the scheduler waits before moving on
    pub timeout: Duration,
    /// Whether the state machine expects a reply to this command
    pub response_required: bool,
    /// Mandatory quiet time after a reply arrives
    pub pause_after_response: Duration,
}

impl Command {
    fn fire_and_forget(kind: CommandKind, text: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            kind,
            text: text.into(),
            timeout: Duration::from_millis(timeout_ms),
            response_required: false,
            pause_after_response: Duration::ZERO,
        }
    }

    fn query(kind: CommandKind, text: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kind,
            text: text.into(),
            timeout,
            response_required: true,
            pause_after_response: Duration::from_millis(500),
        }
    }

    /// A pause of the given length. Pauses transmit nothing.
    pub fn pause(timeout: Duration) -> Self {
        Self {
            kind: CommandKind::Pause,
            text: String::new(),
            timeout,
            response_required: false,
            pause_after_response: Duration::ZERO,
        }
    }

    /// Wrap caller-supplied text as a command. A missing terminator is appended.
    pub fn custom(text: &str) -> Self {
        let mut text = text.to_string();
        if !text.ends_with(TERMINATOR) {
            text.push(TERMINATOR);
        }
        Self::fire_and_forget(CommandKind::Custom, text, 1000)
    }

    /// Return a copy with `REPLACE1`/`REPLACE2` replaced by positional
    /// arguments. Missing arguments substitute the empty string.
    pub fn substitute(&self, args: &[&str]) -> Self {
        let first = args.first().copied().unwrap_or_default();
        let second = args.get(1).copied().unwrap_or_default();
        Self {
            text: self
                .text
                .replacen(PLACEHOLDER_1, first, 1)
                .replacen(PLACEHOLDER_2, second, 1),
            ..self.clone()
        }
    }

    /// Name of the catalog entry.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Text without line terminators, as published in tx events.
    pub fn display_text(&self) -> String {
        self.text.replace(['\r', '\n'], "")
    }

    /// Whether anything is written to the wire for this command.
    pub fn transmits(&self) -> bool {
        !self.text.is_empty()
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::pause(Duration::from_millis(500))
    }
}

/// Immutable command table, specialised by the driver settings.
#[derive(Debug, Clone)]
pub struct CommandCatalog {
    sample_request_timeout: Duration,
    date_format: DateFormat,
}

impl CommandCatalog {
    /// Build the catalog for the given settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            sample_request_timeout: settings.sample_request_timeout(),
            date_format: settings.date_format,
        }
    }

    /// Copy of the catalog entry for `kind`.
    pub fn get(&self, kind: CommandKind) -> Command {
        use CommandKind::*;
        let three_s = Duration::from_millis(3000);
        match kind {
            Pause => Command::default(),
            Poll => Command::query(Poll, "GETCAL ORP\r", Duration::from_millis(2000)),
            GetData => Command::query(GetData, "GETMEAS\r", self.sample_request_timeout),
            GetMethod => Command::query(GetMethod, "GETMEAS\r", three_s),
            GetPHCal => Command::query(GetPHCal, "GETCAL PH\r", three_s),
            GetCondCal => Command::query(GetCondCal, "GETCAL COND\r", three_s),
            GetConfig => Command::query(GetConfig, "GETMENU 0000,6,62\r", three_s),
            SetEchoOff => Command::fire_and_forget(SetEchoOff, "ECHO OFF\r", 500),
            Flash => Command::fire_and_forget(Flash, "KEY WWWWWWWWWWWW\r", 1000),
            Blip => Command::fire_and_forget(Blip, "KEY WW\r", 1000),
            Reset => Command::fire_and_forget(Reset, "KEY X\r", 500),
            SetDataDisplay => {
                Command::fire_and_forget(SetDataDisplay, "SETMENU 0000,MENU_MEAS,1,1,0\r", 2000)
            }
            SetNoAutoShutoff => Command::fire_and_forget(SetNoAutoShutoff, "SETMENU 0000,45,0\r", 2000),
            SetAutoShutoff => Command::fire_and_forget(SetAutoShutoff, "SETMENU 0000,45,1\r", 2000),
            SetHours => Command::fire_and_forget(SetHours, "SETMENU 0000,48,REPLACE1\r", 2000),
            SetMinutes => Command::fire_and_forget(SetMinutes, "SETMENU 0000,49,REPLACE1\r", 2000),
            SetYear => Command::fire_and_forget(SetYear, "SETMENU 0000,51,REPLACE1\r", 2000),
            SetMonth => Command::fire_and_forget(SetMonth, "SETMENU 0000,52,REPLACE1\r", 2000),
            SetDay => Command::fire_and_forget(SetDay, "SETMENU 0000,53,REPLACE1\r", 2000),
            SetDateFormat => Command::fire_and_forget(
                SetDateFormat,
                format!("SETMENU 0000,50,{}\r", self.date_format.menu_code()),
                2000,
            ),
            Set232Format => Command::fire_and_forget(Set232Format, "SETMENU 0000,55,1\r", 4000),
            Custom => Command::custom(""),
        }
    }

    /// Resolve a catalog name, or treat anything else as raw command text.
    pub fn resolve(&self, name_or_raw: &str) -> Command {
        match name_or_raw.parse::<CommandKind>() {
            Ok(kind) => self.get(kind),
            Err(_) => Command::custom(name_or_raw),
        }
    }
}
