//! Driver configuration using Figment
//!
//! Settings are layered in this order of precedence (highest to lowest):
//! 1. Environment variables prefixed with `ORION_`
//! 2. An optional TOML file
//! 3. Built-in defaults
//!
//! ```text
//! ORION_PORT=/dev/ttyUSB1
//! ORION_DATE_FORMAT=DMY
//! ORION_MEAS_POLL_MS=15000
//! ```
//!
//! # Example
//!
//! ```no_run
//! use orion_meter::config::Settings;
//!
//! let settings = Settings::load_from("config/orion.toml")?;
//! println!("Polling {} every {} ms", settings.port, settings.meas_poll_ms);
//! # Ok::<(), orion_meter::error::MeterError>(())
//! ```

use crate::error::{AppResult, MeterError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "ORION_";

/// Date ordering the meter uses on its display and in timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DateFormat {
    /// Month-day-year
    Mdy,
    /// Day-month-year
    Dmy,
}

impl DateFormat {
    /// Value written to menu 50 to select this format.
    pub fn menu_code(self) -> &'static str {
        match self {
            DateFormat::Mdy => "0",
            DateFormat::Dmy => "1",
        }
    }
}

/// Top-level driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Serial port path (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate; the meter ships at 9600
    pub baud_rate: u32,
    /// Date format pushed to the meter during initialization
    pub date_format: DateFormat,
    /// Let the meter power itself down. The serial stream degrades after
    /// roughly two days of uptime, so this defaults to on.
    pub auto_shutoff: bool,
    /// Timeout for a data request (`GETMEAS`)
    pub sample_request_ms: u64,
    /// Measurement poll period while online
    pub meas_poll_ms: u64,
    /// Link probe period while offline
    pub alive_poll_ms: u64,
    /// Added to `meas_poll_ms` to form the sample correlation window
    pub sample_window_extra_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_channel_capacity: usize,
    /// Capacity of the actor command channel
    pub command_channel_capacity: usize,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON instead of human-readable text
    pub json_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            date_format: DateFormat::Mdy,
            auto_shutoff: true,
            sample_request_ms: 5000,
            meas_poll_ms: 10_000,
            alive_poll_ms: 5000,
            sample_window_extra_ms: 3000,
            event_channel_capacity: 1024,
            command_channel_capacity: 32,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Settings {
    /// Load settings from defaults and `ORION_` environment variables only.
    pub fn load() -> AppResult<Self> {
        Self::from_figment(Self::base_figment())
    }

    /// Load settings from a TOML file layered over the defaults, with
    /// environment variables taking precedence. A missing file is not an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Settings::default()))
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    fn from_figment(figment: Figment) -> AppResult<Self> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings after loading.
    ///
    /// Checks that the log level is known, the port is named and that every
    /// period and capacity is non-zero.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(MeterError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.port.trim().is_empty() {
            return Err(MeterError::Configuration("port must not be empty".into()));
        }

        let periods = [
            ("sample_request_ms", self.sample_request_ms),
            ("meas_poll_ms", self.meas_poll_ms),
            ("alive_poll_ms", self.alive_poll_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(MeterError::Configuration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        if self.event_channel_capacity == 0 || self.command_channel_capacity == 0 {
            return Err(MeterError::Configuration(
                "channel capacities must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Timeout applied to data requests.
    pub fn sample_request_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_request_ms)
    }

    /// Period of the measurement poll.
    pub fn meas_poll_period(&self) -> Duration {
        Duration::from_millis(self.meas_poll_ms)
    }

    /// Period of the alive poll.
    pub fn alive_poll_period(&self) -> Duration {
        Duration::from_millis(self.alive_poll_ms)
    }

    /// How long an externally requested sample may wait for a measurement.
    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(self.meas_poll_ms + self.sample_window_extra_ms)
    }
}
