//! Event types published by the driver.
//!
//! Every change leaves the driver as a [`MeterEvent`] on a Tokio `broadcast`
//! channel, so any number of consumers (a telemetry bridge, a logger, tests)
//! can subscribe independently.
//!
//! # Data Flow
//!
//! ```text
//! MeterActor --[MeterEvent]--> broadcast::channel ---> bridge / CLI / tests
//! ```

use crate::instrument::commands::CommandKind;
use crate::instrument::state::ConnectionState;
use crate::measurement::{Calibration, Measurement, MeterIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped event from the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterEvent {
    /// When the event was raised
    pub utc: DateTime<Utc>,
    /// What happened
    #[serde(flatten)]
    pub payload: MeterPayload,
}

impl MeterEvent {
    /// Stamp a payload with the current time.
    pub fn now(payload: MeterPayload) -> Self {
        Self {
            utc: Utc::now(),
            payload,
        }
    }
}

/// Typed payload of a [`MeterEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "lowercase")]
pub enum MeterPayload {
    /// Transport failure, device error, parse failure or sample timeout
    Error(String),
    /// Connection state changed
    State(ConnectionState),
    /// Text written to the meter, terminator removed
    Tx(String),
    /// Cleaned line received from the meter
    Rx(String),
    /// A new measurement; raised for every measurement line
    Result(Measurement),
    /// Identity or configuration changed
    Configuration(MeterIdentity),
    /// A calibration record changed
    Calibration(Calibration),
}

/// A device error token and the command that provoked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceErrorRecord {
    /// Token as printed, e.g. `E-3AB1`
    pub error: String,
    /// Command outstanding when the token arrived
    pub last_command: CommandKind,
    /// When the token arrived
    pub utc: DateTime<Utc>,
}

/// Point-in-time copy of everything the driver knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    /// Current connection state
    pub state: ConnectionState,
    /// Whether the next heartbeat reply will re-run initialization
    pub init_pending: bool,
    /// Last measurement (status `Offline` until one arrives)
    pub measurement: Measurement,
    /// Last pH calibration, if any has been read
    pub ph_calibration: Option<Calibration>,
    /// Last conductivity calibration, if any has been read
    pub cond_calibration: Option<Calibration>,
    /// Identity and decoded configuration
    pub identity: MeterIdentity,
    /// Last device error token
    pub last_error: Option<DeviceErrorRecord>,
    /// Identifier of an outstanding sample request
    pub pending_sample: Option<String>,
}
