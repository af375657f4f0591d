//! Synchronous core of the Orion 5-Star Plus driver.
//!
//! `MeterDriver` owns the connection state, the command queue, the
//! outstanding command and the data model. It never touches the transport or
//! a timer itself: the owning actor feeds it lines and timer outcomes, writes
//! whatever [`MeterDriver::cycle`] selects and arms the next deadline from the
//! selected command's timeout. Keeping the core synchronous means every rule
//! can be exercised directly in unit tests.

use super::classifier::{classify, clean_line, Classification, LineKind};
use super::commands::{Command, CommandCatalog, CommandKind};
use super::menu::decode_config_dump;
use super::state::{next_state, ConnectionState, Outcome};
use crate::config::Settings;
use crate::core::{DeviceErrorRecord, MeterEvent, MeterPayload, MeterSnapshot};
use crate::error::MeterError;
use crate::measurement::{
    Calibration, CalibrationRecord, Measurement, MeterIdentity, MANUAL_SAMPLE, POLLED_SAMPLE,
};
use chrono::{Datelike, Local, Timelike, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// An externally requested sample waiting for its measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSample {
    id: String,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy)]
enum Probe {
    Ph,
    Conductivity,
}

/// Driver state and decision logic, owned by a single task.
pub struct MeterDriver {
    catalog: CommandCatalog,
    auto_shutoff: bool,
    sample_window: Duration,
    state: ConnectionState,
    init_pending: bool,
    queue: VecDeque<Command>,
    last_command: Command,
    measurement: Measurement,
    ph_calibration: Option<CalibrationRecord>,
    cond_calibration: Option<CalibrationRecord>,
    identity: MeterIdentity,
    last_error: Option<DeviceErrorRecord>,
    pending_sample: Option<PendingSample>,
    events: broadcast::Sender<MeterEvent>,
}

impl MeterDriver {
    /// Create a driver in the `Closed` state publishing to `events`.
    pub fn new(settings: &Settings, events: broadcast::Sender<MeterEvent>) -> Self {
        Self {
            catalog: CommandCatalog::new(settings),
            auto_shutoff: settings.auto_shutoff,
            sample_window: settings.sample_window(),
            state: ConnectionState::Closed,
            init_pending: true,
            queue: VecDeque::new(),
            last_command: Command::default(),
            measurement: Measurement::default(),
            ph_calibration: None,
            cond_calibration: None,
            identity: MeterIdentity::default(),
            last_error: None,
            pending_sample: None,
            events,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The command most recently selected by the scheduler.
    pub fn last_command(&self) -> &Command {
        &self.last_command
    }

    /// Number of queued commands.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Deadline of the outstanding sample request, if any.
    pub fn sample_deadline(&self) -> Option<Instant> {
        self.pending_sample.as_ref().map(|p| p.deadline)
    }

    /// Subscribe to driver events.
    pub fn subscribe(&self) -> broadcast::Receiver<MeterEvent> {
        self.events.subscribe()
    }

    // ---------------------------------------------------------------------
    // Scheduler
    // ---------------------------------------------------------------------

    /// Run one scheduler iteration.
    ///
    /// Applies the state transition for the command that just completed,
    /// then selects and records the next command. The caller transmits it
    /// (see [`MeterDriver::record_tx`]) and arms a single deadline for its
    /// timeout.
    pub fn cycle(&mut self, outcome: Outcome) -> Command {
        if let Some(next) = next_state(self.state, outcome, &self.last_command, self.init_pending) {
            self.set_state(next);
            if next == ConnectionState::Initializing {
                self.enqueue_init_sequence();
            }
        }

        let last = &self.last_command;
        let command = if last.response_required && !last.pause_after_response.is_zero() {
            Command::pause(last.pause_after_response)
        } else {
            self.queue.pop_front().unwrap_or_default()
        };
        self.last_command = command.clone();
        command
    }

    /// Publish a command that has been written to the transport.
    pub fn record_tx(&self, command: &Command) {
        let text = command.display_text();
        debug!(command = command.name(), tx = %text, "Sent command");
        self.emit(MeterPayload::Tx(text));
    }

    /// Append a copy of a command to the queue.
    pub fn enqueue(&mut self, command: Command) {
        self.queue.push_back(command);
    }

    fn enqueue_kind(&mut self, kind: CommandKind) {
        let command = self.catalog.get(kind);
        self.enqueue(command);
    }

    fn enqueue_with(&mut self, kind: CommandKind, arg: &str) {
        let command = self.catalog.get(kind).substitute(&[arg]);
        self.enqueue(command);
    }

    /// Queue a named catalog command, or raw text if the name is unknown.
    pub fn send(&mut self, name_or_raw: &str) {
        let command = self.catalog.resolve(name_or_raw);
        debug!(command = command.name(), "Queued external command");
        self.enqueue(command);
    }

    fn enqueue_init_sequence(&mut self) {
        use CommandKind::*;

        self.init_pending = false;
        let now = Local::now();
        info!("Initializing meter");

        self.enqueue_kind(SetDataDisplay);
        self.enqueue_kind(if self.auto_shutoff {
            SetAutoShutoff
        } else {
            SetNoAutoShutoff
        });
        self.enqueue_with(SetHours, &now.hour().to_string());
        self.enqueue_with(SetMinutes, &now.minute().to_string());
        self.enqueue_with(SetYear, &(now.year() % 100).to_string());
        self.enqueue_with(SetMonth, &now.month().to_string());
        self.enqueue_with(SetDay, &now.day().to_string());
        for kind in [
            SetDateFormat,
            Set232Format,
            GetConfig,
            GetMethod,
            GetPHCal,
            GetCondCal,
            Blip,
            // promotes to Online when answered
            GetData,
        ] {
            self.enqueue_kind(kind);
        }
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.queue.clear();
        self.last_command = Command::default();
        self.state = state;
        info!(state = %state, "Meter state changed");
        self.emit(MeterPayload::State(state));
    }

    /// The transport opened.
    pub fn opened(&mut self) {
        self.set_state(ConnectionState::Offline);
    }

    /// The transport is being closed on request.
    pub fn closing(&mut self) {
        self.set_state(ConnectionState::Closing);
    }

    /// The transport is closed.
    pub fn closed(&mut self) {
        self.set_state(ConnectionState::Closed);
    }

    /// The transport failed to open, write or stay up.
    pub fn transport_failed(&mut self, err: &MeterError) {
        error!(error = %err, "Transport failure");
        self.emit(MeterPayload::Error(format!("Port Error: {}", err)));
        self.set_state(ConnectionState::Closed);
    }

    /// Report a failure that does not affect the connection state.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.emit(MeterPayload::Error(message));
    }

    // ---------------------------------------------------------------------
    // Polls and sample requests
    // ---------------------------------------------------------------------

    /// Measurement poll tick: request data while online.
    pub fn measurement_poll(&mut self) {
        if self.state == ConnectionState::Online {
            self.enqueue_kind(CommandKind::GetData);
        }
    }

    /// Alive poll tick: reset the front panel and probe the link while offline.
    pub fn alive_poll(&mut self) {
        if self.state == ConnectionState::Offline {
            // the meter starts dropping characters after a few hours without a reset
            self.enqueue_kind(CommandKind::Reset);
            self.enqueue_kind(CommandKind::Poll);
        }
    }

    /// Tag the next measurement with `id`. Any earlier request is cancelled;
    /// `None` only cancels.
    pub fn request_sample(&mut self, id: Option<String>) {
        if let Some(previous) = self.pending_sample.take() {
            debug!(sample_id = %previous.id, "Cancelled pending sample request");
        }
        if let Some(id) = id {
            debug!(sample_id = %id, window = ?self.sample_window, "Sample requested");
            self.pending_sample = Some(PendingSample {
                id,
                deadline: Instant::now() + self.sample_window,
            });
        }
    }

    /// The sample request deadline passed without a measurement.
    pub fn expire_sample(&mut self) {
        if let Some(pending) = self.pending_sample.take() {
            self.report_error(format!("Sample Request Timeout: {}", pending.id));
        }
    }

    // ---------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------

    /// Handle one raw line from the transport. Returns whether it satisfied
    /// the outstanding command, in which case the caller runs
    /// [`MeterDriver::cycle`] with [`Outcome::ResponseReceived`] at once.
    pub fn handle_line(&mut self, raw: &str) -> bool {
        let Some(line) = clean_line(raw) else {
            return false;
        };
        debug!(rx = %line, "Received line");
        self.emit(MeterPayload::Rx(line.clone()));

        let outstanding = self.last_command.kind;
        let Classification { kind, satisfies } = classify(&line, outstanding);
        match kind {
            LineKind::PowerOn => {
                info!("Meter power-on banner received");
                self.init_pending = true;
            }
            LineKind::DeviceError(code) => {
                self.last_error = Some(DeviceErrorRecord {
                    error: code.clone(),
                    last_command: outstanding,
                    utc: Utc::now(),
                });
                self.report_error(format!("Device error {} after {}", code, outstanding));
            }
            LineKind::Method(method) => {
                if self.identity.set_method(&method) {
                    self.emit_configuration();
                }
            }
            LineKind::Identity(fields) | LineKind::OrpCheck(fields) => {
                self.apply_device_id(&fields);
            }
            LineKind::PhCalibration(fields) => self.update_calibration(Probe::Ph, &fields),
            LineKind::CondCalibration(fields) => {
                self.update_calibration(Probe::Conductivity, &fields)
            }
            LineKind::Measurement(fields) => self.update_measurement(&fields, outstanding),
            LineKind::ConfigDump(fields) => {
                if self.identity.apply_configuration(decode_config_dump(&fields)) {
                    self.emit_configuration();
                }
            }
            LineKind::Unrecognized(fields) => {
                warn!(fields = fields.len(), line = %line, "Unrecognized line");
            }
        }
        satisfies
    }

    fn apply_device_id(&mut self, fields: &[String]) {
        if self.identity.apply_device_id(fields) {
            info!(
                serial = %self.identity.serial_number,
                firmware = %self.identity.firmware_rev,
                "Meter identity updated"
            );
            self.emit_configuration();
        }
    }

    fn update_calibration(&mut self, probe: Probe, fields: &[String]) {
        let parsed = match probe {
            Probe::Ph => CalibrationRecord::ph_from_fields(fields),
            Probe::Conductivity => CalibrationRecord::conductivity_from_fields(fields),
        };
        match parsed {
            Ok(record) => {
                let slot = match probe {
                    Probe::Ph => &mut self.ph_calibration,
                    Probe::Conductivity => &mut self.cond_calibration,
                };
                if slot.as_ref() != Some(&record) {
                    *slot = Some(record.clone());
                    let calibration = match probe {
                        Probe::Ph => Calibration::Ph(record),
                        Probe::Conductivity => Calibration::Conductivity(record),
                    };
                    self.emit(MeterPayload::Calibration(calibration));
                }
            }
            Err(e) => self.report_error(format!("Failed to parse {:?} calibration: {}", probe, e)),
        }
        self.apply_device_id(fields);
    }

    fn update_measurement(&mut self, fields: &[String], outstanding: CommandKind) {
        let sample_id = match self.pending_sample.take() {
            Some(pending) => pending.id,
            None if outstanding != CommandKind::GetData => MANUAL_SAMPLE.to_string(),
            None => POLLED_SAMPLE.to_string(),
        };

        match Measurement::from_fields(fields, sample_id.as_str(), Utc::now()) {
            Ok(measurement) => {
                let values = &measurement.values;
                let ph_stale = self.ph_calibration.as_ref().map(|c| c.calibration_index)
                    != Some(values.ph_calibration_index);
                let cond_stale = self.cond_calibration.as_ref().map(|c| c.calibration_index)
                    != Some(values.cond_calibration_index);
                if ph_stale {
                    self.enqueue_kind(CommandKind::GetPHCal);
                }
                if cond_stale {
                    self.enqueue_kind(CommandKind::GetCondCal);
                }
                debug!(sample_id = %sample_id, "Measurement received");
                self.measurement = measurement.clone();
                self.emit(MeterPayload::Result(measurement));
            }
            Err(e) => self.report_error(format!(
                "Failed to parse measurement for sample {}: {}",
                sample_id, e
            )),
        }
        self.apply_device_id(fields);

        if sample_id != POLLED_SAMPLE {
            self.enqueue_kind(CommandKind::Flash);
        }
    }

    // ---------------------------------------------------------------------
    // Output
    // ---------------------------------------------------------------------

    fn emit(&self, payload: MeterPayload) {
        // no subscribers is not an error
        let _ = self.events.send(MeterEvent::now(payload));
    }

    fn emit_configuration(&self) {
        self.emit(MeterPayload::Configuration(self.identity.clone()));
    }

    /// Copy of everything the driver currently knows.
    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            state: self.state,
            init_pending: self.init_pending,
            measurement: self.measurement.clone(),
            ph_calibration: self.ph_calibration.clone().map(Calibration::Ph),
            cond_calibration: self.cond_calibration.clone().map(Calibration::Conductivity),
            identity: self.identity.clone(),
            last_error: self.last_error.clone(),
            pending_sample: self.pending_sample.as_ref().map(|p| p.id.clone()),
        }
    }
}
