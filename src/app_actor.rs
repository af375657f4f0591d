//! Actor that owns the meter driver.
//!
//! `MeterActor` is the only place driver state is mutated. One task
//! `select!`s over:
//!
//! - `MeterCommand`s from any number of [`MeterHandle`]s
//! - lines from the transport reader task
//! - the scheduler deadline of the outstanding command
//! - the measurement and alive poll intervals
//! - the deadline of a pending sample request
//!
//! Each deadline is a single stored `Instant`; re-arming overwrites it, so a
//! stale timer can never fire.

use crate::adapters::{spawn_line_reader, Connector, LinkEvent, MeterIo};
use crate::config::Settings;
use crate::core::{MeterEvent, MeterSnapshot};
use crate::error::{AppResult, MeterError};
use crate::instrument::commands::Command;
use crate::instrument::driver::MeterDriver;
use crate::instrument::state::Outcome;
use crate::messages::MeterCommand;
use std::future::pending;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const LINE_CHANNEL_CAPACITY: usize = 64;

/// An open transport: the write half plus the reader task feeding `lines`.
struct Link {
    writer: WriteHalf<Box<dyn MeterIo>>,
    lines: mpsc::Receiver<LinkEvent>,
    reader: JoinHandle<()>,
}

impl Link {
    fn open(io: Box<dyn MeterIo>) -> Self {
        let (reader, writer) = tokio::io::split(io);
        let (tx, lines) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        Self {
            writer,
            lines,
            reader: spawn_line_reader(reader, tx),
        }
    }

    async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Error shutting down link writer: {}", e);
        }
        self.reader.abort();
    }
}

/// Owns the driver and the transport; see the module docs.
pub struct MeterActor<C: Connector> {
    driver: MeterDriver,
    connector: C,
    link: Option<Link>,
    next_cycle: Instant,
    meas_poll: Interval,
    alive_poll: Interval,
}

impl<C: Connector> MeterActor<C> {
    /// Creates a new MeterActor. Must be called within a Tokio runtime.
    pub fn new(settings: &Settings, connector: C, events: broadcast::Sender<MeterEvent>) -> Self {
        let mut meas_poll = interval(settings.meas_poll_period());
        meas_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut alive_poll = interval(settings.alive_poll_period());
        alive_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            driver: MeterDriver::new(settings, events),
            connector,
            link: None,
            next_cycle: Instant::now(),
            meas_poll,
            alive_poll,
        }
    }

    /// Runs the actor event loop until shutdown or until every handle is dropped.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<MeterCommand>) {
        info!(connector = self.connector.name(), "MeterActor started");

        loop {
            let sample_deadline = self.driver.sample_deadline();
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(MeterCommand::Shutdown { response }) => {
                        info!("Shutdown command received");
                        self.close().await;
                        let _ = response.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All meter handles dropped");
                        self.close().await;
                        break;
                    }
                },
                event = next_link_event(&mut self.link) => self.handle_link_event(event).await,
                _ = sleep_until(self.next_cycle) => self.run_cycle(Outcome::Timeout).await,
                _ = self.meas_poll.tick() => self.driver.measurement_poll(),
                _ = self.alive_poll.tick() => self.driver.alive_poll(),
                _ = sleep_until_some(sample_deadline) => self.driver.expire_sample(),
            }
        }

        info!("MeterActor shutting down");
    }

    async fn handle_command(&mut self, command: MeterCommand) {
        match command {
            MeterCommand::Open { response } => {
                let result = self.open().await;
                let _ = response.send(result);
            }
            MeterCommand::Close { response } => {
                self.close().await;
                let _ = response.send(());
            }
            MeterCommand::Send { command, response } => {
                self.driver.send(&command);
                let _ = response.send(());
            }
            MeterCommand::RequestSample {
                sample_id,
                response,
            } => {
                self.driver.request_sample(sample_id);
                let _ = response.send(());
            }
            MeterCommand::Snapshot { response } => {
                let _ = response.send(self.driver.snapshot());
            }
            MeterCommand::Shutdown { response } => {
                // handled by the run loop
                let _ = response.send(());
            }
        }
    }

    async fn open(&mut self) -> AppResult<()> {
        if self.link.is_some() {
            debug!("Link already open");
            return Ok(());
        }
        match self.connector.connect().await {
            Ok(io) => {
                self.link = Some(Link::open(io));
                self.driver.opened();
                Ok(())
            }
            Err(e) => {
                self.driver.transport_failed(&e);
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        if let Some(link) = self.link.take() {
            self.driver.closing();
            link.close().await;
            self.driver.closed();
        }
    }

    async fn handle_link_event(&mut self, event: Option<LinkEvent>) {
        match event {
            Some(LinkEvent::Line(line)) => {
                if self.driver.handle_line(&line) {
                    self.run_cycle(Outcome::ResponseReceived).await;
                }
            }
            Some(LinkEvent::Closed(reason)) => {
                let reason = reason.unwrap_or_else(|| "link closed by peer".to_string());
                self.link_lost(MeterError::Serial(reason)).await;
            }
            None => self.link_lost(MeterError::Serial("line reader stopped".into())).await,
        }
    }

    async fn link_lost(&mut self, err: MeterError) {
        if let Some(link) = self.link.take() {
            link.reader.abort();
            self.driver.transport_failed(&err);
        }
    }

    /// Run the scheduler, transmit the selected command and re-arm the
    /// single scheduler deadline.
    async fn run_cycle(&mut self, outcome: Outcome) {
        let command = self.driver.cycle(outcome);
        self.next_cycle = Instant::now() + command.timeout;
        if command.transmits() {
            self.transmit(&command).await;
        }
    }

    async fn transmit(&mut self, command: &Command) {
        let Some(link) = self.link.as_mut() else {
            self.driver.report_error(format!(
                "{} not sent: {}",
                command.name(),
                MeterError::NotConnected
            ));
            return;
        };
        let written = async {
            link.writer.write_all(command.text.as_bytes()).await?;
            link.writer.flush().await
        }
        .await;
        match written {
            Ok(()) => self.driver.record_tx(command),
            Err(e) => {
                warn!(command = command.name(), "Write failed: {}", e);
                self.link_lost(MeterError::Io(e)).await;
            }
        }
    }
}

async fn next_link_event(link: &mut Option<Link>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.lines.recv().await,
        None => pending().await,
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

/// Cloneable handle to a running [`MeterActor`].
#[derive(Clone)]
pub struct MeterHandle {
    commands: mpsc::Sender<MeterCommand>,
    events: broadcast::Sender<MeterEvent>,
}

impl MeterHandle {
    /// Spawn a [`MeterActor`] for `connector` on the current runtime.
    pub fn spawn<C>(settings: &Settings, connector: C) -> (Self, JoinHandle<()>)
    where
        C: Connector + 'static,
    {
        let (events, _) = broadcast::channel(settings.event_channel_capacity);
        let (commands, command_rx) = mpsc::channel(settings.command_channel_capacity);
        let actor = MeterActor::new(settings, connector, events.clone());
        let task = tokio::spawn(actor.run(command_rx));
        (Self { commands, events }, task)
    }

    /// Subscribe to driver events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<MeterEvent> {
        self.events.subscribe()
    }

    /// Open the link to the meter. The driver moves to `Offline` and starts
    /// probing for the meter.
    pub async fn open(&self) -> AppResult<()> {
        self.request(MeterCommand::open()).await?
    }

    /// Close the link.
    pub async fn close(&self) -> AppResult<()> {
        self.request(MeterCommand::close()).await
    }

    /// Queue a catalog command by name (e.g. `"Blip"`) or raw command text.
    pub async fn send(&self, name_or_raw: impl Into<String>) -> AppResult<()> {
        self.request(MeterCommand::send(name_or_raw.into())).await
    }

    /// Tag the next measurement with `sample_id`. If none arrives within
    /// the correlation window an error event naming the identifier is
    /// published. `None` cancels an outstanding request.
    pub async fn request_sample(&self, sample_id: Option<String>) -> AppResult<()> {
        self.request(MeterCommand::request_sample(sample_id)).await
    }

    /// Copy of the driver's current state and records.
    pub async fn snapshot(&self) -> AppResult<MeterSnapshot> {
        self.request(MeterCommand::snapshot()).await
    }

    /// Close the link and stop the actor.
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(MeterCommand::shutdown()).await
    }

    async fn request<T>(
        &self,
        (command, response): (MeterCommand, tokio::sync::oneshot::Receiver<T>),
    ) -> AppResult<T> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MeterError::ActorStopped)?;
        response.await.map_err(|_| MeterError::ActorStopped)
    }
}
