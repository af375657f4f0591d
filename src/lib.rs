//! Driver for the Thermo Scientific Orion 5-Star Plus pH/ORP/conductivity meter.
//!
//! The meter speaks an unframed CSV dialect over RS-232. This crate keeps the
//! link alive, schedules one command at a time, classifies replies by shape
//! and publishes typed [`MeterEvent`]s on a broadcast channel.
//!
//! ```no_run
//! use orion_meter::{adapters::SerialAdapter, MeterHandle, Settings};
//!
//! # async fn run() -> orion_meter::error::AppResult<()> {
//! let settings = Settings::load()?;
//! let (meter, _task) = MeterHandle::spawn(&settings, SerialAdapter::from_settings(&settings));
//! let mut events = meter.subscribe();
//! meter.open().await?;
//! meter.request_sample(Some("Batch42".into())).await?;
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod app_actor;
pub mod config;
pub mod core;
pub mod error;
pub mod instrument;
pub mod measurement;
pub mod messages;

pub use app_actor::{MeterActor, MeterHandle};
pub use config::Settings;
pub use core::{MeterEvent, MeterPayload, MeterSnapshot};
pub use error::{AppResult, MeterError};
pub use instrument::{CommandKind, ConnectionState};
