//! Orion 5-Star Plus protocol: command catalog, line classification,
//! connection state machine, menu decoding and the driver core that ties
//! them together.

pub mod classifier;
pub mod commands;
pub mod driver;
pub mod menu;
pub mod state;

pub use commands::{Command, CommandCatalog, CommandKind};
pub use driver::MeterDriver;
pub use state::{ConnectionState, Outcome};
