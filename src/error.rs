//! Custom error types for the meter driver.
//!
//! `MeterError` is the single error type returned across the public API. Built
//! with `thiserror`, it covers configuration loading, transport failures and
//! the parse failures that the driver reports as events rather than panicking on.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment` while loading settings.
//! - **`Configuration`**: Semantic problems found while validating settings.
//! - **`Io`** / **`Serial`**: Transport failures (open, write, link loss).
//! - **`NotConnected`**: A write was attempted while the link is closed.
//! - **`Parse`**: A line had the expected shape but a field could not be parsed.
//! - **`UnknownCommand`**: A named command is not part of the catalog.
//! - **`ActorStopped`**: The owning task has shut down and can no longer accept requests.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type AppResult<T> = std::result::Result<T, MeterError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Serial port not connected")]
    NotConnected,

    #[error("Failed to parse field {index} ('{raw}'): {reason}")]
    Parse {
        index: usize,
        raw: String,
        reason: String,
    },

    #[error("Line has {actual} fields, expected {expected}")]
    FieldCount { expected: usize, actual: usize },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Meter actor is no longer running")]
    ActorStopped,

    #[error("Serial support not enabled. Rebuild with --features tokio_serial")]
    SerialFeatureDisabled,
}

impl From<figment::Error> for MeterError {
    fn from(err: figment::Error) -> Self {
        MeterError::Config(Box::new(err))
    }
}
