//! Message types for actor-based communication
//!
//! Every external operation on the meter is sent to the `MeterActor` as a
//! `MeterCommand` carrying a oneshot reply channel, so callers never touch
//! driver state directly.

use crate::core::MeterSnapshot;
use crate::error::AppResult;
use tokio::sync::oneshot;

/// Commands that can be sent to the MeterActor
#[derive(Debug)]
pub enum MeterCommand {
    /// Open the transport
    Open {
        response: oneshot::Sender<AppResult<()>>,
    },

    /// Close the transport
    Close { response: oneshot::Sender<()> },

    /// Queue a named catalog command or raw command text
    Send {
        command: String,
        response: oneshot::Sender<()>,
    },

    /// Tag the next measurement with an identifier, or cancel with `None`
    RequestSample {
        sample_id: Option<String>,
        response: oneshot::Sender<()>,
    },

    /// Copy the current driver state
    Snapshot {
        response: oneshot::Sender<MeterSnapshot>,
    },

    /// Close the transport and stop the actor
    Shutdown { response: oneshot::Sender<()> },
}

impl MeterCommand {
    /// Helper to create an Open command
    pub fn open() -> (Self, oneshot::Receiver<AppResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Open { response: tx }, rx)
    }

    /// Helper to create a Close command
    pub fn close() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Close { response: tx }, rx)
    }

    /// Helper to create a Send command
    pub fn send(command: String) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::Send {
                command,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create a RequestSample command
    pub fn request_sample(sample_id: Option<String>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::RequestSample {
                sample_id,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create a Snapshot command
    pub fn snapshot() -> (Self, oneshot::Receiver<MeterSnapshot>) {
        let (tx, rx) = oneshot::channel();
        (Self::Snapshot { response: tx }, rx)
    }

    /// Helper to create a Shutdown command
    pub fn shutdown() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }
}
