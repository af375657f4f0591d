//! Transport adapters
//!
//! A [`Connector`] opens a byte stream to the meter. The actor splits the
//! stream: writes go straight through the write half, and a reader task
//! turns the read half into `\r`-delimited [`LinkEvent`]s on a channel so
//! that line arrival is just another branch of the actor's `select!`.

pub mod mock;
pub mod serial_adapter;

pub use mock::{MockAdapter, MockDevice};
pub use serial_adapter::SerialAdapter;

use crate::error::AppResult;
use crate::instrument::commands::TERMINATOR;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Byte stream to the meter.
pub trait MeterIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> MeterIo for T {}

/// Opens the transport to a meter.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Short name for logs (e.g. "serial", "mock").
    fn name(&self) -> &str;

    /// Open a fresh stream. Called on every `open`.
    async fn connect(&self) -> AppResult<Box<dyn MeterIo>>;
}

/// What the reader task observed on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One raw line, terminator included
    Line(String),
    /// The stream ended; carries the I/O error if there was one
    Closed(Option<String>),
}

/// Spawn a task that splits `reader` into lines on `\r`.
///
/// The task ends after sending [`LinkEvent::Closed`] or when the receiver
/// is dropped.
pub fn spawn_line_reader<R>(reader: R, lines: mpsc::Sender<LinkEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let event = match reader.read_until(TERMINATOR as u8, &mut buf).await {
                Ok(0) => LinkEvent::Closed(None),
                Ok(_) => LinkEvent::Line(String::from_utf8_lossy(&buf).into_owned()),
                Err(e) => LinkEvent::Closed(Some(e.to_string())),
            };
            let done = matches!(event, LinkEvent::Closed(_));
            if lines.send(event).await.is_err() || done {
                break;
            }
        }
        debug!("Line reader stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(reader: impl AsyncRead + Unpin + Send + 'static) -> Vec<LinkEvent> {
        let (tx, mut rx) = mpsc::channel(16);
        let task = spawn_line_reader(reader, tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        task.await.unwrap();
        events
    }

    #[tokio::test]
    async fn test_lines_split_on_carriage_return() {
        let io = tokio_test::io::Builder::new()
            .read(b"> GETMEAS\r\nE-3A")
            .read(b"01\r")
            .build();

        let events = collect(io).await;
        assert_eq!(
            events,
            vec![
                LinkEvent::Line("> GETMEAS\r".into()),
                LinkEvent::Line("\nE-3A01\r".into()),
                LinkEvent::Closed(None),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_error_closes_link() {
        let io = tokio_test::io::Builder::new()
            .read(b"119,B15164,2.39,8\r")
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"))
            .build();

        let events = collect(io).await;
        assert_eq!(events[0], LinkEvent::Line("119,B15164,2.39,8\r".into()));
        assert!(matches!(&events[1], LinkEvent::Closed(Some(msg)) if msg.contains("unplugged")));
    }
}
