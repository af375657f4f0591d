//! In-memory connector for tests and demos.
//!
//! Every `connect` creates a fresh `tokio::io::duplex` pair: the driver gets
//! one end, and the other end is handed out as a [`MockDevice`] that plays
//! the meter.

use super::{Connector, MeterIo};
use crate::error::{AppResult, MeterError};
use crate::instrument::commands::TERMINATOR;
use async_trait::async_trait;
use std::io;
use tokio::io::{
    duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::sync::mpsc;

const BUFFER_SIZE: usize = 4096;

/// Connector backed by in-memory pipes.
pub struct MockAdapter {
    devices: mpsc::UnboundedSender<MockDevice>,
    refuse: bool,
}

impl MockAdapter {
    /// Create a connector and the receiver that yields one [`MockDevice`]
    /// per successful `connect`.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockDevice>) {
        let (devices, rx) = mpsc::unbounded_channel();
        (
            Self {
                devices,
                refuse: false,
            },
            rx,
        )
    }

    /// A connector whose `connect` always fails, as an unplugged adapter would.
    pub fn refusing() -> Self {
        let (mut adapter, _rx) = Self::new();
        adapter.refuse = true;
        adapter
    }
}

#[async_trait]
impl Connector for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> AppResult<Box<dyn MeterIo>> {
        if self.refuse {
            return Err(MeterError::Serial("mock port refused to open".into()));
        }
        let (host, device) = duplex(BUFFER_SIZE);
        self.devices
            .send(MockDevice::new(device))
            .map_err(|_| MeterError::Serial("mock device receiver dropped".into()))?;
        Ok(Box::new(host))
    }
}

/// The meter's end of a mock link.
pub struct MockDevice {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl MockDevice {
    fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = split(stream);
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Wait for the next command from the driver, terminator removed.
    /// Fails with `UnexpectedEof` once the driver closes the link.
    pub async fn next_command(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(TERMINATOR as u8, &mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "link closed"));
        }
        let text = String::from_utf8_lossy(&buf);
        Ok(text.trim_end_matches(TERMINATOR).to_string())
    }

    /// Send one line to the driver, appending the terminator.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(&[TERMINATOR as u8]).await?;
        self.writer.flush().await
    }
}
