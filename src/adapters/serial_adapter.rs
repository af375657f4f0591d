//! RS-232 transport via tokio-serial.

use super::{Connector, MeterIo};
use crate::config::Settings;
use crate::error::{AppResult, MeterError};
use async_trait::async_trait;
use tracing::debug;

#[cfg(feature = "tokio_serial")]
use tokio_serial::SerialPortBuilderExt;

/// RS-232 connector for the meter.
///
/// Opens the port with tokio-serial at 8 data bits, 1 stop bit, no parity
/// and no flow control, which is what the 5-Star Plus speaks.
#[derive(Debug, Clone)]
pub struct SerialAdapter {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,

    /// Baud rate; the meter ships at 9600
    baud_rate: u32,
}

impl SerialAdapter {
    /// Create a serial connector.
    ///
    /// # Arguments
    /// * `port_name` - Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    /// * `baud_rate` - Communication speed
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
        }
    }

    /// Create a serial connector from the driver settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.port.clone(), settings.baud_rate)
    }
}

#[async_trait]
impl Connector for SerialAdapter {
    fn name(&self) -> &str {
        "serial"
    }

    async fn connect(&self) -> AppResult<Box<dyn MeterIo>> {
        #[cfg(feature = "tokio_serial")]
        {
            let port = tokio_serial::new(self.port_name.as_str(), self.baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .stop_bits(tokio_serial::StopBits::One)
                .parity(tokio_serial::Parity::None)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()
                .map_err(|e| {
                    MeterError::Serial(format!(
                        "Failed to open serial port '{}' at {} baud: {}",
                        self.port_name, self.baud_rate, e
                    ))
                })?;

            debug!(
                "Serial port '{}' opened at {} baud",
                self.port_name, self.baud_rate
            );
            Ok(Box::new(port))
        }

        #[cfg(not(feature = "tokio_serial"))]
        {
            debug!("Serial port '{}' requested without serial support", self.port_name);
            Err(MeterError::SerialFeatureDisabled)
        }
    }
}
