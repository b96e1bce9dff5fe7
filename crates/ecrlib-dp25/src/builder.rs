//! Dp25Builder -- fluent builder for constructing [`Dp25`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters, the retry limit, and timeouts before the IO task
//! takes ownership of the transport.
//!
//! # Example
//!
//! ```no_run
//! use ecrlib_dp25::Dp25Builder;
//! use std::time::Duration;
//!
//! # async fn example() -> ecrlib_core::Result<()> {
//! let printer = Dp25Builder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(115_200)
//!     .response_timeout(Duration::from_secs(5))
//!     .build()
//!     .await?;
//! printer.test_communication().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use ecrlib_core::error::{Error, Result};
use ecrlib_core::transport::Transport;
use ecrlib_transport::serial::DEFAULT_BAUD_RATE;

use crate::io::{IoConfig, spawn_io_task};
use crate::printer::Dp25;
use crate::queue::MAX_RETRIES;

/// Read window of the IO task between checks for new commands.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fluent builder for [`Dp25`].
#[derive(Debug, Clone)]
pub struct Dp25Builder {
    serial_port: Option<String>,
    baud_rate: u32,
    max_retries: u32,
    verify_checksum: bool,
    response_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Dp25Builder {
    pub fn new() -> Self {
        Dp25Builder {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            max_retries: MAX_RETRIES,
            verify_checksum: false,
            response_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default baud rate (115200).
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// NAKs tolerated for one frame before the connection is abandoned
    /// (default: 12).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Reject replies whose checksum does not match (default: off).
    ///
    /// A mismatch is a framing fault and closes the connection.
    pub fn verify_checksum(mut self, enabled: bool) -> Self {
        self.verify_checksum = enabled;
        self
    }

    /// Give up waiting for a reply after `timeout` (default: wait forever).
    ///
    /// The command itself stays queued, so the device's eventual reply is
    /// still consumed by it.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// How long each transport read waits before the IO task checks for new
    /// commands (default: 50ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Build a [`Dp25`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `ecrlib-test-harness`) and for callers that open the transport
    /// themselves. Must be called from within a Tokio runtime.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Dp25> {
        if self.max_retries == 0 {
            return Err(Error::InvalidParameter(
                "max_retries must be at least 1".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidParameter(
                "poll_interval must be greater than zero".into(),
            ));
        }

        let config = IoConfig {
            max_retries: self.max_retries,
            verify_checksum: self.verify_checksum,
            poll_interval: self.poll_interval,
        };
        let io = spawn_io_task(transport, config);
        Ok(Dp25::new(io, self.response_timeout))
    }

    /// Build a [`Dp25`] using a serial transport.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<Dp25> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;

        let transport = ecrlib_transport::SerialTransport::open(port, self.baud_rate).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for Dp25Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecrlib_test_harness::MockTransport;

    #[test]
    fn builder_defaults() {
        let builder = Dp25Builder::new();
        assert_eq!(builder.baud_rate, 115_200);
        assert_eq!(builder.max_retries, 12);
        assert!(!builder.verify_checksum);
        assert_eq!(builder.response_timeout, None);
        assert_eq!(builder.poll_interval, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let result = Dp25Builder::new().build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_rejects_zero_retries() {
        let result = Dp25Builder::new()
            .max_retries(0)
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_fluent_chain() {
        let printer = Dp25Builder::new()
            .serial_port("/dev/ttyUSB0")
            .baud_rate(19_200)
            .max_retries(3)
            .verify_checksum(true)
            .response_timeout(Duration::from_millis(200))
            .poll_interval(Duration::from_millis(5))
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();

        let transport = printer.shutdown().await.unwrap();
        assert!(transport.is_connected());
    }
}
