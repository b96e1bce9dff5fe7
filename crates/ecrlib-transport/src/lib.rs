//! Transport implementations for ecrlib.
//!
//! This crate provides the concrete [`Transport`](ecrlib_core::Transport)
//! used to reach a fiscal printer:
//!
//! - [`SerialTransport`]: USB virtual COM ports and RS-232 serial connections
//!
//! # Example
//!
//! ```no_run
//! use ecrlib_transport::SerialTransport;
//! use ecrlib_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> ecrlib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 115_200).await?;
//!
//! // "Test communication" frame, sequence 0x22
//! transport.send(&[0x01, 0x24, 0x22, 0x2D, 0x05, 0x30, 0x30, 0x37, 0x38, 0x03]).await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
