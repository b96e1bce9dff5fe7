//! Transport trait for device communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a fiscal
//! printer. The serial implementation lives in `ecrlib-transport`, and a
//! scripted mock for tests lives in `ecrlib-test-harness`.
//!
//! Protocol engines (e.g. the DP-25 IO task in `ecrlib-dp25`) operate on a
//! `Transport` rather than directly on a serial port, so the same engine
//! drives real hardware and deterministic unit tests.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a device.
///
/// The transport must deliver bytes in order, without gaps or reordering.
/// Protocol engines match replies to requests purely by arrival order.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a complete, pre-built frame to the device.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the device into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
