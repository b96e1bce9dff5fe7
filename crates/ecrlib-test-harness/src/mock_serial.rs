//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. A fiscal printer answers every frame with either
//! a NAK byte or a full response frame, so each expectation pairs one exact
//! outbound frame with the bytes the "device" sends back for it.
//!
//! # Example
//!
//! ```
//! use ecrlib_test_harness::MockTransport;
//!
//! let frame = [0x01, 0x24, 0x22, 0x2D, 0x05, 0x30, 0x30, 0x37, 0x38, 0x03];
//! let mut mock = MockTransport::new();
//! // First attempt is rejected, the retransmission gets an answer.
//! mock.expect(&frame, &[0x15]);
//! mock.expect(&frame, &[0x01, 0x2B, 0x22, 0x2D, 0x04, 0, 0, 0, 0, 0, 0, 0x05, 0x30, 0x30, 0x38, 0x33, 0x03]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ecrlib_core::error::{Error, Result};
use ecrlib_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to deliver once the matching request is sent.
    response: Vec<u8>,
}

/// Shared record of every `send()` made through a [`MockTransport`].
///
/// Cloned out of the mock before it is boxed and handed to a protocol
/// engine, so tests can inspect retransmissions afterwards.
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<Vec<u8>>>>);

impl SentLog {
    fn push(&self, data: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(data.to_vec());
    }

    /// Snapshot of all frames sent so far, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `send()` calls so far.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle to the bytes a [`MockTransport`] hands out on `receive()`.
///
/// Lets a test hold a device reply back and deliver it later, after the
/// mock has been boxed. Pair it with an expectation whose response is
/// empty.
#[derive(Debug, Clone, Default)]
pub struct Inbound(Arc<Mutex<VecDeque<u8>>>);

impl Inbound {
    /// Append bytes the device sends next.
    pub fn push(&self, bytes: &[u8]) {
        self.lock().extend(bytes);
    }

    /// Number of bytes not yet received.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<u8>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; its response
/// bytes are appended to the inbound buffer and handed out by subsequent
/// `receive()` calls.
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be returned by `receive()`.
    inbound: Inbound,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: SentLog,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            inbound: Inbound::default(),
            connected: true,
            sent_log: SentLog::default(),
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Queue bytes the device sends without being asked (SYN, stray frames).
    pub fn inject(&mut self, bytes: &[u8]) {
        self.inbound.push(bytes);
    }

    /// Handle for feeding device bytes after the mock has been boxed.
    pub fn inbound(&self) -> Inbound {
        self.inbound.clone()
    }

    /// Handle to the log of all data sent through this transport.
    pub fn sent_log(&self) -> SentLog {
        self.sent_log.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data);

        match self.expectations.pop_front() {
            Some(expectation) if data == expectation.request.as_slice() => {
                self.inbound.push(&expectation.response);
                Ok(())
            }
            Some(expectation) => Err(Error::Transport(format!(
                "unexpected send data: expected {:02X?}, got {:02X?}",
                expectation.request, data
            ))),
            None => Err(Error::Transport(
                "no more expectations in mock transport".into(),
            )),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let mut inbound = self.inbound.lock();
        if inbound.is_empty() {
            return Err(Error::Timeout);
        }

        let n = inbound.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.inbound.lock().clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
