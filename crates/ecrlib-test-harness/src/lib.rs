//! ecrlib-test-harness: Test utilities and mock transports for ecrlib.
//!
//! This crate provides [`MockTransport`] for deterministic testing of
//! protocol engines without a real fiscal printer attached.

pub mod mock_serial;

pub use mock_serial::{Inbound, MockTransport, SentLog};
