//! ecrlib-core: Core traits, types, and error definitions for ecrlib.
//!
//! This crate defines the device-agnostic abstractions shared by every
//! ecrlib backend. Point-of-sale applications depend on these types without
//! pulling in a specific fiscal printer driver.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`Fault`] / [`FaultSet`] -- device-reported faults attached to a reply
//! - [`Condition`] / [`ConditionSet`] -- advisory device state flags
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use ecrlib_core::*`.
pub use error::{Error, Result};
pub use transport::Transport;
pub use types::*;
