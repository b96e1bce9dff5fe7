//! Datecs DP-25 fiscal printer backend for ecrlib.
//!
//! This crate implements the binary framing protocol spoken by the DP-25 and
//! related Datecs cash registers over a serial line. It provides:
//!
//! - **Checksum codec** ([`bcc`]) -- the 4-digit block-check value carried
//!   by every frame.
//! - **Frame encoder** ([`frame`]) -- command frame layout and the rolling
//!   sequence counter.
//! - **Frame decoder** ([`decoder`]) -- a byte-at-a-time state machine for
//!   device responses, NAK and SYN.
//! - **Status decoder** ([`status`]) -- turns the 6-byte status block into
//!   faults and advisory conditions.
//! - **Command queue** ([`queue`]) -- one frame in flight, FIFO reply
//!   pairing, NAK-driven retransmission.
//! - **Commands** ([`commands`]) -- payload builders and reply parsers for
//!   receipts, display, totals and PLU programming.
//! - **Dp25** ([`printer`]) and **Dp25Builder** ([`builder`]) -- the device
//!   handle and its fluent builder.
//!
//! # Example
//!
//! ```
//! use ecrlib_dp25::decoder::{Event, FrameDecoder};
//! use ecrlib_dp25::frame::{FrameEncoder, encode_response};
//!
//! // Ask for the cash location parameter.
//! let mut encoder = FrameEncoder::new();
//! let request = encoder.build(0x41, b"sCASH_LOC").unwrap();
//! assert_eq!(&request[..4], &[0x01, 0x2D, 0x22, 0x41]);
//!
//! // Feed a simulated reply through the decoder one byte at a time.
//! let reply = encode_response(0x22, 0x41, b"1", &[0x80; 6]).unwrap();
//! let mut decoder = FrameDecoder::new();
//! let mut frames = reply.iter().filter_map(|&b| match decoder.push(b) {
//!     Ok(Some(Event::Frame(frame))) => Some(frame),
//!     _ => None,
//! });
//! assert_eq!(frames.next().unwrap().data, b"1");
//! ```

pub mod bcc;
pub mod builder;
pub mod commands;
pub mod decoder;
pub mod frame;
mod io;
pub mod printer;
pub mod queue;
pub mod status;

pub use builder::Dp25Builder;
pub use printer::Dp25;
pub use queue::Response;
