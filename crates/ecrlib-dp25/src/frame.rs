//! DP-25 frame layout and the outbound frame encoder.
//!
//! Commands and responses use different frame shapes. The host sends:
//!
//! ```text
//! 0x01 <len> <seq> <cmd> [<data>...] 0x05 <bcc:4> 0x03
//! ```
//!
//! with `len = 0x24 + N`. The device answers with a delimiter and a 6-byte
//! status block in addition:
//!
//! ```text
//! 0x01 <len> <seq> <cmd> [<data>...] 0x04 <status:6> 0x05 <bcc:4> 0x03
//! ```
//!
//! with `N = len - 0x20 - 11`. The two length formulas describe different
//! shapes and are kept separate.
//!
//! Outside a frame the device may send a lone `0x15` (NAK, retransmit the
//! last command) or `0x16` (SYN, still busy).

use bytes::{BufMut, Bytes, BytesMut};
use ecrlib_core::{Error, Result};

use crate::bcc;

/// Start of every frame.
pub const PREAMBLE: u8 = 0x01;

/// End of the checksummed part of a frame.
pub const POSTAMBLE: u8 = 0x05;

/// Separates the payload from the status block in a response.
pub const DELIMITER: u8 = 0x04;

/// End of every frame.
pub const TERMINATOR: u8 = 0x03;

/// Negative acknowledgement: the device wants the last frame again.
pub const NAK: u8 = 0x15;

/// Device busy.
pub const SYN: u8 = 0x16;

/// First value of the rolling sequence counter.
pub const SEQUENCE_MIN: u8 = 0x22;

/// Last value of the rolling sequence counter before it wraps.
pub const SEQUENCE_MAX: u8 = 0x7F;

/// Offset applied to every length byte.
pub const LENGTH_OFFSET: u8 = 0x20;

/// Length byte of a command frame with an empty payload.
pub const COMMAND_LENGTH_BASE: u8 = 0x24;

/// Bytes counted by a response length byte besides the payload and the
/// `0x20` offset.
pub const RESPONSE_OVERHEAD: u8 = 11;

/// Largest payload a command frame can carry while its length fits a byte.
pub const MAX_PAYLOAD: usize = (u8::MAX - COMMAND_LENGTH_BASE) as usize;

/// Size of the device status block.
pub const STATUS_LEN: usize = 6;

/// Size of the wire checksum.
pub const CHECKSUM_LEN: usize = 4;

/// A response frame received from the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Raw length byte as received.
    pub length: u8,
    /// Sequence number echoed by the device.
    pub sequence: u8,
    /// Command code echoed by the device.
    pub command: u8,
    /// Reply payload.
    pub data: Vec<u8>,
    /// Raw status block.
    pub status: [u8; STATUS_LEN],
    /// Checksum bytes as received (not verified unless asked for).
    pub checksum: [u8; CHECKSUM_LEN],
}

impl Frame {
    /// The payload as text. Replies are comma-separated ASCII fields.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// The payload split into its comma-separated fields.
    pub fn fields(&self) -> Vec<String> {
        self.text().split(',').map(str::to_owned).collect()
    }
}

/// Payload length announced by a response length byte, or `None` if the
/// byte is too small to describe a valid response.
pub fn response_payload_len(length: u8) -> Option<usize> {
    length
        .checked_sub(LENGTH_OFFSET + RESPONSE_OVERHEAD)
        .map(usize::from)
}

/// Next value of the rolling sequence counter.
pub fn next_sequence(sequence: u8) -> u8 {
    if sequence >= SEQUENCE_MAX {
        SEQUENCE_MIN
    } else {
        sequence + 1
    }
}

/// Encode a command frame with an explicit sequence number.
///
/// # Example
///
/// ```
/// use ecrlib_dp25::frame::encode_command;
///
/// let bytes = encode_command(0x22, 0x2D, &[]).unwrap();
/// assert_eq!(&bytes[..], &[0x01, 0x24, 0x22, 0x2D, 0x05, 0x30, 0x30, 0x37, 0x38, 0x03]);
/// ```
pub fn encode_command(sequence: u8, command: u8, data: &[u8]) -> Result<Bytes> {
    if data.len() > MAX_PAYLOAD {
        return Err(Error::InvalidParameter(format!(
            "payload of {} bytes exceeds the {MAX_PAYLOAD}-byte frame limit",
            data.len()
        )));
    }

    let length = COMMAND_LENGTH_BASE + data.len() as u8;
    let mut buf = BytesMut::with_capacity(data.len() + 10);
    buf.put_u8(PREAMBLE);
    buf.put_u8(length);
    buf.put_u8(sequence);
    buf.put_u8(command);
    buf.put_slice(data);
    buf.put_u8(POSTAMBLE);
    buf.put_slice(&bcc::compute(length, sequence, command, data));
    buf.put_u8(TERMINATOR);
    Ok(buf.freeze())
}

/// Encode a response frame the way the device does.
///
/// Used to simulate a device in tests and in the mock mode of the test
/// application.
pub fn encode_response(
    sequence: u8,
    command: u8,
    data: &[u8],
    status: &[u8; STATUS_LEN],
) -> Result<Vec<u8>> {
    let max = (u8::MAX - LENGTH_OFFSET - RESPONSE_OVERHEAD) as usize;
    if data.len() > max {
        return Err(Error::InvalidParameter(format!(
            "response payload of {} bytes exceeds the {max}-byte frame limit",
            data.len()
        )));
    }

    let length = LENGTH_OFFSET + RESPONSE_OVERHEAD + data.len() as u8;
    let sum = bcc::response_sum(length, sequence, command, data, status);
    let mut buf = Vec::with_capacity(data.len() + 18);
    buf.push(PREAMBLE);
    buf.push(length);
    buf.push(sequence);
    buf.push(command);
    buf.extend_from_slice(data);
    buf.push(DELIMITER);
    buf.extend_from_slice(status);
    buf.push(POSTAMBLE);
    buf.extend_from_slice(&bcc::encode(sum));
    buf.push(TERMINATOR);
    Ok(buf)
}

/// Builds command frames and owns the rolling sequence counter.
///
/// Every successfully built frame consumes one sequence value. The counter
/// labels frames only; replies are matched to commands by order.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    sequence: u8,
}

impl FrameEncoder {
    /// Create an encoder whose first frame carries [`SEQUENCE_MIN`].
    pub fn new() -> Self {
        FrameEncoder {
            sequence: SEQUENCE_MIN,
        }
    }

    /// Create an encoder starting at `sequence`. Values outside
    /// `SEQUENCE_MIN..=SEQUENCE_MAX` start at [`SEQUENCE_MIN`] instead.
    pub fn with_sequence(sequence: u8) -> Self {
        let sequence = if (SEQUENCE_MIN..=SEQUENCE_MAX).contains(&sequence) {
            sequence
        } else {
            SEQUENCE_MIN
        };
        FrameEncoder { sequence }
    }

    /// Sequence number the next frame will carry.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Build a command frame and advance the sequence counter.
    ///
    /// A rejected payload does not consume a sequence value.
    pub fn build(&mut self, command: u8, data: &[u8]) -> Result<Bytes> {
        let frame = encode_command(self.sequence, command, data)?;
        tracing::trace!(
            sequence = self.sequence,
            command,
            payload_len = data.len(),
            "built command frame"
        );
        self.sequence = next_sequence(self.sequence);
        Ok(frame)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}
