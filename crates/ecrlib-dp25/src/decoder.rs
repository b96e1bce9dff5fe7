//! Byte-at-a-time decoder for device responses.
//!
//! The device streams responses over a serial line with no guarantee about
//! how reads are chunked, so [`FrameDecoder`] consumes exactly one byte per
//! [`push`](FrameDecoder::push) call and keeps its position between calls.
//! Outside a frame it also recognises the single-byte NAK and SYN signals.
//!
//! Any unexpected byte is a [`FramingFault`]. The stream carries no resync
//! marker the host can trust, so callers treat a fault as fatal for the
//! connection; the decoder itself resets to idle so it stays usable.

use std::mem;

use crate::bcc;
use crate::frame::{
    CHECKSUM_LEN, DELIMITER, Frame, NAK, POSTAMBLE, PREAMBLE, STATUS_LEN, SYN, TERMINATOR,
    response_payload_len,
};

/// Something the decoder recognised in the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The device rejected the last frame and wants it again.
    Nak,
    /// The device is busy. Carries no obligation for the host.
    Syn,
    /// A complete response frame.
    Frame(Frame),
}

/// A violation of the response frame layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingFault {
    #[error("malformed response: unexpected byte 0x{0:02X} outside a frame")]
    Malformed(u8),

    #[error("invalid response length byte 0x{0:02X}")]
    InvalidLength(u8),

    #[error("expected delimiter 0x04, got 0x{0:02X}")]
    InvalidDelimiter(u8),

    #[error("expected postamble 0x05, got 0x{0:02X}")]
    InvalidPostamble(u8),

    #[error("expected terminator 0x03, got 0x{0:02X}")]
    InvalidTerminator(u8),

    #[error("checksum mismatch: expected {expected:04X}, received {received:02X?}")]
    ChecksumMismatch { expected: u32, received: [u8; 4] },
}

impl From<FramingFault> for ecrlib_core::Error {
    fn from(fault: FramingFault) -> Self {
        ecrlib_core::Error::Framing(fault.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Length,
    Sequence,
    Command,
    Data,
    Delimiter,
    Status,
    Postamble,
    Checksum,
    Terminator,
}

/// Incremental response decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    state: State,
    frame: Frame,
    /// Payload bytes still to come.
    remaining: usize,
    /// Bytes already stored in the current fixed-size field.
    filled: usize,
    verify_checksum: bool,
}

impl FrameDecoder {
    /// Create a decoder that does not check response checksums.
    pub fn new() -> Self {
        FrameDecoder {
            state: State::Idle,
            frame: Frame::default(),
            remaining: 0,
            filled: 0,
            verify_checksum: false,
        }
    }

    /// Create a decoder that rejects frames whose checksum does not match.
    pub fn with_checksum_verification() -> Self {
        FrameDecoder {
            verify_checksum: true,
            ..Self::new()
        }
    }

    /// `true` when the decoder is between frames.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Drop any partially assembled frame.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.frame = Frame::default();
        self.remaining = 0;
        self.filled = 0;
    }

    /// Feed one byte.
    ///
    /// Returns `Ok(None)` while a frame is still being assembled. On a fault
    /// the decoder resets before returning the error.
    pub fn push(&mut self, byte: u8) -> Result<Option<Event>, FramingFault> {
        let result = self.step(byte);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn step(&mut self, byte: u8) -> Result<Option<Event>, FramingFault> {
        match self.state {
            State::Idle => match byte {
                NAK => return Ok(Some(Event::Nak)),
                SYN => return Ok(Some(Event::Syn)),
                PREAMBLE => {
                    self.frame = Frame::default();
                    self.state = State::Length;
                }
                other => return Err(FramingFault::Malformed(other)),
            },
            State::Length => {
                self.remaining =
                    response_payload_len(byte).ok_or(FramingFault::InvalidLength(byte))?;
                self.frame.length = byte;
                self.frame.data = Vec::with_capacity(self.remaining);
                self.state = State::Sequence;
            }
            State::Sequence => {
                self.frame.sequence = byte;
                self.state = State::Command;
            }
            State::Command => {
                self.frame.command = byte;
                self.state = if self.remaining == 0 {
                    State::Delimiter
                } else {
                    State::Data
                };
            }
            State::Data => {
                self.frame.data.push(byte);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.state = State::Delimiter;
                }
            }
            State::Delimiter => {
                if byte != DELIMITER {
                    return Err(FramingFault::InvalidDelimiter(byte));
                }
                self.filled = 0;
                self.state = State::Status;
            }
            State::Status => {
                self.frame.status[self.filled] = byte;
                self.filled += 1;
                if self.filled == STATUS_LEN {
                    self.state = State::Postamble;
                }
            }
            State::Postamble => {
                if byte != POSTAMBLE {
                    return Err(FramingFault::InvalidPostamble(byte));
                }
                self.filled = 0;
                self.state = State::Checksum;
            }
            State::Checksum => {
                self.frame.checksum[self.filled] = byte;
                self.filled += 1;
                if self.filled == CHECKSUM_LEN {
                    self.state = State::Terminator;
                }
            }
            State::Terminator => {
                if byte != TERMINATOR {
                    return Err(FramingFault::InvalidTerminator(byte));
                }
                let frame = mem::take(&mut self.frame);
                self.state = State::Idle;
                self.filled = 0;

                // Off by default: the checksum is carried but not trusted.
                if self.verify_checksum {
                    let expected = bcc::expected_for(&frame);
                    if bcc::decode(&frame.checksum) != Some(expected) {
                        return Err(FramingFault::ChecksumMismatch {
                            expected,
                            received: frame.checksum,
                        });
                    }
                }

                tracing::debug!(
                    sequence = frame.sequence,
                    command = frame.command,
                    payload_len = frame.data.len(),
                    status = ?frame.status,
                    "decoded response frame"
                );
                return Ok(Some(Event::Frame(frame)));
            }
        }
        Ok(None)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_response;

    fn feed(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Result<Option<Event>, FramingFault>> {
        bytes.iter().map(|&b| decoder.push(b)).collect()
    }

    fn simple_response() -> Vec<u8> {
        let mut bytes = vec![0x01, 0x2C, 0x22, 0x30, 0x41, 0x04];
        bytes.extend_from_slice(&[0x00; 6]);
        bytes.extend_from_slice(&[0x05, 0x30, 0x30, 0x30, 0x30, 0x03]);
        bytes
    }

    #[test]
    fn decode_single_byte_response() {
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &simple_response());

        let (last, rest) = results.split_last().unwrap();
        assert!(rest.iter().all(|r| matches!(r, Ok(None))));

        let Ok(Some(Event::Frame(frame))) = last else {
            panic!("expected a frame, got {last:?}");
        };
        assert_eq!(frame.length, 0x2C);
        assert_eq!(frame.sequence, 0x22);
        assert_eq!(frame.command, 0x30);
        assert_eq!(frame.data, b"A");
        assert_eq!(frame.status, [0; 6]);
        assert_eq!(frame.checksum, *b"0000");
        assert!(decoder.is_idle());
    }

    #[test]
    fn decode_empty_payload() {
        let bytes = encode_response(0x23, 0x2D, &[], &[0x80; 6]).unwrap();
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &bytes);

        let Some(Ok(Some(Event::Frame(frame)))) = results.last() else {
            panic!("expected a frame");
        };
        assert!(frame.data.is_empty());
        assert_eq!(frame.status, [0x80; 6]);
    }

    #[test]
    fn decode_back_to_back_frames() {
        let mut bytes = encode_response(0x22, 0x4A, b"0,0", &[0; 6]).unwrap();
        bytes.extend(encode_response(0x23, 0x4A, b"1,1", &[0; 6]).unwrap());

        let mut decoder = FrameDecoder::new();
        let frames: Vec<Frame> = feed(&mut decoder, &bytes)
            .into_iter()
            .filter_map(|r| match r {
                Ok(Some(Event::Frame(f))) => Some(f),
                _ => None,
            })
            .collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, b"0,0");
        assert_eq!(frames[1].sequence, 0x23);
    }

    #[test]
    fn control_bytes_outside_frame() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(NAK), Ok(Some(Event::Nak)));
        assert_eq!(decoder.push(SYN), Ok(Some(Event::Syn)));
        assert!(decoder.is_idle());
    }

    #[test]
    fn control_bytes_inside_frame_are_payload() {
        let bytes = encode_response(0x22, 0x30, &[NAK, SYN], &[0; 6]).unwrap();
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &bytes);

        let events: Vec<_> = results.iter().filter(|r| !matches!(r, Ok(None))).collect();
        assert_eq!(events.len(), 1);
        let Ok(Some(Event::Frame(frame))) = events[0] else {
            panic!("expected a frame");
        };
        assert_eq!(frame.data, vec![NAK, SYN]);
    }

    #[test]
    fn stray_byte_is_malformed() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(0x42), Err(FramingFault::Malformed(0x42)));
        assert!(decoder.is_idle());
    }

    #[test]
    fn short_length_byte_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.push(PREAMBLE).unwrap();
        assert_eq!(decoder.push(0x2A), Err(FramingFault::InvalidLength(0x2A)));
        assert!(decoder.is_idle());
    }

    #[test]
    fn fixed_byte_positions_follow_length() {
        // Position 1 is the length byte.
        for payload_len in [0usize, 1, 7, 40] {
            let data = vec![b'x'; payload_len];
            let bytes = encode_response(0x22, 0x30, &data, &[0; 6]).unwrap();
            let l = bytes[1] as usize - 0x20;
            assert_eq!(bytes[l - 7], DELIMITER);
            assert_eq!(bytes[l], POSTAMBLE);
            assert_eq!(bytes[l + 5], TERMINATOR);
            assert_eq!(bytes.len(), l + 6);
        }
    }

    #[test]
    fn wrong_delimiter_rejected() {
        let mut bytes = simple_response();
        bytes[5] = 0x06;
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &bytes[..6]);
        assert_eq!(results[5], Err(FramingFault::InvalidDelimiter(0x06)));
        assert!(decoder.is_idle());
    }

    #[test]
    fn wrong_postamble_rejected() {
        let mut bytes = simple_response();
        bytes[12] = 0x03;
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &bytes[..13]);
        assert_eq!(results[12], Err(FramingFault::InvalidPostamble(0x03)));
    }

    #[test]
    fn wrong_terminator_rejected() {
        let mut bytes = simple_response();
        bytes[17] = 0x05;
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &bytes);
        assert_eq!(results[17], Err(FramingFault::InvalidTerminator(0x05)));
        assert!(decoder.is_idle());
    }

    #[test]
    fn decoder_recovers_after_fault() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(0x99).is_err());

        let results = feed(&mut decoder, &simple_response());
        assert!(matches!(results.last(), Some(Ok(Some(Event::Frame(_))))));
    }

    #[test]
    fn checksum_ignored_by_default() {
        let mut decoder = FrameDecoder::new();
        let results = feed(&mut decoder, &simple_response());
        assert!(matches!(results.last(), Some(Ok(Some(Event::Frame(_))))));
    }

    #[test]
    fn checksum_verification_accepts_valid_frame() {
        let bytes = encode_response(0x22, 0x30, b"A", &[0x80, 0x80, 0x88, 0x80, 0x86, 0x9A]).unwrap();
        let mut decoder = FrameDecoder::with_checksum_verification();
        let results = feed(&mut decoder, &bytes);
        assert!(matches!(results.last(), Some(Ok(Some(Event::Frame(_))))));
    }

    #[test]
    fn checksum_verification_rejects_mismatch() {
        let mut decoder = FrameDecoder::with_checksum_verification();
        let results = feed(&mut decoder, &simple_response());

        let expected = bcc::response_sum(0x2C, 0x22, 0x30, b"A", &[0; 6]);
        assert_eq!(
            results.last(),
            Some(&Err(FramingFault::ChecksumMismatch {
                expected,
                received: *b"0000",
            }))
        );
    }

    #[test]
    fn framing_fault_converts_to_error() {
        let err: ecrlib_core::Error = FramingFault::InvalidTerminator(0x05).into();
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "framing fault: expected terminator 0x03, got 0x05"
        );
    }
}
