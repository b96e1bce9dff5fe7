//! Block-check (BCC) codec.
//!
//! The BCC is a plain unsigned sum over the bytes between the preamble and
//! the end of the postamble. It is carried on the wire as four radix-16
//! digits, most significant first, each offset by `0x30`:
//!
//! ```text
//! bcc = 0x0364  ->  0x30 0x33 0x36 0x34   ("0364")
//! bcc = 0x0A1F  ->  0x30 0x3A 0x31 0x3F   ("0:1?")
//! ```
//!
//! Digits above 9 land on `0x3A..=0x3F`, so the encoding is not hexadecimal
//! ASCII even though it looks like it for small sums.
//!
//! The protocol limits payloads so the sum never exceeds `0xFFFF`.

use crate::frame::{DELIMITER, Frame, POSTAMBLE};

/// Offset added to every BCC digit on the wire.
pub const DIGIT_OFFSET: u8 = 0x30;

/// Positional divisors for the four wire digits, most significant first.
const PLACES: [u32; 4] = [4096, 256, 16, 1];

/// Compute the wire checksum for an outbound command frame.
///
/// Sums the length byte, sequence, command, every payload byte, and the
/// postamble.
///
/// # Example
///
/// ```
/// use ecrlib_dp25::bcc::compute;
///
/// let bcc = compute(0x2D, 0x22, 0x41, b"sCASH_LOC");
/// assert_eq!(&bcc, b"0364");
/// ```
pub fn compute(length: u8, sequence: u8, command: u8, data: &[u8]) -> [u8; 4] {
    encode(command_sum(length, sequence, command, data))
}

/// Unencoded checksum of an outbound command frame.
pub fn command_sum(length: u8, sequence: u8, command: u8, data: &[u8]) -> u32 {
    let header = length as u32 + sequence as u32 + command as u32;
    header + sum_bytes(data) + POSTAMBLE as u32
}

/// Unencoded checksum the device computes for one of its response frames.
///
/// Covers everything after the preamble up to and including the postamble:
/// length, sequence, command, payload, delimiter, status block, postamble.
pub fn response_sum(length: u8, sequence: u8, command: u8, data: &[u8], status: &[u8; 6]) -> u32 {
    length as u32
        + sequence as u32
        + command as u32
        + sum_bytes(data)
        + DELIMITER as u32
        + sum_bytes(status)
        + POSTAMBLE as u32
}

/// Checksum a received frame should carry, per [`response_sum`].
pub fn expected_for(frame: &Frame) -> u32 {
    response_sum(
        frame.length,
        frame.sequence,
        frame.command,
        &frame.data,
        &frame.status,
    )
}

/// Encode a checksum value into its 4-byte wire form.
///
/// Four digits hold 16 bits, so only the low 16 bits of `bcc` are encoded.
pub fn encode(bcc: u32) -> [u8; 4] {
    let mut out = [0u8; 4];
    let mut remaining = bcc & 0xFFFF;
    for (slot, place) in out.iter_mut().zip(PLACES) {
        let digit = remaining / place;
        remaining %= place;
        *slot = DIGIT_OFFSET.wrapping_add(digit as u8);
    }
    out
}

/// Decode a 4-byte wire checksum back into its value.
///
/// Returns `None` if any byte is not a valid offset digit (`0x30..=0x3F`).
///
/// ```
/// use ecrlib_dp25::bcc::{decode, encode};
///
/// assert_eq!(decode(b"0364"), Some(0x0364));
/// assert_eq!(decode(&encode(0xA1F)), Some(0xA1F));
/// assert_eq!(decode(b"00/0"), None);
/// ```
pub fn decode(bytes: &[u8; 4]) -> Option<u32> {
    bytes.iter().zip(PLACES).try_fold(0u32, |acc, (&byte, place)| {
        let digit = byte.checked_sub(DIGIT_OFFSET)?;
        (digit < 16).then(|| acc + digit as u32 * place)
    })
}

fn sum_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().map(|&b| b as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_cash_location_query() {
        // 0x2D + 0x22 + 0x41 + sum("sCASH_LOC") + 0x05 = 868 = 0x364
        assert_eq!(command_sum(0x2D, 0x22, 0x41, b"sCASH_LOC"), 0x364);
        assert_eq!(compute(0x2D, 0x22, 0x41, b"sCASH_LOC"), [0x30, 0x33, 0x36, 0x34]);
    }

    #[test]
    fn compute_empty_payload() {
        // 0x24 + 0x22 + 0x2D + 0x05 = 0x78
        assert_eq!(compute(0x24, 0x22, 0x2D, &[]), *b"0078");
    }

    #[test]
    fn encode_digits_above_nine_are_not_hex_ascii() {
        assert_eq!(encode(0x0A1F), [0x30, 0x3A, 0x31, 0x3F]);
        assert_eq!(encode(0xFFFF), [0x3F, 0x3F, 0x3F, 0x3F]);
    }

    #[test]
    fn encode_zero() {
        assert_eq!(encode(0), *b"0000");
    }

    #[test]
    fn encode_keeps_low_sixteen_bits() {
        assert_eq!(encode(0x1_0364), *b"0364");
        assert_eq!(encode(0xFFFF_FFFF), encode(0xFFFF));
        assert_eq!(decode(&encode(0x2_A1F0)), Some(0xA1F0));
    }

    #[test]
    fn decode_rejects_bytes_outside_digit_range() {
        assert_eq!(decode(&[0x2F, 0x30, 0x30, 0x30]), None);
        assert_eq!(decode(&[0x30, 0x40, 0x30, 0x30]), None);
    }

    #[test]
    fn decode_recovers_largest_protocol_sum() {
        // 219-byte payload of 0xFF with the largest header values.
        let data = [0xFFu8; 219];
        let sum = command_sum(0xFF, 0x7F, 0xFF, &data);
        assert!(sum <= 0xFFFF);
        assert_eq!(decode(&encode(sum)), Some(sum));
    }

    #[test]
    fn compute_is_deterministic() {
        let data = b"P,1,100,0,1.00,0,0,1,WIDGET";
        let a = compute(0x24 + data.len() as u8, 0x30, 0x6B, data);
        let b = compute(0x24 + data.len() as u8, 0x30, 0x6B, data);
        assert_eq!(a, b);
        assert_eq!(encode(decode(&a).unwrap()), a);
    }

    #[test]
    fn response_sum_covers_delimiter_and_status() {
        // 0x2C + 0x22 + 0x30 + 'A' + 0x04 + 0 * 6 + 0x05
        let sum = response_sum(0x2C, 0x22, 0x30, b"A", &[0; 6]);
        assert_eq!(sum, 0x2C + 0x22 + 0x30 + 0x41 + 0x04 + 0x05);

        let sum_with_status = response_sum(0x2C, 0x22, 0x30, b"A", &[0x80, 0x80, 0x80, 0x80, 0x86, 0x9A]);
        assert_eq!(sum_with_status - sum, 0x80 * 4 + 0x86 + 0x9A);
    }
}
