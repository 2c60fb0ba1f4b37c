//! CRC16 for M-200 frames.
//!
//! Preset `0xFFFF`, reflected polynomial `0x8408`, no final XOR: the
//! catalogued CRC-16/MCRF4XX. The checksum covers every byte of the frame
//! before the CRC field itself and is transmitted big-endian.

use crc::{CRC_16_MCRF4XX, Crc};

const M200_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Compute the frame CRC16 over `bytes`.
///
/// # Example
///
/// ```
/// use m200_protocol::crc16;
///
/// // CRC-16/MCRF4XX check value
/// assert_eq!(crc16(b"123456789"), 0x6F91);
/// ```
#[must_use]
pub fn crc16(bytes: &[u8]) -> u16 {
    M200_CRC.checksum(bytes)
}
