//! Core constants for the M-200 gate reader protocol.
//!
//! The M-200 speaks a compact binary protocol over a single TCP connection.
//! Commands and responses share one frame layout:
//!
//! ```text
//! Command:   HEAD | ADDR | CMD(2,BE) | LEN | PAYLOAD(LEN)            | CRC(2,BE)
//! Response:  HEAD | ADDR | CMD(2,BE) | LEN | STATUS | DATA(LEN - 1)  | CRC(2,BE)
//! ```
//!
//! In a response `LEN` counts the status byte plus the data, so every frame on
//! the wire is `5 + LEN + 2` bytes long regardless of direction.
//!
//! # Usage
//!
//! ```
//! use m200_core::constants::*;
//!
//! assert_eq!(HEAD, 0xCF);
//! assert_eq!(frame_size(1), 8);
//! ```

// ============================================================================
// Framing
// ============================================================================

/// First byte of every frame.
pub const HEAD: u8 = 0xCF;

/// Address accepted by every reader on the link.
pub const ADDRESS_BROADCAST: u8 = 0xFF;

/// Factory default reader address.
pub const ADDRESS_DEFAULT: u8 = 0x00;

/// HEAD + ADDR + CMD(2) + LEN.
pub const PREFIX_SIZE: usize = 5;

/// Trailing CRC16.
pub const CRC_SIZE: usize = 2;

/// Response header as read off the wire: prefix plus the status byte.
pub const RESPONSE_HEADER_SIZE: usize = PREFIX_SIZE + 1;

/// Smallest well-formed response (status only, no data).
pub const MIN_RESPONSE_SIZE: usize = PREFIX_SIZE + 1 + CRC_SIZE;

/// Largest payload a single `LEN` byte can describe.
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Largest frame the protocol can produce.
pub const MAX_FRAME_SIZE: usize = PREFIX_SIZE + MAX_PAYLOAD_SIZE + CRC_SIZE;

/// Total wire size of a frame whose `LEN` byte is `len`.
#[inline]
pub const fn frame_size(len: u8) -> usize {
    PREFIX_SIZE + len as usize + CRC_SIZE
}

// ============================================================================
// CRC16
// ============================================================================

/// CRC16 preset value.
pub const CRC16_PRESET: u16 = 0xFFFF;

/// Reflected CRC16 polynomial (0x1021 bit-reversed).
pub const CRC16_POLYNOMIAL: u16 = 0x8408;

// ============================================================================
// Device limits
// ============================================================================

/// Maximum RF output power in dBm.
pub const MAX_RF_POWER_DBM: u8 = 30;

/// Maximum ISO 18000-6C Q value.
pub const MAX_Q_VALUE: u8 = 15;

/// Maximum ISO 18000-6C session (S0-S3).
pub const MAX_SESSION: u8 = 3;

/// Maximum EAS mask length accepted by the gate firmware.
pub const MAX_EAS_MASK_LEN: usize = 62;

/// Size of the device-info response body.
pub const DEVICE_INFO_SIZE: usize = 152;

/// Field widths of the device-info structure, in wire order.
pub const DEVICE_INFO_FIELDS: [usize; 6] = [32, 32, 12, 32, 32, 12];

// ============================================================================
// Timing defaults
// ============================================================================

/// Default TCP port of the binary protocol.
pub const DEFAULT_PORT: u16 = 4001;

/// Default socket timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Delay after connect before draining boot chatter.
pub const DEFAULT_SETTLE_MS: u64 = 200;

/// Default number of frames read while looking for a matching response.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Pause between inventory cycles while scanning.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 100;

/// Pause after a failed inventory cycle.
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 1000;
