//! Property-based tests for M-200 framing.
//!
//! These tests generate random addresses, codes and payloads and check that
//! the frame invariants hold for all of them.

use m200_core::Error;
use m200_protocol::{Status, crc16, decode_response, encode_command, encode_response};
use proptest::prelude::*;

/// Response data that fits a frame together with its status byte.
fn response_data() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=254)
}

/// Command payloads long enough to read back as a response.
fn command_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=255)
}

proptest! {
    /// Property: CRC is a pure function of its input.
    #[test]
    fn prop_crc_is_deterministic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(crc16(&bytes), crc16(&bytes));
    }

    /// Property: flipping any single bit changes the CRC.
    #[test]
    fn prop_crc_detects_single_bit_flip(
        bytes in prop::collection::vec(any::<u8>(), 1..64),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut flipped = bytes.clone();
        let i = index.index(flipped.len());
        flipped[i] ^= 1 << bit;
        prop_assert_ne!(crc16(&bytes), crc16(&flipped));
    }

    /// Property: every encoded response decodes under strict CRC with the same
    /// address, code, status and data.
    #[test]
    fn prop_response_survives_strict_decode(
        address in any::<u8>(),
        code in any::<u16>(),
        status in any::<u8>(),
        data in response_data(),
    ) {
        let bytes = encode_response(address, code, Status(status), &data).unwrap();
        prop_assert_eq!(bytes.len(), 5 + 1 + data.len() + 2);

        let response = decode_response(&bytes, true).unwrap();
        prop_assert_eq!(response.address, address);
        prop_assert_eq!(response.command, code);
        prop_assert_eq!(response.status, Status(status));
        prop_assert_eq!(response.data.as_ref(), data.as_slice());
        prop_assert_eq!(response.success(), status == 0x00);
    }

    /// Property: an encoded command is a well-formed frame; its first payload
    /// byte reads back as the status.
    #[test]
    fn prop_command_frame_is_well_formed(
        address in any::<u8>(),
        code in any::<u16>(),
        payload in command_payload(),
    ) {
        let bytes = encode_command(code, address, &payload).unwrap();
        prop_assert_eq!(bytes[4] as usize, payload.len());

        let response = decode_response(&bytes, true).unwrap();
        prop_assert_eq!(response.status, Status(payload[0]));
        prop_assert_eq!(response.data.as_ref(), &payload[1..]);
    }

    /// Property: adding or removing bytes is always a length mismatch.
    #[test]
    fn prop_length_mismatch_is_rejected(
        data in response_data(),
        extra in prop::collection::vec(any::<u8>(), 1..8),
        drop in 1usize..4,
    ) {
        let bytes = encode_response(0xFF, 0x0001, Status::SUCCESS, &data).unwrap();

        let mut longer = bytes.to_vec();
        longer.extend_from_slice(&extra);
        let is_length_mismatch = matches!(
            decode_response(&longer, false),
            Err(Error::LengthMismatch { .. })
        );
        prop_assert!(is_length_mismatch);

        let shorter = &bytes[..bytes.len() - drop];
        if shorter.len() >= 8 {
            let is_length_mismatch = matches!(
                decode_response(shorter, false),
                Err(Error::LengthMismatch { .. })
            );
            prop_assert!(is_length_mismatch);
        } else {
            prop_assert!(decode_response(shorter, false).is_err());
        }
    }

    /// Property: payloads over 255 bytes never encode.
    #[test]
    fn prop_oversized_payload_is_rejected(len in 256usize..600) {
        let payload = vec![0u8; len];
        let is_too_large = matches!(
            encode_command(0x0004, 0xFF, &payload),
            Err(Error::PayloadTooLarge(n)) if n == len
        );
        prop_assert!(is_too_large);
    }
}

#[test]
fn test_crc_check_value() {
    // CRC-16/MCRF4XX check value.
    assert_eq!(crc16(b"123456789"), 0x6F91);
}
