//! Binary framing for M-200 commands and responses.
//!
//! # Wire Format
//!
//! ```text
//! Command:   CF | ADDR | CMD(2,BE) | LEN=len(payload) | PAYLOAD          | CRC(2,BE)
//! Response:  CF | ADDR | CMD(2,BE) | LEN=1+len(data)  | STATUS | DATA    | CRC(2,BE)
//! ```
//!
//! The CRC covers every byte before it, head included.
//!
//! # CRC Leniency
//!
//! Field units have been seen emitting CRCs that do not match the documented
//! algorithm. [`decode_response`] therefore only rejects a CRC mismatch when
//! asked to be strict; otherwise the mismatch is logged and the response is
//! returned. A CRC that matches once its two bytes are swapped is reported at
//! debug level as a byte-order quirk.
//!
//! # Example
//!
//! ```
//! use m200_protocol::{Command, CommandCode, Status, decode_response, encode_response};
//!
//! let command = Command::empty(CommandCode::GetPower);
//! assert_eq!(&command.serialize()[..5], &[0xCF, 0xFF, 0x00, 0x54, 0x00]);
//!
//! let reply = encode_response(0xFF, 0x0054, Status::SUCCESS, &[26]).unwrap();
//! let response = decode_response(&reply, true).unwrap();
//! assert!(response.success());
//! assert_eq!(response.data.as_ref(), &[26]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::{debug, warn};

use crate::{CommandCode, Status, commands::describe_code, crc16};
use m200_core::{
    Error, Result,
    constants::{
        ADDRESS_BROADCAST, CRC_SIZE, HEAD, MAX_PAYLOAD_SIZE, MIN_RESPONSE_SIZE, PREFIX_SIZE,
        RESPONSE_HEADER_SIZE, frame_size,
    },
};

/// Write `HEAD | addr | code | LEN | body | CRC` into a fresh buffer.
fn write_frame(address: u8, code: u16, body: &[&[u8]]) -> Result<Bytes> {
    let len: usize = body.iter().map(|part| part.len()).sum();
    if len > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge(len));
    }

    let mut buf = BytesMut::with_capacity(PREFIX_SIZE + len + CRC_SIZE);
    buf.put_u8(HEAD);
    buf.put_u8(address);
    buf.put_u16(code);
    buf.put_u8(len as u8);
    for part in body {
        buf.put_slice(part);
    }
    let crc = crc16(&buf);
    buf.put_u16(crc);

    Ok(buf.freeze())
}

/// Serialize a command frame.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] when `payload` exceeds 255 bytes.
pub fn encode_command(code: u16, address: u8, payload: &[u8]) -> Result<Bytes> {
    write_frame(address, code, &[payload])
}

/// Serialize a response frame as a reader would send it.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] when `data` exceeds 254 bytes.
pub fn encode_response(address: u8, code: u16, status: Status, data: &[u8]) -> Result<Bytes> {
    write_frame(address, code, &[&[status.as_u8()][..], data])
}

/// A device command ready to be written to the wire.
///
/// Commands are immutable once built; [`Command::serialize`] is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    code: CommandCode,
    address: u8,
    payload: Bytes,
}

impl Command {
    /// Build a broadcast-addressed command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] when the payload exceeds 255 bytes.
    pub fn new(code: CommandCode, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        Ok(Self {
            code,
            address: ADDRESS_BROADCAST,
            payload,
        })
    }

    /// Build a command without payload.
    #[must_use]
    pub fn empty(code: CommandCode) -> Self {
        Self {
            code,
            address: ADDRESS_BROADCAST,
            payload: Bytes::new(),
        }
    }

    /// Build a command whose payload size is fixed by its layout.
    pub(crate) fn fixed(code: CommandCode, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);
        Self {
            code,
            address: ADDRESS_BROADCAST,
            payload,
        }
    }

    /// Address the command to a specific reader.
    #[must_use]
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn code(&self) -> CommandCode {
        self.code
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Wire bytes of this command.
    #[must_use]
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(frame_size(self.payload.len() as u8));
        buf.put_u8(HEAD);
        buf.put_u8(self.address);
        buf.put_u16(self.code.as_u16());
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
        let crc = crc16(&buf);
        buf.put_u16(crc);
        buf.freeze()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} addr=0x{:02X} payload={}B",
            self.code,
            self.address,
            self.payload.len()
        )
    }
}

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub address: u8,
    pub command: u16,
    pub status: Status,
    pub data: Bytes,
    /// CRC as transmitted.
    pub crc: u16,
    /// Whether the transmitted CRC matched the computed one.
    pub crc_valid: bool,
}

impl Response {
    /// `true` exactly when the status byte is `0x00`.
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.is_success()
    }

    /// The echoed command, when it is one this crate knows.
    #[must_use]
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::from_u16(self.command)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} status={} data={}B",
            describe_code(self.command),
            self.status,
            self.data.len()
        )
    }
}

/// Decode a complete response frame.
///
/// # Errors
///
/// - [`Error::InvalidFrame`] when fewer than 8 bytes are given
/// - [`Error::BadHead`] when the first byte is not `0xCF`
/// - [`Error::LengthMismatch`] when the buffer is not `5 + LEN + 2` bytes
/// - [`Error::CrcMismatch`] on a bad CRC, only when `strict_crc` is set
pub fn decode_response(bytes: &[u8], strict_crc: bool) -> Result<Response> {
    if bytes.len() < MIN_RESPONSE_SIZE {
        return Err(Error::invalid_frame(format!(
            "response needs at least {MIN_RESPONSE_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != HEAD {
        return Err(Error::BadHead(bytes[0]));
    }

    let len = bytes[4];
    let expected = frame_size(len);
    if bytes.len() != expected {
        return Err(Error::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let command = u16::from_be_bytes([bytes[2], bytes[3]]);
    let crc_offset = bytes.len() - CRC_SIZE;
    let crc = u16::from_be_bytes([bytes[crc_offset], bytes[crc_offset + 1]]);
    let computed = crc16(&bytes[..crc_offset]);
    let crc_valid = crc == computed;

    if !crc_valid {
        if strict_crc {
            return Err(Error::CrcMismatch {
                expected: computed,
                actual: crc,
            });
        }
        if crc.swap_bytes() == computed {
            debug!(
                command = %describe_code(command),
                "Response CRC is little-endian, accepting"
            );
        } else {
            warn!(
                command = %describe_code(command),
                computed = %format!("0x{computed:04X}"),
                received = %format!("0x{crc:04X}"),
                "Response CRC mismatch, accepting in lenient mode"
            );
        }
    }

    Ok(Response {
        address: bytes[1],
        command,
        status: Status(bytes[5]),
        data: Bytes::copy_from_slice(&bytes[RESPONSE_HEADER_SIZE..crc_offset]),
        crc,
        crc_valid,
    })
}

/// Wire-level view of a frame, direction agnostic.
///
/// `body` holds the `LEN` bytes between the length byte and the CRC: the
/// payload of a command, or status plus data of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub address: u8,
    pub command: u16,
    pub body: Bytes,
    /// CRC as transmitted.
    pub crc: u16,
}

impl RawFrame {
    /// Raw frame for a response, with a correct CRC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] when `data` exceeds 254 bytes.
    pub fn response(address: u8, command: u16, status: Status, data: &[u8]) -> Result<Self> {
        let bytes = encode_response(address, command, status, data)?;
        Ok(Self::split(&bytes))
    }

    /// Raw frame view of a command.
    #[must_use]
    pub fn from_command(command: &Command) -> Self {
        Self::split(&command.serialize())
    }

    /// Split a complete, length-checked frame into its parts.
    pub(crate) fn split(bytes: &[u8]) -> Self {
        let crc_offset = bytes.len() - CRC_SIZE;
        Self {
            address: bytes[1],
            command: u16::from_be_bytes([bytes[2], bytes[3]]),
            body: Bytes::copy_from_slice(&bytes[PREFIX_SIZE..crc_offset]),
            crc: u16::from_be_bytes([bytes[crc_offset], bytes[crc_offset + 1]]),
        }
    }

    /// Replace the transmitted CRC, for simulating misbehaving devices.
    #[must_use]
    pub fn with_crc(mut self, crc: u16) -> Self {
        self.crc = crc;
        self
    }

    /// The CRC this frame should carry.
    #[must_use]
    pub fn computed_crc(&self) -> u16 {
        let mut buf = BytesMut::with_capacity(PREFIX_SIZE + self.body.len());
        buf.put_u8(HEAD);
        buf.put_u8(self.address);
        buf.put_u16(self.command);
        buf.put_u8(self.body.len() as u8);
        buf.put_slice(&self.body);
        crc16(&buf)
    }

    #[must_use]
    pub fn crc_valid(&self) -> bool {
        self.crc == self.computed_crc()
    }

    /// Wire bytes, carrying the stored CRC unchanged.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PREFIX_SIZE + self.body.len() + CRC_SIZE);
        buf.put_u8(HEAD);
        buf.put_u8(self.address);
        buf.put_u16(self.command);
        buf.put_u8(self.body.len() as u8);
        buf.put_slice(&self.body);
        buf.put_u16(self.crc);
        buf.freeze()
    }

    /// Total size on the wire.
    #[must_use]
    pub fn size(&self) -> usize {
        PREFIX_SIZE + self.body.len() + CRC_SIZE
    }
}
