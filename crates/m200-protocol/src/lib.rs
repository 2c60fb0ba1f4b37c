//! M-200 gate reader wire protocol.
//!
//! - [`crc`]: CRC16 used by every frame
//! - [`frame`]: command serialization and response decoding
//! - [`catalog`]: named device operations and their response parsers
//! - [`codec`]: `tokio_util` codec that splits a byte stream into raw frames

pub mod catalog;
pub mod codec;
pub mod commands;
pub mod crc;
pub mod frame;
pub mod status;

pub use codec::M200Codec;
pub use commands::CommandCode;
pub use crc::crc16;
pub use frame::{Command, RawFrame, Response, decode_response, encode_command, encode_response};
pub use status::Status;
