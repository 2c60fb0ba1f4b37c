//! Tokio codec for M-200 frame boundaries.
//!
//! `M200Codec` splits a TCP byte stream into [`RawFrame`]s using the head byte
//! and the `LEN` field. It does not interpret status bytes or check CRCs, so
//! the same codec serves both sides of the link: a reader reading commands and
//! a host reading responses.
//!
//! # Resynchronization
//!
//! Bytes before a head byte (`0xCF`) are discarded. A head byte that turns out
//! to be part of garbage will at worst swallow one bogus frame, after which the
//! decoder is aligned again.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use m200_protocol::{M200Codec, RawFrame, Status};
//! use tokio::net::TcpListener;
//! use tokio_util::codec::Framed;
//!
//! # async fn example() -> m200_core::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:4001").await?;
//! let (stream, _) = listener.accept().await?;
//! let mut framed = Framed::new(stream, M200Codec::new());
//!
//! while let Some(Ok(command)) = framed.next().await {
//!     let reply = RawFrame::response(command.address, command.command, Status::SUCCESS, &[])?;
//!     framed.send(reply).await?;
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::{Command, RawFrame};
use m200_core::{
    Error, Result,
    constants::{HEAD, PREFIX_SIZE, frame_size},
};

/// Tokio codec for raw M-200 frames.
#[derive(Debug, Default)]
pub struct M200Codec {
    /// Bytes dropped while hunting for a head byte.
    discarded: usize,
}

impl M200Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes discarded during resynchronization.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Decoder for M200Codec {
    type Item = RawFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match src.iter().position(|&b| b == HEAD) {
            Some(0) => {}
            Some(offset) => {
                trace!(dropped = offset, "Discarding bytes before frame head");
                self.discarded += offset;
                src.advance(offset);
            }
            None => {
                if !src.is_empty() {
                    trace!(dropped = src.len(), "Discarding bytes without frame head");
                    self.discarded += src.len();
                    src.clear();
                }
                return Ok(None);
            }
        }

        if src.len() < PREFIX_SIZE {
            return Ok(None);
        }

        let total = frame_size(src[4]);
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        Ok(Some(RawFrame::split(&frame)))
    }
}

impl Encoder<RawFrame> for M200Codec {
    type Error = Error;

    fn encode(&mut self, item: RawFrame, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&item.to_bytes());
        Ok(())
    }
}

impl Encoder<Command> for M200Codec {
    type Error = Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&item.serialize());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommandCode, Status, encode_response};

    #[test]
    fn test_decode_complete_frame() {
        let mut codec = M200Codec::new();
        let bytes = encode_response(0xFF, 0x0054, Status::SUCCESS, &[26]).unwrap();
        let mut buffer = BytesMut::from(&bytes[..]);

        let frame = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.command, 0x0054);
        assert_eq!(frame.body.as_ref(), &[0x00, 26]);
        assert!(frame.crc_valid());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_partial_frame() {
        let mut codec = M200Codec::new();
        let bytes = encode_response(0xFF, 0x0070, Status::SUCCESS, &[0; 10]).unwrap();

        let mut buffer = BytesMut::from(&bytes[..3]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&bytes[3..12]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&bytes[12..]);
        let frame = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.body.len(), 11);
    }

    #[test]
    fn test_decode_multiple_frames_in_buffer() {
        let mut codec = M200Codec::new();
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&Command::empty(CommandCode::GetPower).serialize());
        buffer.extend_from_slice(&Command::empty(CommandCode::GateStatus).serialize());

        assert_eq!(codec.decode(&mut buffer).unwrap().unwrap().command, 0x0054);
        assert_eq!(codec.decode(&mut buffer).unwrap().unwrap().command, 0x0080);
        assert!(codec.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_decode_with_garbage_before_head() {
        let mut codec = M200Codec::new();
        let mut buffer = BytesMut::from(&b"HTTP/1.1"[..]);
        buffer.extend_from_slice(&Command::empty(CommandCode::GetDeviceInfo).serialize());

        let frame = codec.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.command, 0x0070);
        assert_eq!(codec.discarded(), 8);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_garbage_only() {
        let mut codec = M200Codec::new();
        let mut buffer = BytesMut::from(&b"garbage"[..]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert!(buffer.is_empty());
        assert_eq!(codec.discarded(), 7);
    }

    #[test]
    fn test_encode_command_and_raw_frame_agree() {
        let mut codec = M200Codec::new();
        let cmd = Command::new(CommandCode::SetPower, vec![20, 0]).unwrap();

        let mut a = BytesMut::new();
        codec.encode(cmd.clone(), &mut a).unwrap();
        let mut b = BytesMut::new();
        codec.encode(RawFrame::from_command(&cmd), &mut b).unwrap();

        assert_eq!(a, b);
    }
}
