//! One request/response exchange at a time over a byte stream.
//!
//! The reader pushes unsolicited frames (autonomous inventory reports, gate
//! events) on the same socket that carries command responses. [`FrameLink`]
//! therefore matches responses by command code rather than by position:
//!
//! ```text
//! host                         reader
//!  │── CF FF 00 54 00 CRC ──────►│   get power
//!  │◄── CF FF 00 80 0B .. CRC ───│   unsolicited gate status  (skipped)
//!  │◄── CF FF 00 54 02 00 1A CRC─│   matching response        (returned)
//! ```
//!
//! Every read and write is bounded by the socket timeout. Bytes received
//! before a timeout are handed back so a caller can inspect them.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use m200_core::{
    bytes_to_hex,
    constants::{HEAD, RESPONSE_HEADER_SIZE, frame_size},
};
use m200_protocol::{Command, commands::describe_code};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, trace, warn};

use crate::error::{ReaderError, Result};

/// Flush and shutdown bound when closing.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Chunk size for stream reads.
const READ_CHUNK: usize = 256;

/// Exclusive owner of a reader stream.
#[derive(Debug)]
pub struct FrameLink<S> {
    stream: S,
    timeout: Duration,
}

/// What one read attempt produced.
enum Received {
    /// A complete frame starting with the head byte.
    Frame,
    /// Bytes that do not start with the head byte.
    Unframed,
}

impl<S> FrameLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self { stream, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Discard whatever the stream already buffered, without waiting.
    ///
    /// Returns the number of bytes dropped.
    pub fn drain_pending(&mut self) -> usize {
        let mut sink = BytesMut::new();
        self.read_available(&mut sink);
        if !sink.is_empty() {
            trace!(bytes = %bytes_to_hex(&sink), "Drained pending bytes");
        }
        sink.len()
    }

    /// Send `command` and wait for the response with the same command code.
    ///
    /// Each of the `max_retries` attempts reads one frame. Frames for other
    /// commands are logged and skipped. The returned bytes are one of:
    ///
    /// - the complete matching frame
    /// - bytes not starting with the head byte, plus whatever followed them
    ///   immediately
    /// - a partial frame cut off by the read timeout
    ///
    /// # Errors
    ///
    /// - [`ReaderError::ReadTimeout`] when the final attempt received nothing
    /// - [`ReaderError::ResponseTimeout`] when every attempt read a frame for
    ///   another command
    /// - [`ReaderError::WriteTimeout`], [`ReaderError::ConnectionLost`] or
    ///   [`ReaderError::Io`] for transport failures
    pub async fn execute(&mut self, command: &Command, max_retries: u32) -> Result<Bytes> {
        let request = command.serialize();
        let expected = command.code().as_u16();

        trace!(command = %command.code(), bytes = %bytes_to_hex(&request), "TX");
        self.write_frame(&request).await?;

        for attempt in 1..=max_retries {
            let mut buf = BytesMut::with_capacity(64);
            match self.read_frame(&mut buf).await {
                Ok(Received::Frame) => {
                    trace!(attempt, bytes = %bytes_to_hex(&buf), "RX");
                    let received = u16::from_be_bytes([buf[2], buf[3]]);
                    if received == expected {
                        return Ok(buf.freeze());
                    }
                    warn!(
                        command = %command.code(),
                        received = %describe_code(received),
                        attempt,
                        "Skipping unsolicited frame"
                    );
                }
                Ok(Received::Unframed) => {
                    warn!(
                        command = %command.code(),
                        bytes = %bytes_to_hex(&buf),
                        "Response does not start with a frame head"
                    );
                    return Ok(buf.freeze());
                }
                Err(ReaderError::ReadTimeout(ms)) => {
                    if !buf.is_empty() {
                        debug!(
                            command = %command.code(),
                            received = buf.len(),
                            "Read timed out mid-frame, returning partial bytes"
                        );
                        return Ok(buf.freeze());
                    }
                    if attempt == max_retries {
                        return Err(ReaderError::ReadTimeout(ms));
                    }
                    debug!(command = %command.code(), attempt, "No response yet");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ReaderError::ResponseTimeout {
            command: command.code().to_string(),
            attempts: max_retries,
        })
    }

    /// Flush and shut the stream down, each bounded to 500 ms.
    pub async fn close(mut self) {
        if timeout(CLOSE_TIMEOUT, self.stream.flush()).await.is_err() {
            debug!("Flush timed out while closing");
        }
        match timeout(CLOSE_TIMEOUT, self.stream.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Shutdown failed while closing"),
            Err(_) => debug!("Shutdown timed out while closing"),
        }
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        let timeout_ms = self.timeout_ms();
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        match timeout(self.timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ReaderError::WriteTimeout(timeout_ms)),
        }
    }

    /// Read one frame into `buf`. On timeout `buf` keeps the bytes received.
    async fn read_frame(&mut self, buf: &mut BytesMut) -> Result<Received> {
        let deadline = Instant::now() + self.timeout;

        self.fill_to(buf, 1, deadline).await?;
        if buf[0] != HEAD {
            self.read_available(buf);
            return Ok(Received::Unframed);
        }

        self.fill_to(buf, RESPONSE_HEADER_SIZE, deadline).await?;
        let total = frame_size(buf[4]);
        self.fill_to(buf, total, deadline).await?;
        Ok(Received::Frame)
    }

    /// Read until `buf` holds `target` bytes, never past it.
    async fn fill_to(&mut self, buf: &mut BytesMut, target: usize, deadline: Instant) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        while buf.len() < target {
            let want = (target - buf.len()).min(READ_CHUNK);
            match timeout_at(deadline, self.stream.read(&mut chunk[..want])).await {
                Ok(Ok(0)) => return Err(ReaderError::ConnectionLost),
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ReaderError::ReadTimeout(self.timeout_ms())),
            }
        }
        Ok(())
    }

    /// Append every byte that can be read without waiting.
    fn read_available(&mut self, buf: &mut BytesMut) {
        let mut chunk = [0u8; READ_CHUNK];
        while let Some(Ok(n)) = self.stream.read(&mut chunk).now_or_never() {
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use m200_protocol::{CommandCode, Status, catalog, encode_response};
    use tokio::io::{DuplexStream, duplex};

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn link() -> (FrameLink<DuplexStream>, DuplexStream) {
        let (host, device) = duplex(4096);
        (FrameLink::new(host, TIMEOUT), device)
    }

    fn reply(code: u16, data: &[u8]) -> Bytes {
        encode_response(0xFF, code, Status::SUCCESS, data).unwrap()
    }

    #[tokio::test]
    async fn test_execute_returns_matching_frame() {
        let (mut link, mut device) = link();
        let expected = reply(0x0054, &[26]);
        device.write_all(&expected).await.unwrap();

        let bytes = link.execute(&catalog::get_power(), 3).await.unwrap();
        assert_eq!(bytes, expected);

        let mut sent = [0u8; 7];
        device.read_exact(&mut sent).await.unwrap();
        assert_eq!(&sent[..], &catalog::get_power().serialize()[..]);
    }

    #[tokio::test]
    async fn test_execute_skips_unsolicited_frames() {
        let (mut link, mut device) = link();
        device.write_all(&reply(0x0080, &[0; 10])).await.unwrap();
        device.write_all(&reply(0x0076, &[1])).await.unwrap();
        device.write_all(&reply(0x0054, &[18])).await.unwrap();

        let bytes = link.execute(&catalog::get_power(), 3).await.unwrap();
        assert_eq!(&bytes[2..4], &[0x00, 0x54]);
        assert_eq!(bytes[6], 18);
    }

    #[tokio::test]
    async fn test_execute_leaves_following_frame_unread() {
        let (mut link, mut device) = link();
        device.write_all(&reply(0x0054, &[18])).await.unwrap();
        device.write_all(&reply(0x0080, &[0; 10])).await.unwrap();

        link.execute(&catalog::get_power(), 1).await.unwrap();
        let bytes = link.execute(&catalog::get_gate_status(), 1).await.unwrap();
        assert_eq!(bytes.len(), 18);
    }

    #[tokio::test]
    async fn test_execute_gives_up_after_mismatches() {
        let (mut link, mut device) = link();
        for _ in 0..3 {
            device.write_all(&reply(0x0080, &[0; 10])).await.unwrap();
        }

        let err = link.execute(&catalog::get_power(), 3).await.unwrap_err();
        assert!(matches!(err, ReaderError::ResponseTimeout { attempts: 3, .. }));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_execute_times_out_on_silence() {
        let (mut link, _device) = link();
        let err = link.execute(&catalog::get_power(), 2).await.unwrap_err();
        assert!(matches!(err, ReaderError::ReadTimeout(200)));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_execute_returns_partial_frame_on_timeout() {
        let (mut link, mut device) = link();
        let full = reply(0x0054, &[26]);
        device.write_all(&full[..5]).await.unwrap();

        let bytes = link.execute(&catalog::get_power(), 3).await.unwrap();
        assert_eq!(bytes, full.slice(..5));
    }

    #[tokio::test]
    async fn test_execute_returns_unframed_bytes() {
        let (mut link, mut device) = link();
        device.write_all(b"HTTP/1.1 400 Bad Request\r\n").await.unwrap();

        let bytes = link.execute(&catalog::get_device_info(), 3).await.unwrap();
        assert_eq!(&bytes[..], b"HTTP/1.1 400 Bad Request\r\n");
    }

    #[tokio::test]
    async fn test_execute_reports_closed_stream() {
        let (mut link, device) = link();
        drop(device);
        let err = link.execute(&catalog::get_power(), 3).await.unwrap_err();
        assert!(matches!(
            err,
            ReaderError::ConnectionLost | ReaderError::Io(_)
        ));
    }

    #[tokio::test]
    async fn test_drain_pending() {
        let (mut link, mut device) = link();
        device.write_all(b"boot v1.2\r\n").await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(link.drain_pending(), 11);
        assert_eq!(link.drain_pending(), 0);
    }

    #[tokio::test]
    async fn test_status_only_response() {
        let (mut link, mut device) = link();
        let done = encode_response(0xFF, 0x0001, Status::INVENTORY_COMPLETE, &[]).unwrap();
        device.write_all(&done).await.unwrap();

        let cmd = Command::empty(CommandCode::StartInventory);
        assert_eq!(link.execute(&cmd, 1).await.unwrap(), done);
    }
}
