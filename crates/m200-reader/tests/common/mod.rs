//! Fake M-200 device for integration tests.
//!
//! [`FakeDevice`] listens on `127.0.0.1:0` and answers command frames through
//! `Framed<TcpStream, M200Codec>`. Replies come from two tables:
//!
//! - queued one-shot replies ([`FakeDevice::push_reply`]), consumed in order
//! - standing replies ([`FakeDevice::set_reply`]), used when the queue is empty
//!
//! Without either, a command gets a bare success response. Every received
//! command is recorded so tests can count what the session sent.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use m200_core::constants::DEVICE_INFO_FIELDS;
use m200_protocol::{CommandCode, M200Codec, RawFrame, Status};
use m200_reader::ReaderConfig;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

/// Socket timeout used by test configs.
pub const TEST_TIMEOUT_MS: u64 = 300;

/// What the device sends back for one command.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Frames written in order.
    Frames(Vec<RawFrame>),
    /// Write nothing.
    Silent,
}

impl Reply {
    pub fn frame(frame: RawFrame) -> Self {
        Self::Frames(vec![frame])
    }
}

#[derive(Default)]
struct Script {
    queued: HashMap<u16, VecDeque<Reply>>,
    standing: HashMap<u16, Reply>,
    received: Vec<RawFrame>,
    banner: Option<Vec<u8>>,
}

impl Script {
    fn reply_for(&mut self, code: u16) -> Reply {
        if let Some(reply) = self.queued.get_mut(&code).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.standing
            .get(&code)
            .cloned()
            .unwrap_or_else(|| Reply::frame(ok(code, &[])))
    }
}

pub struct FakeDevice {
    addr: SocketAddr,
    script: Arc<Mutex<Script>>,
    accept: JoinHandle<()>,
}

impl FakeDevice {
    /// Start a device that identifies itself and reports no tags.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(Mutex::new(Script::default()));

        {
            let mut s = script.lock();
            s.standing.insert(
                CommandCode::GetDeviceInfo.as_u16(),
                Reply::frame(ok(
                    CommandCode::GetDeviceInfo.as_u16(),
                    &device_info_body(&["HW1.2", "FW3.4.1", "CP0001", "RF2.0", "M-200", "RF0042"]),
                )),
            );
            s.standing.insert(
                CommandCode::StartInventory.as_u16(),
                Reply::frame(status(
                    CommandCode::StartInventory.as_u16(),
                    Status::INVENTORY_COMPLETE,
                    &[],
                )),
            );
        }

        let shared = script.clone();
        let accept = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone()));
            }
        });

        Self {
            addr,
            script,
            accept,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Fast-paced config pointing at this device.
    pub fn config(&self) -> ReaderConfig {
        ReaderConfig {
            timeout_ms: TEST_TIMEOUT_MS,
            settle_ms: 50,
            scan_interval_ms: 10,
            error_backoff_ms: 50,
            ..ReaderConfig::new("127.0.0.1", self.addr.port())
        }
    }

    /// Bytes written right after accepting, before any command.
    pub fn set_banner(&self, banner: &[u8]) {
        self.script.lock().banner = Some(banner.to_vec());
    }

    pub fn push_reply(&self, code: CommandCode, reply: Reply) {
        self.script
            .lock()
            .queued
            .entry(code.as_u16())
            .or_default()
            .push_back(reply);
    }

    pub fn set_reply(&self, code: CommandCode, reply: Reply) {
        self.script.lock().standing.insert(code.as_u16(), reply);
    }

    /// Commands received so far with this code.
    pub fn count(&self, code: CommandCode) -> usize {
        self.script
            .lock()
            .received
            .iter()
            .filter(|frame| frame.command == code.as_u16())
            .count()
    }

    /// Every command frame received, in order.
    pub fn received(&self) -> Vec<RawFrame> {
        self.script.lock().received.clone()
    }

    /// Wait until `count(code)` reaches `n`, up to one second.
    pub async fn wait_for(&self, code: CommandCode, n: usize) -> bool {
        for _ in 0..100 {
            if self.count(code) >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

async fn serve(mut stream: TcpStream, script: Arc<Mutex<Script>>) {
    let banner = script.lock().banner.clone();
    if let Some(banner) = banner {
        if stream.write_all(&banner).await.is_err() {
            return;
        }
    }

    let mut framed = Framed::new(stream, M200Codec::new());
    while let Some(Ok(frame)) = framed.next().await {
        let reply = {
            let mut s = script.lock();
            s.received.push(frame.clone());
            s.reply_for(frame.command)
        };
        if let Reply::Frames(frames) = reply {
            for frame in frames {
                if framed.send(frame).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Success response carrying `data`.
pub fn ok(code: u16, data: &[u8]) -> RawFrame {
    status(code, Status::SUCCESS, data)
}

pub fn status(code: u16, status: Status, data: &[u8]) -> RawFrame {
    RawFrame::response(0xFF, code, status, data).unwrap()
}

/// Unsolicited gate status push.
pub fn gate_push() -> RawFrame {
    ok(CommandCode::GateStatus.as_u16(), &[1, 0, 0, 0, 0, 7, 0, 0, 0, 3])
}

/// NUL-padded device-info body for the given field values.
pub fn device_info_body(fields: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    for (value, width) in fields.iter().zip(DEVICE_INFO_FIELDS) {
        let mut field = value.as_bytes().to_vec();
        field.resize(width, 0);
        body.extend_from_slice(&field);
    }
    body
}

/// One inventory record: RSSI magnitude, antenna, PC and EPC.
pub fn tag_record(rssi: u8, antenna: u8, epc: &[u8]) -> Vec<u8> {
    let mut record = vec![rssi, antenna, 0x30, 0x00, epc.len() as u8];
    record.extend_from_slice(epc);
    record
}
