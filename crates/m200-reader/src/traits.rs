//! Reader capability interface.
//!
//! [`GateReader`] is what the rest of a backend needs from a gate reader:
//! connection lifecycle plus a tag stream. The M-200 session and the
//! in-process simulator both implement it, and
//! [`AnyGateReader`](crate::AnyGateReader) picks one at composition time.
//!
//! Methods use native `async fn` in traits (Edition 2024), so the trait is
//! not object safe; dispatch goes through the enum wrapper instead of
//! `Box<dyn GateReader>`.

#![allow(async_fn_in_trait)]

use m200_core::{DeviceInfo, TagRead};
use tokio::sync::mpsc;

use crate::scan::InventoryOutcome;
use crate::session::ReaderSession;

/// A reader that can be connected and scanned for tags.
///
/// # Examples
///
/// ```no_run
/// use m200_reader::GateReader;
/// use tokio::sync::mpsc;
///
/// async fn watch<R: GateReader>(reader: &R) {
///     if !reader.connect().await {
///         return;
///     }
///     let (tx, mut rx) = mpsc::channel(64);
///     reader.start_scanning(tx).await;
///     while let Some(tag) = rx.recv().await {
///         println!("{} {} dBm", tag.epc, tag.rssi);
///     }
/// }
/// ```
pub trait GateReader {
    /// Open the connection. Failures are logged and reported as `false`.
    async fn connect(&self) -> bool;

    /// Stop scanning and close the connection. Idempotent.
    async fn disconnect(&self);

    /// Start polling inventory, sending every tag seen to `sink`.
    ///
    /// Returns `false` when already scanning or not connected.
    async fn start_scanning(&self, sink: mpsc::Sender<TagRead>) -> bool;

    /// Stop polling and wait for the in-flight cycle.
    async fn stop_scanning(&self);

    /// Run one inventory cycle.
    async fn read_single_tag(&self) -> InventoryOutcome;

    /// Identification cached at connect time.
    fn device_info(&self) -> Option<DeviceInfo>;

    fn is_connected(&self) -> bool;

    fn is_scanning(&self) -> bool;
}

impl GateReader for ReaderSession {
    async fn connect(&self) -> bool {
        ReaderSession::connect(self).await
    }

    async fn disconnect(&self) {
        ReaderSession::disconnect(self).await
    }

    async fn start_scanning(&self, sink: mpsc::Sender<TagRead>) -> bool {
        ReaderSession::start_scanning(self, sink).await
    }

    async fn stop_scanning(&self) {
        ReaderSession::stop_scanning(self).await
    }

    async fn read_single_tag(&self) -> InventoryOutcome {
        ReaderSession::read_single_tag(self).await
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        ReaderSession::device_info(self)
    }

    fn is_connected(&self) -> bool {
        ReaderSession::is_connected(self)
    }

    fn is_scanning(&self) -> bool {
        ReaderSession::is_scanning(self)
    }
}
