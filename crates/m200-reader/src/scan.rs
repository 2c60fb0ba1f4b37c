//! Continuous inventory polling.
//!
//! A scan runs one bounded inventory cycle at a time and forwards every tag to
//! an mpsc sink:
//!
//! ```text
//! ┌───────────┐ read_single_tag ┌───────────┐  TagRead  ┌──────────┐
//! │ scan task │────────────────►│  session  │──────────►│   sink   │
//! └───────────┘◄── sleep ───────└───────────┘           └──────────┘
//! ```
//!
//! Failed cycles are logged and followed by a longer back-off; nothing but
//! cancellation ends the loop. Cancellation is only observed between
//! exchanges, so an inventory already on the wire always completes and the
//! stream is never left mid-frame.

use std::future::Future;
use std::time::Duration;

use m200_core::TagRead;
use m200_protocol::{Response, Status, catalog::parse_inventory_response};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ReaderConfig;

/// Why an inventory cycle produced no tags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Socket failure or timeout.
    #[error("transport: {0}")]
    Transport(String),
    /// Response could not be decoded.
    #[error("protocol: {0}")]
    Protocol(String),
    /// Reader answered with an error status.
    #[error("device status {0}")]
    Device(Status),
}

/// Result of one inventory cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryOutcome {
    Tags(Vec<TagRead>),
    NoTags,
    Error(InventoryError),
}

impl InventoryOutcome {
    /// Interpret an inventory response.
    ///
    /// `INVENTORY_COMPLETE` is the reader's way of saying no tag answered.
    pub fn from_response(response: &Response) -> Self {
        if response.status == Status::INVENTORY_COMPLETE {
            return Self::NoTags;
        }
        if !response.success() {
            warn!(status = %response.status, "Inventory rejected by device");
            return Self::Error(InventoryError::Device(response.status));
        }

        let tags = parse_inventory_response(&response.data);
        if tags.is_empty() {
            Self::NoTags
        } else {
            Self::Tags(tags)
        }
    }

    /// Tags of this cycle; empty for `NoTags` and errors.
    pub fn into_tags(self) -> Vec<TagRead> {
        match self {
            Self::Tags(tags) => tags,
            Self::NoTags | Self::Error(_) => Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Sleep lengths between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScanPacing {
    pub(crate) interval: Duration,
    pub(crate) backoff: Duration,
}

impl ScanPacing {
    pub(crate) fn from_config(config: &ReaderConfig) -> Self {
        Self {
            interval: config.scan_interval(),
            backoff: config.error_backoff(),
        }
    }
}

/// A running scan loop.
#[derive(Debug)]
pub(crate) struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScanTask {
    /// Spawn a loop calling `cycle` until stopped.
    pub(crate) fn spawn<F, Fut>(cycle: F, sink: mpsc::Sender<TagRead>, pacing: ScanPacing) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = InventoryOutcome> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_scan_loop(cycle, sink, pacing, cancel.clone()));
        Self { cancel, handle }
    }

    /// Cancel the loop and wait for the in-flight cycle to finish.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(error = %e, "Scan task panicked");
            }
        }
    }
}

async fn run_scan_loop<F, Fut>(
    mut cycle: F,
    sink: mpsc::Sender<TagRead>,
    pacing: ScanPacing,
    cancel: CancellationToken,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = InventoryOutcome>,
{
    debug!(
        interval_ms = pacing.interval.as_millis() as u64,
        backoff_ms = pacing.backoff.as_millis() as u64,
        "Scan loop started"
    );

    while !cancel.is_cancelled() {
        let pause = match cycle().await {
            InventoryOutcome::Tags(tags) => {
                trace!(count = tags.len(), "Inventory cycle found tags");
                for tag in tags {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        sent = sink.send(tag) => {
                            if sent.is_err() {
                                debug!("Tag sink closed, dropping tag");
                            }
                        }
                    }
                }
                pacing.interval
            }
            InventoryOutcome::NoTags => pacing.interval,
            // Device errors count as an empty cycle.
            InventoryOutcome::Error(InventoryError::Device(_)) => pacing.interval,
            InventoryOutcome::Error(e) => {
                warn!(error = %e, "Inventory cycle failed, backing off");
                pacing.backoff
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    debug!("Scan loop stopped");
}
