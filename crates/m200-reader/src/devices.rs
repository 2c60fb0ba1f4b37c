//! Enum dispatch over [`GateReader`] implementations.
//!
//! `GateReader` uses native `async fn` and cannot be boxed as a trait object,
//! so the backend chosen by [`ReaderConfig::backend`] is carried in
//! [`AnyGateReader`] instead.
//!
//! ```
//! use std::sync::Arc;
//! use m200_reader::{AnyGateReader, Backend, NullConfigStore, ReaderConfig};
//!
//! let config = ReaderConfig {
//!     backend: Backend::Simulated,
//!     ..ReaderConfig::default()
//! };
//! let reader = AnyGateReader::from_config(config, Arc::new(NullConfigStore));
//! assert!(reader.session().is_none());
//! ```

use std::sync::Arc;

use m200_core::{DeviceInfo, TagRead};
use tokio::sync::mpsc;

use crate::config::{Backend, ReaderConfig};
use crate::config_store::ConfigStore;
use crate::mock::SimulatedReader;
use crate::scan::InventoryOutcome;
use crate::session::ReaderSession;
use crate::traits::GateReader;

/// Any supported gate reader.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyGateReader {
    /// M-200 over TCP.
    M200(ReaderSession),
    /// In-process simulator.
    Simulated(SimulatedReader),
}

impl AnyGateReader {
    /// Compose the backend named by `config.backend`.
    ///
    /// The simulated backend ignores `store`; its handle is reachable through
    /// [`SimulatedReader::handle`].
    pub fn from_config(config: ReaderConfig, store: Arc<dyn ConfigStore>) -> Self {
        match config.backend {
            Backend::M200 => Self::M200(ReaderSession::with_store(config, store)),
            Backend::Simulated => Self::Simulated(SimulatedReader::from_config(&config).0),
        }
    }

    /// The M-200 session, for device configuration beyond the trait.
    pub fn session(&self) -> Option<&ReaderSession> {
        match self {
            Self::M200(session) => Some(session),
            Self::Simulated(_) => None,
        }
    }
}

impl From<ReaderSession> for AnyGateReader {
    fn from(session: ReaderSession) -> Self {
        Self::M200(session)
    }
}

impl From<SimulatedReader> for AnyGateReader {
    fn from(reader: SimulatedReader) -> Self {
        Self::Simulated(reader)
    }
}

impl GateReader for AnyGateReader {
    async fn connect(&self) -> bool {
        match self {
            Self::M200(reader) => reader.connect().await,
            Self::Simulated(reader) => reader.connect().await,
        }
    }

    async fn disconnect(&self) {
        match self {
            Self::M200(reader) => reader.disconnect().await,
            Self::Simulated(reader) => reader.disconnect().await,
        }
    }

    async fn start_scanning(&self, sink: mpsc::Sender<TagRead>) -> bool {
        match self {
            Self::M200(reader) => reader.start_scanning(sink).await,
            Self::Simulated(reader) => reader.start_scanning(sink).await,
        }
    }

    async fn stop_scanning(&self) {
        match self {
            Self::M200(reader) => reader.stop_scanning().await,
            Self::Simulated(reader) => reader.stop_scanning().await,
        }
    }

    async fn read_single_tag(&self) -> InventoryOutcome {
        match self {
            Self::M200(reader) => reader.read_single_tag().await,
            Self::Simulated(reader) => reader.read_single_tag().await,
        }
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        match self {
            Self::M200(reader) => reader.device_info(),
            Self::Simulated(reader) => reader.device_info(),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::M200(reader) => reader.is_connected(),
            Self::Simulated(reader) => reader.is_connected(),
        }
    }

    fn is_scanning(&self) -> bool {
        match self {
            Self::M200(reader) => reader.is_scanning(),
            Self::Simulated(reader) => reader.is_scanning(),
        }
    }
}
