//! In-process simulated gate reader.
//!
//! [`SimulatedReader`] behaves like a connected M-200 without a socket: tags
//! placed in its field through a [`SimulatedReaderHandle`] are reported by
//! every inventory cycle until removed. Useful for running a backend without
//! hardware and for testing tag consumers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use m200_core::{DeviceInfo, TagRead};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::scan::{InventoryError, InventoryOutcome, ScanPacing, ScanTask};
use crate::traits::GateReader;

const DEFAULT_NAME: &str = "Simulated M-200";

/// A tag sitting in the simulated RF field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTag {
    pub epc: String,
    pub rssi: i16,
    pub antenna_port: u8,
    pub pc: u16,
}

impl SimulatedTag {
    /// Tag on antenna 1 with a 96-bit EPC PC word.
    pub fn new(epc: impl Into<String>) -> Self {
        Self {
            epc: epc.into().to_uppercase(),
            rssi: -55,
            antenna_port: 1,
            pc: 0x3000,
        }
    }

    #[must_use]
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    #[must_use]
    pub fn on_antenna(mut self, antenna_port: u8) -> Self {
        self.antenna_port = antenna_port;
        self
    }

    fn read(&self) -> TagRead {
        TagRead::new(self.epc.clone(), self.rssi, self.antenna_port, self.pc)
    }
}

#[derive(Debug)]
struct SimState {
    reachable: bool,
    connected: bool,
    field: BTreeMap<String, SimulatedTag>,
    failures_pending: u32,
    cycles: u64,
    scan: Option<ScanTask>,
}

struct Shared {
    name: String,
    pacing: ScanPacing,
    state: Mutex<SimState>,
}

/// Simulated reader. Clones share one device.
///
/// # Examples
///
/// ```
/// use m200_reader::{GateReader, InventoryOutcome, SimulatedReader, SimulatedTag};
///
/// #[tokio::main]
/// async fn main() {
///     let (reader, handle) = SimulatedReader::new();
///     handle.place_tag(SimulatedTag::new("E2801160600002"));
///
///     assert!(reader.connect().await);
///     match reader.read_single_tag().await {
///         InventoryOutcome::Tags(tags) => assert_eq!(tags[0].epc, "E2801160600002"),
///         other => panic!("unexpected {other:?}"),
///     }
/// }
/// ```
#[derive(Clone)]
pub struct SimulatedReader {
    shared: Arc<Shared>,
}

impl fmt::Debug for SimulatedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SimulatedReader")
            .field("name", &self.shared.name)
            .field("connected", &state.connected)
            .field("tags", &state.field.len())
            .finish()
    }
}

impl SimulatedReader {
    /// Reader with default pacing, plus the handle that drives it.
    pub fn new() -> (Self, SimulatedReaderHandle) {
        Self::with_name(DEFAULT_NAME)
    }

    pub fn with_name(name: impl Into<String>) -> (Self, SimulatedReaderHandle) {
        Self::build(name.into(), ScanPacing::from_config(&ReaderConfig::default()))
    }

    /// Reader paced by `config`'s scan interval and back-off.
    pub fn from_config(config: &ReaderConfig) -> (Self, SimulatedReaderHandle) {
        Self::build(
            format!("{DEFAULT_NAME} @ {}", config.addr()),
            ScanPacing::from_config(config),
        )
    }

    fn build(name: String, pacing: ScanPacing) -> (Self, SimulatedReaderHandle) {
        let reader = Self {
            shared: Arc::new(Shared {
                name,
                pacing,
                state: Mutex::new(SimState {
                    reachable: true,
                    connected: false,
                    field: BTreeMap::new(),
                    failures_pending: 0,
                    cycles: 0,
                    scan: None,
                }),
            }),
        };
        let handle = reader.handle();
        (reader, handle)
    }

    /// Another handle to this reader.
    pub fn handle(&self) -> SimulatedReaderHandle {
        SimulatedReaderHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl GateReader for SimulatedReader {
    async fn connect(&self) -> bool {
        let mut state = self.shared.state.lock();
        if !state.reachable {
            warn!(reader = %self.shared.name, "Simulated reader unreachable");
            return false;
        }
        if !state.connected {
            state.connected = true;
            info!(reader = %self.shared.name, "Connected to simulated reader");
        }
        true
    }

    async fn disconnect(&self) {
        if self.is_scanning() {
            self.stop_scanning().await;
        }
        let mut state = self.shared.state.lock();
        if state.connected {
            state.connected = false;
            info!(reader = %self.shared.name, "Disconnected from simulated reader");
        }
    }

    async fn start_scanning(&self, sink: mpsc::Sender<TagRead>) -> bool {
        let mut state = self.shared.state.lock();
        if state.scan.is_some() {
            warn!("Already scanning");
            return false;
        }
        if !state.connected {
            warn!("Cannot start scanning while disconnected");
            return false;
        }

        let reader = self.clone();
        let cycle = move || {
            let reader = reader.clone();
            async move { reader.read_single_tag().await }
        };
        state.scan = Some(ScanTask::spawn(cycle, sink, self.shared.pacing));
        info!(reader = %self.shared.name, "Scanning started");
        true
    }

    async fn stop_scanning(&self) {
        let task = self.shared.state.lock().scan.take();
        if let Some(task) = task {
            task.stop().await;
            info!(reader = %self.shared.name, "Scanning stopped");
        }
    }

    async fn read_single_tag(&self) -> InventoryOutcome {
        let mut state = self.shared.state.lock();
        if !state.connected {
            return InventoryOutcome::Error(InventoryError::Transport(
                "not connected".to_string(),
            ));
        }

        state.cycles += 1;
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            debug!(cycle = state.cycles, "Injecting simulated cycle failure");
            return InventoryOutcome::Error(InventoryError::Transport(
                "simulated read timeout".to_string(),
            ));
        }

        if state.field.is_empty() {
            InventoryOutcome::NoTags
        } else {
            InventoryOutcome::Tags(state.field.values().map(SimulatedTag::read).collect())
        }
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        if !self.is_connected() {
            return None;
        }
        Some(DeviceInfo {
            cp_hardware_version: "SIM".to_string(),
            cp_firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            cp_serial: "000000000000".to_string(),
            module_hardware_version: "SIM".to_string(),
            module_name: self.shared.name.clone(),
            module_serial: "000000000000".to_string(),
            fields_present: 6,
        })
    }

    fn is_connected(&self) -> bool {
        self.shared.state.lock().connected
    }

    fn is_scanning(&self) -> bool {
        self.shared.state.lock().scan.is_some()
    }
}

/// Controls what a [`SimulatedReader`] sees.
#[derive(Clone)]
pub struct SimulatedReaderHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for SimulatedReaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedReaderHandle")
            .field("name", &self.shared.name)
            .finish()
    }
}

impl SimulatedReaderHandle {
    /// Put `tag` in the field, replacing a tag with the same EPC.
    pub fn place_tag(&self, tag: SimulatedTag) {
        self.shared.state.lock().field.insert(tag.epc.clone(), tag);
    }

    /// Take a tag out of the field. Returns whether it was there.
    pub fn remove_tag(&self, epc: &str) -> bool {
        self.shared
            .state
            .lock()
            .field
            .remove(&epc.to_uppercase())
            .is_some()
    }

    pub fn clear_tags(&self) {
        self.shared.state.lock().field.clear();
    }

    /// Make the next `connect` fail, or succeed again.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.state.lock().reachable = reachable;
    }

    /// Make the next `count` inventory cycles fail with a transport error.
    pub fn fail_next_cycles(&self, count: u32) {
        self.shared.state.lock().failures_pending = count;
    }

    /// Inventory cycles run while connected.
    pub fn cycles(&self) -> u64 {
        self.shared.state.lock().cycles
    }
}
