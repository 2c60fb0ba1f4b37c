//! Connection manager for one M-200 reader.
//!
//! A [`ReaderSession`] owns the reader's TCP socket. It is a cheap cloneable
//! handle: the scan task and any number of callers share one session and
//! their exchanges are serialized, one command on the wire at a time.
//!
//! # Lifecycle
//!
//! ```text
//!               connect()                start_scanning()
//! Disconnected ───────────► Connected ─────────────────► Scanning
//!      ▲                       │  ▲                         │
//!      │      disconnect()     │  └──── stop_scanning() ────┘
//!      └───────────────────────┴──────────── disconnect() ──┘
//! ```
//!
//! # Device operations
//!
//! Wrappers such as [`ReaderSession::set_power`] turn every failure into a
//! logged `None` or `false`. Cached device state (power level, antenna mask)
//! changes only after the reader acknowledged the new value, and confirmed
//! changes are handed to the session's [`ConfigStore`].
//!
//! # Example
//!
//! ```no_run
//! use m200_reader::{ReaderConfig, ReaderSession};
//!
//! # async fn example() {
//! let session = ReaderSession::new(ReaderConfig::new("192.168.1.200", 4001));
//! if session.connect().await {
//!     if let Some(power) = session.get_power().await {
//!         println!("RF power: {power} dBm");
//!     }
//!     session.disconnect().await;
//! }
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use m200_core::{DeviceInfo, TagRead};
use m200_protocol::{
    Command, Response,
    catalog::{
        self, AllParams, GateParams, GateStatus, GpioState, InventoryMode, IoParams,
        NetworkParams, QueryParams, RelayAction, RssiFilter, SelectMask, TagMemoryAccess,
    },
    decode_response,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::ReaderConfig;
use crate::config_store::{ConfigChange, ConfigStore, NullConfigStore};
use crate::error::{ReaderError, Result};
use crate::link::FrameLink;
use crate::scan::{InventoryError, InventoryOutcome, ScanPacing, ScanTask};

/// Externally visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Connected,
    Scanning,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Scanning => write!(f, "scanning"),
        }
    }
}

/// State guarded by a synchronous lock, never held across an await.
#[derive(Debug, Default)]
struct DeviceState {
    connected: bool,
    scan: Option<ScanTask>,
    device_info: Option<DeviceInfo>,
    power_level: Option<u8>,
    antenna_mask: Option<u8>,
}

struct Inner {
    config: ReaderConfig,
    link: AsyncMutex<Option<FrameLink<TcpStream>>>,
    state: Mutex<DeviceState>,
    store: Arc<dyn ConfigStore>,
}

/// Shared handle to one reader connection.
#[derive(Clone)]
pub struct ReaderSession {
    inner: Arc<Inner>,
}

impl fmt::Debug for ReaderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderSession")
            .field("addr", &self.inner.config.addr())
            .field("state", &self.state())
            .finish()
    }
}

impl ReaderSession {
    /// Session that does not persist configuration changes.
    pub fn new(config: ReaderConfig) -> Self {
        Self::with_store(config, Arc::new(NullConfigStore))
    }

    pub fn with_store(config: ReaderConfig, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                link: AsyncMutex::new(None),
                state: Mutex::new(DeviceState::default()),
                store,
            }),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        let state = self.inner.state.lock();
        if !state.connected {
            SessionState::Disconnected
        } else if state.scan.is_some() {
            SessionState::Scanning
        } else {
            SessionState::Connected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().connected
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.state.lock().scan.is_some()
    }

    /// Device info cached by the last successful query.
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.inner.state.lock().device_info.clone()
    }

    /// RF power last confirmed by the reader.
    pub fn power_level(&self) -> Option<u8> {
        self.inner.state.lock().power_level
    }

    /// Antenna mask last confirmed by the reader.
    pub fn antenna_mask(&self) -> Option<u8> {
        self.inner.state.lock().antenna_mask
    }

    /// Open the socket and check the reader answers.
    ///
    /// Returns `true` right away when already connected. Connect failures
    /// and timeouts are logged and reported as `false`. A reader that
    /// accepts the connection but fails the device-info query still counts
    /// as connected.
    pub async fn connect(&self) -> bool {
        // Concurrent connects queue on the link lock; only the first opens a socket.
        let mut slot = self.inner.link.lock().await;
        if self.is_connected() {
            return true;
        }

        let config = &self.inner.config;
        let addr = config.addr();
        info!(%addr, "Connecting to reader");

        let stream = match tokio::time::timeout(config.timeout(), TcpStream::connect(&addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!(%addr, error = %e, "Connection failed");
                return false;
            }
            Err(_) => {
                error!(
                    %addr,
                    error = %ReaderError::ConnectionTimeout(config.timeout_ms),
                    "Connection failed"
                );
                return false;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "Failed to set TCP_NODELAY");
        }

        let mut link = FrameLink::new(stream, config.timeout());
        tokio::time::sleep(config.settle()).await;
        let drained = link.drain_pending();
        if drained > 0 {
            debug!(bytes = drained, "Discarded buffered boot output");
        }

        *slot = Some(link);
        self.inner.state.lock().connected = true;
        drop(slot);
        info!(%addr, "Connected to reader");

        match self.get_device_info().await {
            Some(info) => info!(device = %info, "Reader identified"),
            None => warn!(%addr, "Reader did not report device info, staying connected"),
        }
        true
    }

    /// Stop scanning, close the socket and forget cached device info.
    ///
    /// The session reads as disconnected before this first awaits, so a
    /// concurrent `start_scanning` is refused while the link is released.
    pub async fn disconnect(&self) {
        if let Some(task) = self.detach() {
            task.stop().await;
            // The link is still open here, so the reader can be told to stop.
            if !self.stop_inventory().await {
                warn!("Reader did not acknowledge stop inventory");
            }
            info!(addr = %self.inner.config.addr(), "Scanning stopped");
        }

        let (link, late_scan) = {
            let mut slot = self.inner.link.lock().await;
            (slot.take(), self.detach())
        };
        // A connect queued ahead of us may have let a scan start again.
        if let Some(task) = late_scan {
            task.stop().await;
        }
        if let Some(link) = link {
            link.close().await;
            info!(addr = %self.inner.config.addr(), "Disconnected from reader");
        }
    }

    /// Mark the session disconnected and take its scan task, in one step.
    fn detach(&self) -> Option<ScanTask> {
        let mut state = self.inner.state.lock();
        state.connected = false;
        state.device_info = None;
        state.scan.take()
    }

    /// Send `command` and return the raw response frame.
    ///
    /// The command is re-addressed to the configured reader address. See
    /// [`FrameLink::execute`] for what the returned bytes can hold.
    ///
    /// # Errors
    ///
    /// [`ReaderError::NotConnected`] without an open socket, otherwise the
    /// transport and timeout errors of [`FrameLink::execute`].
    pub async fn execute(&self, command: &Command, max_retries: u32) -> Result<Bytes> {
        let command = command.clone().with_address(self.inner.config.address);
        let mut link = self.inner.link.lock().await;
        let link = link.as_mut().ok_or(ReaderError::NotConnected)?;
        link.execute(&command, max_retries).await
    }

    /// Execute and decode, whatever the status.
    pub async fn request(&self, command: &Command) -> Result<Response> {
        let raw = self.execute(command, self.inner.config.max_retries).await?;
        Ok(decode_response(&raw, self.inner.config.strict_crc)?)
    }

    /// Execute and decode, turning a non-success status into
    /// [`ReaderError::Device`].
    pub async fn call(&self, command: &Command) -> Result<Response> {
        let response = self.request(command).await?;
        if !response.success() {
            return Err(ReaderError::Device {
                command: command.code().to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    async fn acknowledge(&self, command: &Command) -> Option<Response> {
        match self.call(command).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(command = %command.code(), error = %e, "Command failed");
                None
            }
        }
    }

    async fn query<T>(
        &self,
        command: &Command,
        parse: impl FnOnce(&[u8]) -> m200_core::Result<T>,
    ) -> Option<T> {
        let response = self.acknowledge(command).await?;
        match parse(&response.data[..]) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(command = %command.code(), error = %e, "Unparseable response");
                None
            }
        }
    }

    /// Hand a confirmed change to the store on the blocking pool.
    async fn persist(&self, change: ConfigChange) {
        let store = Arc::clone(&self.inner.store);
        let outcome = tokio::task::spawn_blocking(move || {
            let result = store.persist(&change);
            (change, result)
        })
        .await;

        match outcome {
            Ok((change, Ok(()))) => debug!(%change, "Persisted confirmed change"),
            Ok((change, Err(e))) => {
                warn!(%change, error = %e, "Failed to persist confirmed change")
            }
            Err(e) => error!(error = %e, "Config store task failed"),
        }
    }

    pub async fn module_init(&self) -> bool {
        self.acknowledge(&catalog::module_init()).await.is_some()
    }

    /// Query and cache the reader's identification strings.
    pub async fn get_device_info(&self) -> Option<DeviceInfo> {
        let response = self.acknowledge(&catalog::get_device_info()).await?;
        let info = catalog::parse_device_info(&response.data);
        if !info.is_complete() {
            debug!(fields = info.fields_present, "Device info truncated");
        }
        self.inner.state.lock().device_info = Some(info.clone());
        Some(info)
    }

    pub async fn set_power(&self, power_dbm: u8) -> bool {
        let Some(command) = build(catalog::set_power(power_dbm)) else {
            return false;
        };
        if self.acknowledge(&command).await.is_none() {
            return false;
        }
        self.inner.state.lock().power_level = Some(power_dbm);
        info!(power_dbm, "RF power set");
        self.persist(ConfigChange::Power(power_dbm)).await;
        true
    }

    pub async fn get_power(&self) -> Option<u8> {
        let power = self.query(&catalog::get_power(), catalog::parse_power).await?;
        self.inner.state.lock().power_level = Some(power);
        Some(power)
    }

    pub async fn get_network_config(&self) -> Option<NetworkParams> {
        self.query(&catalog::get_network_params(), catalog::parse_network_params)
            .await
    }

    /// Change the reader's IP settings. The current connection stays on the
    /// old address.
    pub async fn set_network_config(&self, params: &NetworkParams) -> bool {
        let Some(command) = build(catalog::set_network_params(params)) else {
            return false;
        };
        if self.acknowledge(&command).await.is_none() {
            return false;
        }
        info!(ip = %params.ip, port = params.port, "Network settings changed");
        self.persist(ConfigChange::Network {
            ip: params.ip.to_string(),
            port: params.port,
        })
        .await;
        true
    }

    pub async fn get_all_params(&self) -> Option<AllParams> {
        let params = self
            .query(&catalog::get_all_params(), catalog::parse_all_params)
            .await?;
        let mut state = self.inner.state.lock();
        state.power_level = Some(params.power);
        state.antenna_mask = Some(params.antenna_mask);
        Some(params)
    }

    pub async fn set_all_params(&self, params: &AllParams) -> bool {
        let Some(command) = build(catalog::set_all_params(params)) else {
            return false;
        };
        if self.acknowledge(&command).await.is_none() {
            return false;
        }
        {
            let mut state = self.inner.state.lock();
            state.power_level = Some(params.power);
            state.antenna_mask = Some(params.antenna_mask);
        }
        self.persist(ConfigChange::Power(params.power)).await;
        self.persist(ConfigChange::AntennaMask(params.antenna_mask)).await;
        true
    }

    pub async fn get_io_params(&self) -> Option<IoParams> {
        self.query(&catalog::get_io_params(), catalog::parse_io_params)
            .await
    }

    pub async fn set_io_params(&self, params: &IoParams) -> bool {
        self.acknowledge(&catalog::set_io_params(params))
            .await
            .is_some()
    }

    pub async fn get_rssi_filter(&self, antenna: u8) -> Option<RssiFilter> {
        self.query(&catalog::get_rssi_filter(antenna), catalog::parse_rssi_filter)
            .await
    }

    pub async fn set_rssi_filter(&self, filter: &RssiFilter) -> bool {
        self.acknowledge(&catalog::set_rssi_filter(filter))
            .await
            .is_some()
    }

    pub async fn get_gpio(&self) -> Option<GpioState> {
        self.query(&catalog::get_gpio(), catalog::parse_gpio).await
    }

    pub async fn set_gpio(&self, pin_mask: u8, level_mask: u8) -> bool {
        self.acknowledge(&catalog::set_gpio(pin_mask, level_mask))
            .await
            .is_some()
    }

    pub async fn control_relay(&self, relay: u8, action: RelayAction, hold_secs: u8) -> bool {
        let Some(command) = build(catalog::control_relay(relay, action, hold_secs)) else {
            return false;
        };
        self.acknowledge(&command).await.is_some()
    }

    pub async fn get_gate_status(&self) -> Option<GateStatus> {
        self.query(&catalog::get_gate_status(), catalog::parse_gate_status)
            .await
    }

    pub async fn get_gate_params(&self) -> Option<GateParams> {
        self.query(&catalog::get_gate_params(), catalog::parse_gate_params)
            .await
    }

    pub async fn set_gate_params(&self, params: &GateParams) -> bool {
        self.acknowledge(&catalog::set_gate_params(params))
            .await
            .is_some()
    }

    pub async fn get_eas_mask(&self) -> Option<Vec<u8>> {
        self.query(&catalog::get_eas_mask(), catalog::parse_eas_mask)
            .await
    }

    pub async fn set_eas_mask(&self, mask: &[u8]) -> bool {
        let Some(command) = build(catalog::set_eas_mask(mask)) else {
            return false;
        };
        self.acknowledge(&command).await.is_some()
    }

    /// Start a reader-driven inventory. Tags are then pushed unsolicited.
    pub async fn start_inventory(&self, mode: InventoryMode) -> bool {
        self.acknowledge(&catalog::start_inventory(mode))
            .await
            .is_some()
    }

    pub async fn stop_inventory(&self) -> bool {
        self.acknowledge(&catalog::stop_inventory()).await.is_some()
    }

    /// Raw memory words of the selected tag.
    pub async fn read_tag_memory(&self, access: &TagMemoryAccess) -> Option<Bytes> {
        let command = build(catalog::read_tag_memory(access))?;
        let response = self.acknowledge(&command).await?;
        Some(response.data)
    }

    pub async fn write_tag_memory(&self, access: &TagMemoryAccess, data: &[u8]) -> bool {
        let Some(command) = build(catalog::write_tag_memory(access, data)) else {
            return false;
        };
        self.acknowledge(&command).await.is_some()
    }

    pub async fn select_tag(&self, select: &SelectMask) -> bool {
        let Some(command) = build(catalog::select_tag(select)) else {
            return false;
        };
        self.acknowledge(&command).await.is_some()
    }

    pub async fn get_query_params(&self) -> Option<QueryParams> {
        self.query(&catalog::get_query_params(), catalog::parse_query_params)
            .await
    }

    pub async fn set_query_params(&self, params: &QueryParams) -> bool {
        let Some(command) = build(catalog::set_query_params(params)) else {
            return false;
        };
        self.acknowledge(&command).await.is_some()
    }

    /// Run one bounded inventory cycle.
    pub async fn read_single_tag(&self) -> InventoryOutcome {
        match self.request(&catalog::single_cycle_inventory()).await {
            Ok(response) => InventoryOutcome::from_response(&response),
            Err(ReaderError::Protocol(e)) => {
                InventoryOutcome::Error(InventoryError::Protocol(e.to_string()))
            }
            Err(e) => InventoryOutcome::Error(InventoryError::Transport(e.to_string())),
        }
    }

    /// Start polling inventory in a background task, sending tags to `sink`.
    ///
    /// Returns `false` with a warning when already scanning or not connected.
    pub async fn start_scanning(&self, sink: mpsc::Sender<TagRead>) -> bool {
        let mut state = self.inner.state.lock();
        if state.scan.is_some() {
            warn!("Already scanning");
            return false;
        }
        if !state.connected {
            warn!("Cannot start scanning while disconnected");
            return false;
        }

        let session = self.clone();
        let cycle = move || {
            let session = session.clone();
            async move { session.read_single_tag().await }
        };
        state.scan = Some(ScanTask::spawn(
            cycle,
            sink,
            ScanPacing::from_config(&self.inner.config),
        ));
        info!(addr = %self.inner.config.addr(), "Scanning started");
        true
    }

    /// Stop the scan task, then ask the reader to stop inventory.
    ///
    /// Waits for an in-flight cycle to complete. Does nothing when not
    /// scanning.
    pub async fn stop_scanning(&self) {
        let task = self.inner.state.lock().scan.take();
        let Some(task) = task else {
            debug!("Not scanning");
            return;
        };
        task.stop().await;

        if self.is_connected() && !self.stop_inventory().await {
            warn!("Reader did not acknowledge stop inventory");
        }
        info!(addr = %self.inner.config.addr(), "Scanning stopped");
    }
}

/// Log and drop a command whose parameters failed validation.
fn build(command: m200_core::Result<Command>) -> Option<Command> {
    command
        .inspect_err(|e| warn!(error = %e, "Invalid command parameters"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> ReaderConfig {
        ReaderConfig {
            timeout_ms: 200,
            settle_ms: 0,
            ..ReaderConfig::new("127.0.0.1", 1)
        }
    }

    #[tokio::test]
    async fn test_new_session_is_disconnected() {
        let session = ReaderSession::new(unreachable_config());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.device_info().is_none());
        assert!(session.power_level().is_none());
    }

    #[tokio::test]
    async fn test_connect_refused_returns_false() {
        let session = ReaderSession::new(unreachable_config());
        assert!(!session.connect().await);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_operations_without_connection() {
        let session = ReaderSession::new(unreachable_config());

        let err = session
            .execute(&catalog::get_power(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::NotConnected));

        assert!(session.get_power().await.is_none());
        assert!(!session.set_power(20).await);
        assert!(matches!(
            session.read_single_tag().await,
            InventoryOutcome::Error(InventoryError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_scanning_requires_connection() {
        let session = ReaderSession::new(unreachable_config());
        let (tx, _rx) = mpsc::channel(8);
        assert!(!session.start_scanning(tx).await);
        assert!(!session.is_scanning());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let session = ReaderSession::new(unreachable_config());
        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_invalid_parameters_never_reach_the_wire() {
        let session = ReaderSession::new(unreachable_config());
        assert!(!session.set_power(31).await);
        assert!(!session.control_relay(3, RelayAction::Close, 0).await);
        assert!(!session.set_eas_mask(&[0; 63]).await);
    }
}
