//! Persistence of reader settings the device has confirmed.
//!
//! A session only reports a change after the reader acknowledged it, so a
//! store never records a value the device rejected.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use m200_core::{Error, Result};
use parking_lot::Mutex;
use toml::{Table, Value};

/// A device setting confirmed by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    /// New IP and TCP port. Applies to the next connection.
    Network { ip: String, port: u16 },
    /// RF output power in dBm.
    Power(u8),
    /// Enabled antenna ports, one bit per port.
    AntennaMask(u8),
}

impl fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network { ip, port } => write!(f, "network {ip}:{port}"),
            Self::Power(dbm) => write!(f, "power {dbm} dBm"),
            Self::AntennaMask(mask) => write!(f, "antenna mask 0b{mask:08b}"),
        }
    }
}

/// Sink for confirmed configuration changes.
pub trait ConfigStore: Send + Sync {
    /// Record `change`.
    ///
    /// # Errors
    /// Returns an error when the change cannot be stored. Sessions log the
    /// error and keep the device-side change.
    fn persist(&self, change: &ConfigChange) -> Result<()>;
}

/// Store that discards every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConfigStore;

impl ConfigStore for NullConfigStore {
    fn persist(&self, _change: &ConfigChange) -> Result<()> {
        Ok(())
    }
}

/// Store that rewrites keys of a TOML file.
///
/// Keys written: `host`, `port`, `power` and `antenna_mask`. Other keys in
/// the file are kept, so the reader's config file can double as the store.
#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents, empty when the file does not exist yet.
    pub fn load(&self) -> Result<Table> {
        match fs::read_to_string(&self.path) {
            Ok(text) => text
                .parse::<Table>()
                .map_err(|e| Error::Config(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Table::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ConfigStore for TomlConfigStore {
    fn persist(&self, change: &ConfigChange) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut table = self.load()?;

        match change {
            ConfigChange::Network { ip, port } => {
                table.insert("host".into(), Value::String(ip.clone()));
                table.insert("port".into(), Value::Integer(i64::from(*port)));
            }
            ConfigChange::Power(dbm) => {
                table.insert("power".into(), Value::Integer(i64::from(*dbm)));
            }
            ConfigChange::AntennaMask(mask) => {
                table.insert("antenna_mask".into(), Value::Integer(i64::from(*mask)));
            }
        }

        let text = toml::to_string_pretty(&table)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {e}")))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, text)?;
        Ok(())
    }
}
