//! Reader connection settings.
//!
//! Settings are layered with figment, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. `M200_`-prefixed environment variables (`M200_HOST`, `M200_PORT`, ...)
//!
//! ```toml
//! host = "192.168.1.200"
//! port = 4001
//! timeout_ms = 3000
//! backend = "m200"
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use m200_core::{
    Error, Result,
    constants::{
        ADDRESS_BROADCAST, DEFAULT_ERROR_BACKOFF_MS, DEFAULT_MAX_RETRIES, DEFAULT_PORT,
        DEFAULT_SCAN_INTERVAL_MS, DEFAULT_SETTLE_MS, DEFAULT_TIMEOUT_MS,
    },
};
use serde::{Deserialize, Serialize};

/// Prefix of environment variables read by [`ReaderConfig::load`].
pub const ENV_PREFIX: &str = "M200_";

/// Which [`GateReader`](crate::GateReader) implementation to compose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// M-200 reader over TCP.
    #[default]
    M200,
    /// In-process simulated reader.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub host: String,
    pub port: u16,
    /// Bound on every connect, read and write.
    pub timeout_ms: u64,
    /// Frame address stamped on outgoing commands.
    pub address: u8,
    /// Pause after connecting before boot chatter is drained.
    pub settle_ms: u64,
    /// Reads per exchange before giving up on a matching response.
    pub max_retries: u32,
    pub scan_interval_ms: u64,
    pub error_backoff_ms: u64,
    /// Reject responses with a bad CRC instead of logging them.
    pub strict_crc: bool,
    pub backend: Backend,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.200".to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            address: ADDRESS_BROADCAST,
            settle_ms: DEFAULT_SETTLE_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
            strict_crc: false,
            backend: Backend::M200,
        }
    }
}

impl ReaderConfig {
    /// Defaults for a reader at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// The layered figment behind [`ReaderConfig::load`].
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load and validate settings.
    ///
    /// # Errors
    /// Returns `Error::Config` when a source cannot be parsed or a value is
    /// out of range.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)
            .extract()
            .map_err(|e| Error::Config(format!("Failed to load configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be non-zero".to_string()));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        Ok(())
    }

    /// `host:port` as passed to the socket.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 4001);
        assert_eq!(config.address, 0xFF);
        assert_eq!(config.backend, Backend::M200);
        assert!(!config.strict_crc);
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = ReaderConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, ReaderConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "reader.toml",
                r#"
                    host = "10.0.0.7"
                    port = 5000
                    timeout_ms = 1500
                    backend = "simulated"
                "#,
            )?;
            jail.set_env("M200_PORT", "6000");
            jail.set_env("M200_STRICT_CRC", "true");

            let config =
                ReaderConfig::load(Some(Path::new("reader.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.host, "10.0.0.7");
            assert_eq!(config.port, 6000);
            assert_eq!(config.timeout(), Duration::from_millis(1500));
            assert_eq!(config.backend, Backend::Simulated);
            assert!(config.strict_crc);
            assert_eq!(config.max_retries, 3);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        Jail::expect_with(|_jail| {
            let config =
                ReaderConfig::load(Some(Path::new("absent.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.port, 4001);
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        Jail::expect_with(|jail| {
            jail.set_env("M200_PORT", "0");
            assert!(matches!(ReaderConfig::load(None), Err(Error::Config(_))));
            Ok(())
        });

        let zero_timeout = ReaderConfig {
            timeout_ms: 0,
            ..ReaderConfig::default()
        };
        assert!(zero_timeout.validate().is_err());

        let zero_retries = ReaderConfig {
            max_retries: 0,
            ..ReaderConfig::default()
        };
        assert!(zero_retries.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        Jail::expect_with(|jail| {
            jail.create_file("reader.toml", "power = 26\nantenna_mask = 3\n")?;
            let config =
                ReaderConfig::load(Some(Path::new("reader.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config, ReaderConfig::default());
            Ok(())
        });
    }
}
