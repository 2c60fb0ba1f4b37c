//! Connection and session management for M-200 gate readers.
//!
//! A [`ReaderSession`] keeps one TCP connection to a reader and runs
//! synchronous command/response exchanges over it, while the reader may push
//! unsolicited frames on the same socket. On top of that it offers polling
//! inventory ([`ReaderSession::start_scanning`]) and typed device
//! configuration.
//!
//! # Layout
//!
//! - [`config`]: layered [`ReaderConfig`] (defaults, TOML, `M200_*` env)
//! - [`link`]: one exchange at a time over a byte stream
//! - [`session`]: lifecycle, cached device state, device operations
//! - [`scan`]: inventory outcomes and the scan loop
//! - [`fanout`]: splits the tag stream into persistence and broadcast
//! - [`config_store`]: persistence of confirmed settings
//! - [`traits`], [`devices`], [`mock`]: the [`GateReader`] capability, its
//!   enum dispatch and the simulated backend
//!
//! # Example
//!
//! ```no_run
//! use m200_reader::{ReaderConfig, ReaderSession, TagFanout};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> m200_core::Result<()> {
//! let config = ReaderConfig::load(None)?;
//! let session = ReaderSession::new(config);
//! if !session.connect().await {
//!     return Ok(());
//! }
//!
//! let (fanout, mut persisted) = TagFanout::new(256, 64);
//! let (sink, source) = mpsc::channel(256);
//! fanout.spawn(source);
//! session.start_scanning(sink).await;
//!
//! while let Some(tag) = persisted.recv().await {
//!     println!("{} on antenna {}", tag.epc, tag.antenna_port);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod config_store;
pub mod devices;
pub mod error;
pub mod fanout;
pub mod link;
pub mod mock;
pub mod scan;
pub mod session;
pub mod traits;

pub use config::{Backend, ENV_PREFIX, ReaderConfig};
pub use config_store::{ConfigChange, ConfigStore, NullConfigStore, TomlConfigStore};
pub use devices::AnyGateReader;
pub use error::{ReaderError, Result};
pub use fanout::{FanoutStats, TagFanout};
pub use link::FrameLink;
pub use mock::{SimulatedReader, SimulatedReaderHandle, SimulatedTag};
pub use scan::{InventoryError, InventoryOutcome};
pub use session::{ReaderSession, SessionState};
pub use traits::GateReader;
