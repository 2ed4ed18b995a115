//! `botnet-registry`: live bot and monitor registry for the exercise platform.
//!
//! Tracks socket-connected bots per team and box, enforces one live bot per
//! `(team, box)` pair, and pushes team box summaries to subscribed monitor
//! sockets whenever a team's bot set changes. Everything here is a
//! process-lifetime index; nothing is persisted.
//!
//! The transport layer owns the actual connections. It hands the registry
//! handles implementing [`socket::BotSocket`] / [`socket::MonitorSocket`] and
//! calls into a shared [`manager::BotManager`] on connect and disconnect.
//!
//! ```no_run
//! use std::sync::Arc;
//! use botnet_registry::config::BotnetConfig;
//! use botnet_registry::manager::BotManager;
//!
//! # async fn run() {
//! let config = BotnetConfig::default();
//! let manager = Arc::new(BotManager::new(&config));
//! let token = tokio_util::sync::CancellationToken::new();
//! let sweeper = botnet_registry::sweep::spawn_sweeper(
//!     Arc::clone(&manager),
//!     config.sweep.interval(),
//!     token.clone(),
//! );
//! // ... hand `manager` to the connection handlers ...
//! token.cancel();
//! let _ = sweeper.await;
//! # }
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod record;
pub mod socket;
pub mod store;
pub mod sweep;

pub use error::{RegistryError, SocketError};
pub use manager::BotManager;
pub use record::{BotId, BotIdentity, BotRecord, BoxSummary, SocketId};
pub use store::RegistryStore;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BOTNET";

/// Default config filename looked up in the working directory.
pub const CONFIG_FILENAME: &str = "botnet.toml";
