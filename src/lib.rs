//! # Shopdesk
//!
//! Client core for a repair-shop admin panel.
//!
//! The crate is built around two pieces:
//!
//! ## Router
//!
//! Maps the URL hash to handlers:
//! - [`Router`] - ordered `:param` patterns with a `*` fallback
//! - [`History`] - the browsing environment, with [`MemoryHistory`] in-process
//! - failures are recorded and redirected to a configurable error route
//!
//! ## Store
//!
//! Observable key/value application state:
//! - [`Store`] - JSON values with per-key and wildcard listeners
//! - Middleware pipeline able to transform or veto writes
//! - Snapshots persisted through a [`StorageBackend`](store::StorageBackend)
//! - [`Computed`](store::Computed) values derived from several keys
//!
//! Around them sit the REST client and per-collection services ([`api`]),
//! HTML widgets ([`widgets`]), TOML configuration ([`config`]) and the
//! [`App`] context that wires everything together.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod router;
pub mod store;
pub mod widgets;

pub use app::App;
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, RouterError, StorageError, StoreError};
pub use router::{History, MemoryHistory, Router};
pub use store::Store;
