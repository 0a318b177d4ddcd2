//! cachefs master-copy server
//!
//! Holds the authoritative copy of every file, assigns versions, and serves
//! them to caching proxies over HTTP.

pub mod config;
pub mod http_server;
pub mod process;
pub mod state;
pub mod store;

pub use config::Config as ServiceConfig;
pub use http_server::api::RemoteClient;
pub use process::{spawn_service, start_service, RunningService, ShutdownHandle};
pub use state::State as ServiceState;
pub use store::{MasterStore, StoreError};
