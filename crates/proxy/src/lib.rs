//! cachefs caching proxy
//!
//! Serves file descriptors to local clients out of an on-disk cache of a
//! remote `cachefs-server`, with close-to-open consistency: every open sees
//! the newest version on the server, and every write handle publishes a new
//! version when it closes.

pub mod cache;
pub mod config;
pub mod http_server;
pub mod process;
pub mod proxy;
pub mod state;

pub use cache::{Cache, CacheError, CacheStats, CachedEntry};
pub use config::Config as ProxyConfig;
pub use process::{spawn_service, spawn_with_state, start_service, RunningProxy};
pub use proxy::{LseekOption, OpenOption, Proxy, ProxyError};
pub use state::State as ServiceState;
