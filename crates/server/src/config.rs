use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration for the file server
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the master copies
    pub root_dir: PathBuf,
    /// Address the HTTP API binds to
    pub listen_addr: SocketAddr,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn new(root_dir: impl Into<PathBuf>, listen_addr: SocketAddr) -> Self {
        Self {
            root_dir: root_dir.into(),
            listen_addr,
            log_level: tracing::Level::INFO,
        }
    }
}
