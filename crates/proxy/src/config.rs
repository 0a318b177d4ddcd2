//! Proxy configuration
//!
//! Settings come from an optional `config.toml` in the platform config
//! directory (`~/.config/cachefs/config.toml` on Linux). Missing keys fall back
//! to defaults, and command-line flags override whatever the file says.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use common::remote::HUGE_FILE_SIZE;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_CACHE_CAPACITY: u64 = 512 * 1024 * 1024;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5090";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5080";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File server holding the master copies
    pub server_url: Url,
    /// Directory for cached copies
    pub cache_dir: PathBuf,
    /// Bytes of disk the cache may use
    pub cache_capacity: u64,
    /// Address of the client-facing API
    pub listen_addr: SocketAddr,
    /// Default log level; RUST_LOG overrides
    pub log_level: String,
    /// Files larger than this are transferred in chunks
    pub chunk_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        let cache_dir = project_dirs()
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".cachefs-cache"));

        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server url is valid"),
            cache_dir,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            listen_addr: DEFAULT_LISTEN_ADDR
                .parse()
                .expect("default listen address is valid"),
            log_level: "info".to_string(),
            chunk_threshold: HUGE_FILE_SIZE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid log level: {0}")]
    LogLevel(String),
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
    #[error("chunk threshold {0} exceeds the largest single upload of 10000000 bytes")]
    ChunkThreshold(u64),
}

impl Config {
    /// Load the config file at `path`, or the default location when `None`.
    ///
    /// An explicitly named file must exist. A missing file at the default
    /// location just yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match default_config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.chunk_threshold > HUGE_FILE_SIZE {
            return Err(ConfigError::ChunkThreshold(self.chunk_threshold));
        }
        self.level()?;
        Ok(())
    }

    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "cachefs")
}

/// `config.toml` inside the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            server_url = "http://files.internal:8080"
            cache_capacity = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.server_url.as_str(), "http://files.internal:8080/");
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR.parse().unwrap());
        assert_eq!(config.chunk_threshold, HUGE_FILE_SIZE);
        assert_eq!(config.level().unwrap(), tracing::Level::INFO);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml("cache_capacity = 0"),
            Err(ConfigError::ZeroCapacity)
        ));
        assert!(matches!(
            Config::from_toml("log_level = \"loud\""),
            Err(ConfigError::LogLevel(_))
        ));
        assert!(matches!(
            Config::from_toml(&format!("chunk_threshold = {}", HUGE_FILE_SIZE + 1)),
            Err(ConfigError::ChunkThreshold(_))
        ));
        assert!(Config::from_toml("chunk_threshold = 4096").is_ok());
        assert!(matches!(
            Config::from_toml("cache_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "listen_addr = \"0.0.0.0:7000\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:7000".parse().unwrap());

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}
