use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;
use url::Url;

use cachefs_proxy::config::ConfigError;
use cachefs_proxy::process::ServiceError;
use cachefs_proxy::{start_service, ProxyConfig};

/// Run the caching proxy in the foreground
#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// File server URL
    #[arg(long, env = "CACHEFS_SERVER")]
    pub server_url: Option<Url>,

    /// Directory for cached copies
    #[arg(long, env = "CACHEFS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cache capacity in bytes
    #[arg(long, env = "CACHEFS_CACHE_CAPACITY")]
    pub cache_capacity: Option<u64>,

    /// Address for the client API
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Default log level (RUST_LOG overrides)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("proxy failed: {0}")]
    Service(#[from] ServiceError),
}

impl Daemon {
    /// Apply command-line overrides on top of the loaded config.
    fn apply(&self, mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(capacity) = self.cache_capacity {
            config.cache_capacity = capacity;
        }
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = ProxyConfig::load(ctx.config_path.as_deref())?;
        let config = self.apply(config)?;
        let _guard = common::logging::init(config.level()?);

        tracing::info!(
            server = %config.server_url,
            cache_dir = %config.cache_dir.display(),
            capacity = config.cache_capacity,
            listen = %config.listen_addr,
            "starting cachefs proxy"
        );
        start_service(&config).await?;
        Ok("proxy stopped".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let daemon = Daemon {
            server_url: None,
            cache_dir: Some(PathBuf::from("/tmp/cachefs-test")),
            cache_capacity: Some(4096),
            listen: None,
            log_level: Some("debug".to_string()),
        };

        let config = daemon.apply(ProxyConfig::default()).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cachefs-test"));
        assert_eq!(config.cache_capacity, 4096);
        assert_eq!(config.level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(config.server_url, ProxyConfig::default().server_url);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let daemon = Daemon {
            server_url: None,
            cache_dir: None,
            cache_capacity: Some(0),
            listen: None,
            log_level: None,
        };
        assert!(daemon.apply(ProxyConfig::default()).is_err());
    }
}
