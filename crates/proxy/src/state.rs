use std::sync::Arc;

use common::api::ApiError;
use common::remote::RemoteStore;
use server::RemoteClient;

use crate::cache::{Cache, CacheError};
use crate::config::Config;
use crate::proxy::Proxy;

/// Shared proxy state handed to every request handler
#[derive(Debug, Clone)]
pub struct State {
    proxy: Arc<Proxy>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        let cache = Cache::open(&config.cache_dir, config.cache_capacity).await?;
        let remote = RemoteClient::new(&config.server_url)?;
        tracing::info!(server = %config.server_url, "using file server");

        Ok(Self::new(Arc::new(remote), Arc::new(cache), config.chunk_threshold))
    }

    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<Cache>, chunk_threshold: u64) -> Self {
        let proxy = Proxy::new(remote, cache).with_chunk_threshold(chunk_threshold);
        Self {
            proxy: Arc::new(proxy),
        }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("cache setup failed: {0}")]
    Cache(#[from] CacheError),
    #[error("file server client setup failed: {0}")]
    Client(#[from] ApiError),
}
