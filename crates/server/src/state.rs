use std::sync::Arc;

use super::config::Config;
use crate::store::{MasterStore, StoreError};

/// Shared server state handed to every request handler
#[derive(Debug, Clone)]
pub struct State {
    store: Arc<MasterStore>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        let store = MasterStore::open(&config.root_dir).await?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn new(store: Arc<MasterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MasterStore {
        &self.store
    }

    pub fn store_handle(&self) -> Arc<MasterStore> {
        self.store.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("master store setup failed: {0}")]
    Store(#[from] StoreError),
}
