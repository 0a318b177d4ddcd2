use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use server::ShutdownHandle;

use crate::config::Config;
use crate::http_server;
use crate::state::{State, StateSetupError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("state setup failed: {0}")]
    State(#[from] StateSetupError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A proxy serving its client API in the background
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub state: State,
    pub shutdown: ShutdownHandle,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

/// Build the proxy from `config`, bind, and serve in a background task.
pub async fn spawn_service(config: &Config) -> Result<RunningProxy, ServiceError> {
    let state = State::from_config(config).await?;
    spawn_with_state(state, config.listen_addr).await
}

/// Serve an already-built proxy on `listen_addr`.
pub async fn spawn_with_state(
    state: State,
    listen_addr: SocketAddr,
) -> Result<RunningProxy, ServiceError> {
    let listener = TcpListener::bind(listen_addr).await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = watch::channel(());

    let task = tokio::spawn(http_server::run(listener, state.clone(), rx));

    Ok(RunningProxy {
        addr,
        state,
        shutdown: ShutdownHandle::new(tx),
        task,
    })
}

/// Serve until ctrl-c.
pub async fn start_service(config: &Config) -> Result<(), ServiceError> {
    let service = spawn_service(config).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    service.shutdown.shutdown();

    match service.task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "proxy task panicked"),
    }

    let open = service.state.proxy().handles().len();
    if open > 0 {
        tracing::warn!(open, "shutting down with open handles; unsaved writes are lost");
    }
    Ok(())
}
