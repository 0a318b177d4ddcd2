use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

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

/// Signals a running service to stop
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<()>,
}

impl ShutdownHandle {
    pub fn new(tx: watch::Sender<()>) -> Self {
        Self { tx }
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// A service running in the background
pub struct RunningService {
    pub addr: SocketAddr,
    pub shutdown: ShutdownHandle,
    pub task: JoinHandle<Result<(), std::io::Error>>,
}

/// Bind and start serving in a background task.
pub async fn spawn_service(config: &Config) -> Result<RunningService, ServiceError> {
    let state = State::from_config(config).await?;
    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = watch::channel(());

    let task = tokio::spawn(http_server::run(listener, state, rx));

    Ok(RunningService {
        addr,
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
        Err(e) => tracing::error!(error = %e, "server task panicked"),
    }
    Ok(())
}
