use std::path::PathBuf;

use clap::{Args, ValueEnum};
use owo_colors::OwoColorize;

use cachefs_proxy::http_server::api::v0::fd::{
    CloseRequest, LseekRequest, OpenRequest, WriteRequest,
};
use cachefs_proxy::{LseekOption, OpenOption};

use crate::cli::op::{CallError, Op, OpContext};

const WRITE_SIZE: usize = 1024 * 1024;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail if the file already exists
    New,
    /// Write from the start of the file, creating it if missing
    Overwrite,
    /// Write after the current end of the file, creating it if missing
    Append,
}

/// Write a local file through the proxy
#[derive(Args, Debug, Clone)]
pub struct Put {
    /// Path on the file server
    pub path: String,

    /// Local file to upload
    pub source: PathBuf,

    #[arg(long, value_enum, default_value = "new")]
    pub mode: PutMode,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error("{0}")]
    Call(#[from] CallError),
    #[error("failed to read {0}: {1}")]
    Source(PathBuf, std::io::Error),
}

async fn write_all(ctx: &OpContext, fd: u64, data: &[u8], mode: PutMode) -> Result<(), CallError> {
    if mode == PutMode::Append {
        ctx.call(LseekRequest {
            fd,
            pos: 0,
            whence: LseekOption::FromEnd,
        })
        .await?;
    }
    for chunk in data.chunks(WRITE_SIZE) {
        ctx.call(WriteRequest::new(fd, chunk)).await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl Op for Put {
    type Error = PutError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let data = tokio::fs::read(&self.source)
            .await
            .map_err(|e| PutError::Source(self.source.clone(), e))?;

        let option = match self.mode {
            PutMode::New => OpenOption::CreateExclusive,
            PutMode::Overwrite | PutMode::Append => OpenOption::Create,
        };
        let fd = ctx
            .call(OpenRequest {
                path: self.path.clone(),
                option,
                client: None,
            })
            .await?
            .fd;

        let written = write_all(ctx, fd, &data, self.mode).await;
        // close even after a failed write so the write copy is released
        let closed = ctx.call(CloseRequest { fd }).await;
        written?;
        closed?;

        Ok(format!(
            "{} {} bytes to {}",
            "Wrote".green(),
            data.len(),
            self.path.bold()
        ))
    }
}
