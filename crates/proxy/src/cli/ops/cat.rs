use std::fmt;

use base64::Engine;
use clap::Args;
use owo_colors::OwoColorize;

use cachefs_proxy::http_server::api::v0::fd::{CloseRequest, OpenRequest, ReadRequest};
use cachefs_proxy::OpenOption;

use crate::cli::op::{CallError, Op, OpContext};

const READ_SIZE: usize = 1024 * 1024;

/// Print a file through the proxy
#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// Path on the file server
    pub path: String,
}

#[derive(Debug)]
pub enum CatContent {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug)]
pub struct CatOutput {
    pub path: String,
    pub size: usize,
    pub content: CatContent,
}

impl fmt::Display for CatOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}  {} {} bytes",
            "File:".dimmed(),
            self.path.bold(),
            "Size:".dimmed(),
            self.size
        )?;
        match &self.content {
            CatContent::Text(text) => write!(f, "{text}"),
            CatContent::Binary(bytes) => {
                let hex = bytes
                    .iter()
                    .take(256)
                    .map(|b| format!("{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "{} {hex}", "Binary content (hex):".dimmed())?;
                if bytes.len() > 256 {
                    write!(f, " {}", "...".dimmed())?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error("{0}")]
    Call(#[from] CallError),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

async fn read_all(ctx: &OpContext, fd: u64) -> Result<Vec<u8>, CatError> {
    let mut content = Vec::new();
    loop {
        let response = ctx
            .call(ReadRequest {
                fd,
                len: READ_SIZE,
            })
            .await?;
        if response.len == 0 {
            return Ok(content);
        }
        content.extend(base64::engine::general_purpose::STANDARD.decode(&response.data)?);
    }
}

#[async_trait::async_trait]
impl Op for Cat {
    type Error = CatError;
    type Output = CatOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let fd = ctx
            .call(OpenRequest {
                path: self.path.clone(),
                option: OpenOption::Read,
                client: None,
            })
            .await?
            .fd;

        let read = read_all(ctx, fd).await;
        ctx.call(CloseRequest { fd }).await?;
        let bytes = read?;

        let size = bytes.len();
        let content = match String::from_utf8(bytes) {
            Ok(text) => CatContent::Text(text),
            Err(e) => CatContent::Binary(e.into_bytes()),
        };
        Ok(CatOutput {
            path: self.path.clone(),
            size,
            content,
        })
    }
}
