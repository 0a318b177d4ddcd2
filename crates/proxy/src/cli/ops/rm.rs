use clap::Args;
use owo_colors::OwoColorize;

use cachefs_proxy::http_server::api::v0::UnlinkRequest;

use crate::cli::op::{CallError, Op, OpContext};

/// Delete a file on the server through the proxy
#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Path on the file server
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error("{0}")]
    Call(#[from] CallError),
}

#[async_trait::async_trait]
impl Op for Rm {
    type Error = RmError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx
            .call(UnlinkRequest {
                path: self.path.clone(),
            })
            .await?;
        Ok(format!("{} {}", "Removed".green(), response.path.bold()))
    }
}
