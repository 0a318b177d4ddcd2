use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::build_info;
use common::version::BuildInfo;
use server::http_server::health::version::VersionRequest;

use crate::cli::op::{Op, OpContext};

/// Print the CLI version and, if reachable, the running proxy's
#[derive(Args, Debug, Clone)]
pub struct Version;

#[derive(Debug)]
pub struct VersionOutput {
    pub local: BuildInfo,
    pub daemon: Option<BuildInfo>,
}

impl fmt::Display for VersionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local)?;
        match &self.daemon {
            Some(daemon) => write!(f, "\n{} {}", "daemon:".dimmed(), daemon),
            None => write!(f, "\n{} {}", "daemon:".dimmed(), "not reachable".red()),
        }
    }
}

#[async_trait::async_trait]
impl Op for Version {
    type Error = std::convert::Infallible;
    type Output = VersionOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let daemon = ctx.client.call(VersionRequest {}).await.ok();
        Ok(VersionOutput {
            local: build_info!(),
            daemon,
        })
    }
}
