use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use cachefs_proxy::http_server::api::v0::CacheStatsRequest;
use cachefs_proxy::CacheStats;

use crate::cli::op::{CallError, Op, OpContext};

/// Show cache usage of a running proxy
#[derive(Args, Debug, Clone)]
pub struct Stats;

#[derive(Debug)]
pub struct StatsOutput(pub CacheStats);

impl fmt::Display for StatsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.0;
        let percent = if stats.capacity == 0 {
            0.0
        } else {
            stats.current_size as f64 * 100.0 / stats.capacity as f64
        };

        writeln!(f, "{}:", "Cache".bold())?;
        writeln!(
            f,
            "  {} {} / {} bytes ({:.1}%)",
            "used:".dimmed(),
            stats.current_size,
            stats.capacity,
            percent
        )?;
        writeln!(f, "  {} {}", "entries:".dimmed(), stats.entries)?;
        writeln!(f, "  {} {}", "read-only copies:".dimmed(), stats.read_only)?;
        writeln!(f, "  {} {}", "write copies:".dimmed(), stats.write_copies)?;
        write!(f, "  {} {}", "pinned:".dimmed(), stats.pinned)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("{0}")]
    Call(#[from] CallError),
}

#[async_trait::async_trait]
impl Op for Stats {
    type Error = StatsError;
    type Output = StatsOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        Ok(StatsOutput(ctx.call(CacheStatsRequest {}).await?))
    }
}
