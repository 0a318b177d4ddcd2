use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use cachefs_server::{start_service, ServiceConfig};

/// Master-copy file server for cachefs proxies
#[derive(Parser, Debug)]
#[command(name = "cachefs-server", version)]
struct Args {
    /// Directory holding the master copies
    #[arg(long, env = "CACHEFS_ROOT")]
    root: PathBuf,

    /// Address to listen on
    #[arg(long, env = "CACHEFS_LISTEN", default_value = "127.0.0.1:5080")]
    listen: SocketAddr,

    /// Default log level (RUST_LOG overrides)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = common::logging::init(args.log_level);

    let mut config = ServiceConfig::new(args.root, args.listen);
    config.log_level = args.log_level;

    tracing::info!(root = %config.root_dir.display(), "starting cachefs-server");
    start_service(&config).await?;
    Ok(())
}
