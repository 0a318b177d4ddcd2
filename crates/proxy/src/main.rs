use std::path::PathBuf;

use clap::Parser;
use owo_colors::OwoColorize;
use url::Url;

use common::api::ApiClient;

mod cli;

use cli::op::{Op, OpContext};
use cli::ops::{Cat, Daemon, Put, Rm, Stats, Version};

crate::command_enum! {
    (Daemon, Daemon),
    (Cat, Cat),
    (Put, Put),
    (Rm, Rm),
    (Stats, Stats),
    (Version, Version),
}

/// Caching file proxy with close-to-open consistency
#[derive(Parser, Debug)]
#[command(name = "cachefs", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Proxy API the client commands talk to
    #[arg(
        long,
        global = true,
        env = "CACHEFS_PROXY",
        default_value = "http://127.0.0.1:5090"
    )]
    remote: Url,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "CACHEFS_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let client = match ApiClient::new(&args.remote) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let ctx = OpContext {
        client,
        config_path: args.config,
    };

    match args.command.execute(&ctx).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
