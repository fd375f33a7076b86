mod config;
mod daemon;
mod model;
mod net;
mod route_installer;
mod spf;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::daemon::RouterDaemon;

#[derive(Debug, Parser)]
#[command(name = "lsrd")]
#[command(about = "Link-state routing daemon: neighbor probing, LSA flooding, SPF, kernel route installation")]
struct Args {
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Log route installer commands instead of executing them.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let cfg = Config::from_env(args.dry_run)?;
    let daemon = Arc::new(RouterDaemon::new(cfg)?);
    daemon.run_forever()
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
    Ok(())
}
