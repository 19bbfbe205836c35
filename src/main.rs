//! sockpipe: run a command, or an interactive session, with its standard
//! streams redirected over TCP or UDP endpoints.
//!
//! The four endpoint forms are `TCPS<port>`, `TCPC<host>,<port>`,
//! `UDPS<port>` and `UDPC<host>,<port>`. Server forms serve exactly one
//! peer; with `-b` (or a textually identical `-i`/`-o` pair) a single
//! accepted connection carries both directions.

mod cli;
mod endpoint;
mod error;
mod redirect;
mod relay;
mod shutdown;
mod supervisor;
mod transport;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Invocation};
use error::Result;
use shutdown::ShutdownToken;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_logging(&args.log_level);

    let shutdown = shutdown::signal_bridge();

    match run(args, shutdown).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("sockpipe: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(args: Cli, shutdown: ShutdownToken) -> Result<i32> {
    match args.into_invocation()? {
        Invocation::Run(config) => {
            let outcome = supervisor::run(config, shutdown).await?;
            Ok(outcome.exit_code())
        }
        Invocation::Chat { plan, timeout } => {
            relay::run(&plan, timeout, shutdown).await?;
            Ok(0)
        }
    }
}

/// Logs go to stderr only; stdout may be carrying relayed data.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
