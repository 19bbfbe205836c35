use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::redirect::RedirectPlan;
use crate::supervisor::ProcessConfig;

/// Endpoint grammar: `TCPS<port>`, `TCPC<host>,<port>`, `UDPS<port>`,
/// `UDPC<host>,<port>`.
#[derive(Parser, Debug, Clone)]
#[command(name = "sockpipe")]
#[command(
    version,
    about = "Run a command, or an interactive session, with its standard streams redirected over TCP or UDP endpoints"
)]
pub struct Cli {
    /// Program to run, with its arguments, as a single shell-style string
    #[arg(short = 'e', long = "exec", value_name = "COMMAND")]
    pub exec: Option<String>,

    /// Endpoint feeding the child's standard input
    #[arg(short = 'i', long = "input", value_name = "ENDPOINT")]
    pub input: Option<String>,

    /// Endpoint receiving the child's standard output and error
    #[arg(short = 'o', long = "output", value_name = "ENDPOINT")]
    pub output: Option<String>,

    /// One endpoint serving both input and output
    #[arg(
        short = 'b',
        long = "both",
        value_name = "ENDPOINT",
        conflicts_with_all = ["input", "output"]
    )]
    pub both: Option<String>,

    /// Terminate the child after this many seconds
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

/// What one invocation does.
#[derive(Debug, Clone)]
pub enum Invocation {
    /// Supervise a child program with redirected streams.
    Run(ProcessConfig),
    /// Interactive duplex session against the configured endpoints.
    Chat {
        plan: RedirectPlan,
        timeout: Option<Duration>,
    },
}

impl Cli {
    pub fn into_invocation(self) -> Result<Invocation> {
        let plan = RedirectPlan::from_args(
            self.input.as_deref(),
            self.output.as_deref(),
            self.both.as_deref(),
        )?;
        let timeout = self.timeout.map(Duration::from_secs);

        match self.exec {
            Some(line) => {
                let argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();
                if argv.is_empty() {
                    return Err(Error::Usage("-e was given an empty command".into()));
                }
                Ok(Invocation::Run(ProcessConfig { argv, plan, timeout }))
            }
            None if plan.has_endpoints() => Ok(Invocation::Chat { plan, timeout }),
            None => Err(Error::Usage(
                "nothing to do: give a command with -e or an endpoint with -i/-o/-b".into(),
            )),
        }
    }
}
